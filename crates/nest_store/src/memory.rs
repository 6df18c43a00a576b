use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use chrono::{DateTime, Utc};
use nest_core::{Alert, SubjectId};

use crate::{next_timestamp, Record, Store, StoreError, Stored};

struct Row {
    id: i64,
    child_id: SubjectId,
    created_at: DateTime<Utc>,
    body: serde_json::Value,
}

impl Row {
    fn decode<T: Record>(&self) -> Result<Stored<T>, StoreError> {
        Ok(Stored {
            id: self.id,
            child_id: self.child_id.clone(),
            created_at: self.created_at,
            record: serde_json::from_value(self.body.clone())?,
        })
    }
}

#[derive(Default)]
struct Tables {
    rows: HashMap<&'static str, Vec<Row>>,
    last_created: Option<DateTime<Utc>>,
}

///Keeps everything in process memory. Clones share the same tables.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Tables {
    fn insert<T: Record>(
        &mut self,
        child_id: &SubjectId,
        record: T,
        body: serde_json::Value,
    ) -> Stored<T> {
        let created_at = next_timestamp(&mut self.last_created);
        let rows = self.rows.entry(T::TABLE).or_default();
        let id = rows.len() as i64 + 1;
        rows.push(Row {
            id,
            child_id: child_id.clone(),
            created_at,
            body,
        });
        Stored {
            id,
            child_id: child_id.clone(),
            created_at,
            record,
        }
    }
}

impl Store for MemoryStore {
    async fn create<T: Record>(
        &self,
        child_id: &SubjectId,
        record: T,
    ) -> Result<Stored<T>, StoreError> {
        let body = serde_json::to_value(&record)?;
        let mut tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(tables.insert(child_id, record, body))
    }

    async fn create_with_alerts<T: Record>(
        &self,
        child_id: &SubjectId,
        record: T,
        alerts: Vec<Alert>,
    ) -> Result<(Stored<T>, Vec<Stored<Alert>>), StoreError> {
        //serialize everything before touching the tables
        let body = serde_json::to_value(&record)?;
        let alerts = alerts
            .into_iter()
            .map(|alert| serde_json::to_value(&alert).map(|body| (alert, body)))
            .collect::<Result<Vec<_>, _>>()?;

        let mut tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        let stored = tables.insert(child_id, record, body);
        let alerts = alerts
            .into_iter()
            .map(|(alert, body)| tables.insert(child_id, alert, body))
            .collect();
        Ok((stored, alerts))
    }

    async fn list<T: Record>(&self, child_id: &SubjectId) -> Result<Vec<Stored<T>>, StoreError> {
        let tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(rows) = tables.rows.get(T::TABLE) else {
            return Ok(Vec::new());
        };
        let mut matching: Vec<&Row> = rows.iter().filter(|r| &r.child_id == child_id).collect();
        matching.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        matching.into_iter().map(Row::decode).collect()
    }

    async fn get<T: Record>(&self, id: i64) -> Result<Option<Stored<T>>, StoreError> {
        let tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        tables
            .rows
            .get(T::TABLE)
            .and_then(|rows| rows.iter().find(|r| r.id == id))
            .map(Row::decode)
            .transpose()
    }

    async fn update<T: Record>(&self, stored: &Stored<T>) -> Result<(), StoreError> {
        let body = serde_json::to_value(&stored.record)?;
        let mut tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        let row = tables
            .rows
            .get_mut(T::TABLE)
            .and_then(|rows| rows.iter_mut().find(|r| r.id == stored.id))
            .ok_or(StoreError::Missing {
                table: T::TABLE,
                id: stored.id,
            })?;
        row.body = body;
        Ok(())
    }
}
