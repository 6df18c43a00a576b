use std::{
    path::Path,
    sync::{Arc, Mutex, PoisonError},
};

use chrono::{DateTime, SecondsFormat, Utc};
use nest_core::{Alert, SubjectId};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{error, info};

use crate::{next_timestamp, Record, Store, StoreError, Stored, TABLES};

const SCHEMA_VERSION: i32 = 1;

struct SqliteInner {
    conn: Connection,
    last_created: Option<DateTime<Utc>>,
}

///SQLite-backed store. Every call runs on the blocking pool behind one connection.
#[derive(Clone)]
pub struct SqliteStore {
    inner: Arc<Mutex<SqliteInner>>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
            error!("failed to enable WAL mode: {err}");
        }
        let store = Self::with_connection(conn)?;
        info!("database opened at {}", path.display());
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(mut conn: Connection) -> Result<Self, StoreError> {
        run_migrations(&mut conn)?;
        let last_created = latest_created(&conn)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(SqliteInner { conn, last_created })),
        })
    }

    async fn execute<F, O>(&self, task: F) -> Result<O, StoreError>
    where
        F: FnOnce(&mut SqliteInner) -> Result<O, StoreError> + Send + 'static,
        O: Send + 'static,
    {
        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = inner.lock().unwrap_or_else(PoisonError::into_inner);
            task(&mut guard)
        })
        .await?
    }
}

fn run_migrations(conn: &mut Connection) -> Result<(), StoreError> {
    let version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    if version >= SCHEMA_VERSION {
        return Ok(());
    }
    let tx = conn.transaction()?;
    for table in TABLES {
        tx.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                child_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                body TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_{table}_child_created ON {table} (child_id, created_at);"
        ))?;
    }
    tx.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    tx.commit()?;
    Ok(())
}

///Newest creation time across all tables, so a reopened store never hands out an earlier one.
fn latest_created(conn: &Connection) -> Result<Option<DateTime<Utc>>, StoreError> {
    let mut latest = None;
    for table in TABLES {
        let max: Option<String> = conn.query_row(
            &format!("SELECT MAX(created_at) FROM {table}"),
            [],
            |row| row.get(0),
        )?;
        if let Some(max) = max {
            latest = latest.max(Some(parse_ts(&max)?));
        }
    }
    Ok(latest)
}

fn insert<T: Record>(
    conn: &Connection,
    last_created: &mut Option<DateTime<Utc>>,
    child: &str,
    body: &str,
) -> Result<(i64, DateTime<Utc>), StoreError> {
    let created_at = next_timestamp(last_created);
    conn.execute(
        &format!(
            "INSERT INTO {} (child_id, created_at, body) VALUES (?1, ?2, ?3)",
            T::TABLE
        ),
        params![child, format_ts(created_at), body],
    )?;
    Ok((conn.last_insert_rowid(), created_at))
}

//fixed width so lexical order in sql matches time order
fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StoreError::Timestamp(value.to_owned()))
}

type RawRow = (i64, String, String, String);

fn decode<T: Record>((id, child_id, created_at, body): RawRow) -> Result<Stored<T>, StoreError> {
    Ok(Stored {
        id,
        child_id: SubjectId::normalize(Some(&child_id)),
        created_at: parse_ts(&created_at)?,
        record: serde_json::from_str(&body)?,
    })
}

impl Store for SqliteStore {
    async fn create<T: Record>(
        &self,
        child_id: &SubjectId,
        record: T,
    ) -> Result<Stored<T>, StoreError> {
        let body = serde_json::to_string(&record)?;
        let child = child_id.to_string();
        let (id, created_at) = self
            .execute(move |inner| {
                insert::<T>(&inner.conn, &mut inner.last_created, &child, &body)
            })
            .await?;
        Ok(Stored {
            id,
            child_id: child_id.clone(),
            created_at,
            record,
        })
    }

    async fn create_with_alerts<T: Record>(
        &self,
        child_id: &SubjectId,
        record: T,
        alerts: Vec<Alert>,
    ) -> Result<(Stored<T>, Vec<Stored<Alert>>), StoreError> {
        let body = serde_json::to_string(&record)?;
        let alert_bodies = alerts
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()?;
        let child = child_id.to_string();
        let (row, alert_rows) = self
            .execute(move |inner| {
                //keep the clock untouched if the transaction rolls back
                let mut last_created = inner.last_created;
                let tx = inner.conn.transaction()?;
                let row = insert::<T>(&tx, &mut last_created, &child, &body)?;
                let alert_rows = alert_bodies
                    .iter()
                    .map(|body| insert::<Alert>(&tx, &mut last_created, &child, body))
                    .collect::<Result<Vec<_>, _>>()?;
                tx.commit()?;
                inner.last_created = last_created;
                Ok((row, alert_rows))
            })
            .await?;

        let (id, created_at) = row;
        let alerts = alerts
            .into_iter()
            .zip(alert_rows)
            .map(|(alert, (id, created_at))| Stored {
                id,
                child_id: child_id.clone(),
                created_at,
                record: alert,
            })
            .collect();
        Ok((
            Stored {
                id,
                child_id: child_id.clone(),
                created_at,
                record,
            },
            alerts,
        ))
    }

    async fn list<T: Record>(&self, child_id: &SubjectId) -> Result<Vec<Stored<T>>, StoreError> {
        let child = child_id.to_string();
        let rows = self
            .execute(move |inner| {
                let mut stmt = inner.conn.prepare(&format!(
                    "SELECT id, child_id, created_at, body FROM {}
                     WHERE child_id = ?1
                     ORDER BY created_at DESC, id DESC",
                    T::TABLE
                ))?;
                let rows = stmt
                    .query_map(params![child], |row| {
                        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
                    })?
                    .collect::<Result<Vec<RawRow>, _>>()?;
                Ok(rows)
            })
            .await?;
        rows.into_iter().map(decode).collect()
    }

    async fn get<T: Record>(&self, id: i64) -> Result<Option<Stored<T>>, StoreError> {
        let row = self
            .execute(move |inner| {
                let row: Option<RawRow> = inner
                    .conn
                    .query_row(
                        &format!(
                            "SELECT id, child_id, created_at, body FROM {} WHERE id = ?1",
                            T::TABLE
                        ),
                        params![id],
                        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
                    )
                    .optional()?;
                Ok(row)
            })
            .await?;
        row.map(decode).transpose()
    }

    async fn update<T: Record>(&self, stored: &Stored<T>) -> Result<(), StoreError> {
        let body = serde_json::to_string(&stored.record)?;
        let id = stored.id;
        let changed = self
            .execute(move |inner| {
                let changed = inner.conn.execute(
                    &format!("UPDATE {} SET body = ?1 WHERE id = ?2", T::TABLE),
                    params![body, id],
                )?;
                Ok(changed)
            })
            .await?;
        if changed == 0 {
            return Err(StoreError::Missing {
                table: T::TABLE,
                id,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nest_core::{Environment, Level};

    use crate::commit_reading;

    fn temp_db(name: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("nest-{name}-{}.db", std::process::id()));
        let _ = std::fs::remove_file(&path);
        path
    }

    fn hot_room() -> Environment {
        Environment {
            temperature: Some(33.0),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_reopen_keeps_clock_monotonic() {
        let path = temp_db("clock");
        let later = DateTime::parse_from_rfc3339("2100-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        {
            let store = SqliteStore::open(&path).unwrap();
            store
                .execute(move |inner| {
                    inner.conn.execute(
                        "INSERT INTO alerts (child_id, created_at, body) VALUES (?1, ?2, ?3)",
                        params!["default", format_ts(later), "{}"],
                    )?;
                    Ok(())
                })
                .await
                .unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        let stored = store
            .create(&SubjectId::default(), hot_room())
            .await
            .unwrap();
        assert!(stored.created_at >= later);
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_commit_is_all_or_nothing() {
        let store = SqliteStore::open_in_memory().unwrap();
        let kid = SubjectId::default();
        store
            .execute(|inner| {
                inner.conn.execute_batch("DROP TABLE alerts")?;
                Ok(())
            })
            .await
            .unwrap();

        assert!(commit_reading(&store, &kid, hot_room()).await.is_err());
        assert!(store.list::<Environment>(&kid).await.unwrap().is_empty());

        //a reading that raises nothing never touches the alerts table
        let calm = commit_reading(&store, &kid, Environment::default())
            .await
            .unwrap();
        assert!(calm.alerts.is_empty());
        assert_eq!(store.list::<Environment>(&kid).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_commit_stores_alerts() {
        let store = SqliteStore::open_in_memory().unwrap();
        let kid = SubjectId::default();
        let committed = commit_reading(&store, &kid, hot_room()).await.unwrap();
        assert_eq!(committed.alerts.len(), 1);
        assert_eq!(committed.alerts[0].record.level, Level::Critical);

        let listed = store.list::<nest_core::Alert>(&kid).await.unwrap();
        assert_eq!(listed, committed.alerts);
    }
}
