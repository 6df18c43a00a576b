//!Persistence for readings, reminders and alerts.
//!
//!The [`Store`] trait is the only thing the HTTP layer sees. Two backends implement it: [`MemoryStore`]
//!for tests and throwaway runs, and [`SqliteStore`] for a real deployment. Both keep each record kind
//!in its own table, keyed by an id and the subject it belongs to, with the record itself as JSON.

mod memory;
mod sqlite;

use std::future::Future;

use chrono::{DateTime, SubsecRound, Utc};
use nest_core::{evaluate, Alert, Environment, Health, Rated, Reminder, SubjectId, TextLog};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("could not (de)serialize record: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("storage task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("invalid timestamp '{0}'")]
    Timestamp(String),
    #[error("{table} row {id} does not exist")]
    Missing { table: &'static str, id: i64 },
}

///A record kind with its own table.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const TABLE: &'static str;
}

impl Record for Environment {
    const TABLE: &'static str = "environments";
}

impl Record for TextLog {
    const TABLE: &'static str = "textlogs";
}

impl Record for Health {
    const TABLE: &'static str = "health_readings";
}

impl Record for Reminder {
    const TABLE: &'static str = "reminders";
}

impl Record for Alert {
    const TABLE: &'static str = "alerts";
}

pub(crate) const TABLES: [&str; 5] = [
    Environment::TABLE,
    TextLog::TABLE,
    Health::TABLE,
    Reminder::TABLE,
    Alert::TABLE,
];

///A record as persisted: the record fields plus the id, subject and server-assigned creation time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stored<T> {
    pub id: i64,
    pub child_id: SubjectId,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub record: T,
}

pub trait Store: Clone + Send + Sync + 'static {
    ///Persists a record, assigning its id and creation time.
    fn create<T: Record>(
        &self,
        child_id: &SubjectId,
        record: T,
    ) -> impl Future<Output = Result<Stored<T>, StoreError>> + Send;

    ///Persists a reading together with the alerts derived from it. Either every row is stored or
    ///none is.
    fn create_with_alerts<T: Record>(
        &self,
        child_id: &SubjectId,
        record: T,
        alerts: Vec<Alert>,
    ) -> impl Future<Output = Result<(Stored<T>, Vec<Stored<Alert>>), StoreError>> + Send;

    ///All records of a kind for one subject, newest first.
    fn list<T: Record>(
        &self,
        child_id: &SubjectId,
    ) -> impl Future<Output = Result<Vec<Stored<T>>, StoreError>> + Send;

    fn get<T: Record>(
        &self,
        id: i64,
    ) -> impl Future<Output = Result<Option<Stored<T>>, StoreError>> + Send;

    ///Overwrites the record fields of an existing row. Id, subject and creation time are kept.
    fn update<T: Record>(
        &self,
        stored: &Stored<T>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

///Never hands out a time earlier than the last one, even if the wall clock steps back.
///Microsecond precision, which is what the sqlite backend keeps.
pub(crate) fn next_timestamp(last: &mut Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now().trunc_subsecs(6);
    let ts = match *last {
        Some(prev) if prev > now => prev,
        _ => now,
    };
    *last = Some(ts);
    ts
}

#[derive(Debug, Clone, Serialize)]
pub struct Committed<R> {
    pub reading: Stored<R>,
    pub alerts: Vec<Stored<Alert>>,
}

///Stores a reading along with every alert the rules raise for it.
///
///The rules only look at the reading's own fields, so they run before the insert and the reading
///and its alerts land in one unit. A failed alert insert leaves no orphaned reading behind.
///Runs to completion before returning; alerts are not deduplicated against earlier ones.
pub async fn commit_reading<S, R>(
    store: &S,
    child_id: &SubjectId,
    reading: R,
) -> Result<Committed<R>, StoreError>
where
    S: Store,
    R: Rated + Record,
{
    let drafts = evaluate(&reading);
    for alert in &drafts {
        info!(
            "raising {} alert for {}: {}",
            alert.level, child_id, alert.title
        );
    }
    let (reading, alerts) = store.create_with_alerts(child_id, reading, drafts).await?;
    debug!("committed {} #{} with {} alert(s)", R::TABLE, reading.id, alerts.len());
    Ok(Committed { reading, alerts })
}

///Sets the acknowledged flag. `None` if there is no alert with that id.
pub async fn acknowledge_alert<S: Store>(
    store: &S,
    id: i64,
) -> Result<Option<Stored<Alert>>, StoreError> {
    let Some(mut stored) = store.get::<Alert>(id).await? else {
        return Ok(None);
    };
    if stored.record.acknowledge() {
        store.update(&stored).await?;
        debug!("acknowledged alert #{id}");
    }
    Ok(Some(stored))
}
