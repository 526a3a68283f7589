//! # Call Log Store
//!
//! Persistence of call log records. The coordinator only ever creates
//! records; the remaining operations serve whoever browses the history.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::sync::lock;

/// Fields supplied when a call is placed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCallLog {
    pub phone_number: String,
    pub person_name: String,
    pub company_name: String,
}

impl NewCallLog {
    /// Every field must be present and not blank.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.phone_number.trim().is_empty() {
            return Err(StoreError::MissingField("phoneNumber"));
        }
        if self.person_name.trim().is_empty() {
            return Err(StoreError::MissingField("personName"));
        }
        if self.company_name.trim().is_empty() {
            return Err(StoreError::MissingField("companyName"));
        }
        Ok(())
    }
}

/// A stored call log record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallLog {
    pub id: u64,
    pub phone_number: String,
    pub person_name: String,
    pub company_name: String,
    pub call_time: DateTime<Utc>,
    /// Seconds, 0 until someone records it.
    pub duration_secs: u32,
}

/// Selects records by exact phone number, or all of them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallLogFilter {
    pub phone_number: Option<String>,
}

impl CallLogFilter {
    pub fn phone(number: impl Into<String>) -> Self {
        CallLogFilter {
            phone_number: Some(number.into()),
        }
    }

    fn matches(&self, log: &CallLog) -> bool {
        self.phone_number
            .as_deref()
            .is_none_or(|phone| phone == log.phone_number)
    }
}

/// Record store for call logs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CallLogStore: Send + Sync {
    async fn create(&self, entry: NewCallLog) -> Result<CallLog, StoreError>;

    async fn get(&self, id: u64) -> Result<CallLog, StoreError>;

    /// Matching records, newest first.
    async fn list(&self, filter: CallLogFilter) -> Result<Vec<CallLog>, StoreError>;

    async fn update_duration(&self, id: u64, duration_secs: u32) -> Result<CallLog, StoreError>;

    async fn delete(&self, id: u64) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
struct Records {
    next_id: u64,
    logs: BTreeMap<u64, CallLog>,
}

/// Process-local [`CallLogStore`].
#[derive(Debug, Default)]
pub struct MemoryCallLogStore {
    records: Mutex<Records>,
}

impl MemoryCallLogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CallLogStore for MemoryCallLogStore {
    async fn create(&self, entry: NewCallLog) -> Result<CallLog, StoreError> {
        entry.validate()?;
        let mut records = lock(&self.records);
        records.next_id += 1;
        let log = CallLog {
            id: records.next_id,
            phone_number: entry.phone_number,
            person_name: entry.person_name,
            company_name: entry.company_name,
            call_time: Utc::now(),
            duration_secs: 0,
        };
        records.logs.insert(log.id, log.clone());
        Ok(log)
    }

    async fn get(&self, id: u64) -> Result<CallLog, StoreError> {
        lock(&self.records)
            .logs
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn list(&self, filter: CallLogFilter) -> Result<Vec<CallLog>, StoreError> {
        let records = lock(&self.records);
        let mut logs: Vec<CallLog> = records
            .logs
            .values()
            .filter(|log| filter.matches(log))
            .cloned()
            .collect();
        logs.sort_by(|a, b| b.call_time.cmp(&a.call_time).then(b.id.cmp(&a.id)));
        Ok(logs)
    }

    async fn update_duration(&self, id: u64, duration_secs: u32) -> Result<CallLog, StoreError> {
        let mut records = lock(&self.records);
        let log = records.logs.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        log.duration_secs = duration_secs;
        Ok(log.clone())
    }

    async fn delete(&self, id: u64) -> Result<(), StoreError> {
        lock(&self.records)
            .logs
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(phone: &str, person: &str) -> NewCallLog {
        NewCallLog {
            phone_number: phone.into(),
            person_name: person.into(),
            company_name: "Acme".into(),
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = MemoryCallLogStore::new();
        let log = store.create(entry("+12345678901", "Ada")).await.unwrap();
        assert_eq!(log.duration_secs, 0);
        assert_eq!(store.get(log.id).await.unwrap(), log);
    }

    #[tokio::test]
    async fn test_create_requires_all_fields() {
        let store = MemoryCallLogStore::new();
        assert_eq!(
            store.create(entry("+12345678901", "  ")).await,
            Err(StoreError::MissingField("personName"))
        );
        assert!(store.list(CallLogFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_filters_by_phone_newest_first() {
        let store = MemoryCallLogStore::new();
        let first = store.create(entry("+12345678901", "Ada")).await.unwrap();
        store.create(entry("+447700900123", "Bob")).await.unwrap();
        let third = store.create(entry("+12345678901", "Cy")).await.unwrap();

        let logs = store
            .list(CallLogFilter::phone("+12345678901"))
            .await
            .unwrap();
        let ids: Vec<u64> = logs.iter().map(|l| l.id).collect();
        assert_eq!(ids, [third.id, first.id]);
        assert_eq!(store.list(CallLogFilter::default()).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let store = MemoryCallLogStore::new();
        let log = store.create(entry("+12345678901", "Ada")).await.unwrap();

        let updated = store.update_duration(log.id, 42).await.unwrap();
        assert_eq!(updated.duration_secs, 42);

        store.delete(log.id).await.unwrap();
        assert_eq!(store.get(log.id).await, Err(StoreError::NotFound(log.id)));
        assert_eq!(store.delete(log.id).await, Err(StoreError::NotFound(log.id)));
        assert_eq!(
            store.update_duration(99, 1).await,
            Err(StoreError::NotFound(99))
        );
    }
}
