//! In-memory registry of calls in flight, keyed by destination number.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::Serialize;

use crate::error::{DialError, HangupError};
use crate::sync::lock;

/// One outbound call in progress.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallSession {
    pub destination_number: String,
    pub call_id: String,
}

/// Issues `SIM800_<millis>` call ids that never repeat within the process.
///
/// Two calls in the same millisecond get consecutive values.
#[derive(Debug, Default)]
pub struct CallIdGenerator {
    last: Mutex<i64>,
}

impl CallIdGenerator {
    pub fn next_id(&self) -> String {
        let now = chrono::Utc::now().timestamp_millis();
        let mut last = lock(&self.last);
        let stamp = now.max(*last + 1);
        *last = stamp;
        format!("SIM800_{stamp}")
    }
}

/// At most one call per destination number.
#[derive(Debug, Default)]
pub struct CallRegistry {
    calls: Mutex<HashMap<String, String>>,
    ids: CallIdGenerator,
}

impl CallRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a call to `destination` under a fresh id.
    ///
    /// A destination that already has a call is rejected, never overwritten.
    pub fn start_call(&self, destination: &str) -> Result<String, DialError> {
        let mut calls = lock(&self.calls);
        if calls.contains_key(destination) {
            return Err(DialError::CallInProgress(destination.to_string()));
        }
        let call_id = self.ids.next_id();
        calls.insert(destination.to_string(), call_id.clone());
        Ok(call_id)
    }

    /// Removes the call with `call_id` and returns its destination.
    pub fn end_call(&self, call_id: &str) -> Result<String, HangupError> {
        let mut calls = lock(&self.calls);
        let destination = calls
            .iter()
            .find(|(_, id)| id.as_str() == call_id)
            .map(|(destination, _)| destination.clone())
            .ok_or_else(|| HangupError::CallNotFound(call_id.to_string()))?;
        calls.remove(&destination);
        Ok(destination)
    }

    /// Destination of the call with `call_id`, if registered.
    pub fn destination_of(&self, call_id: &str) -> Option<String> {
        lock(&self.calls)
            .iter()
            .find(|(_, id)| id.as_str() == call_id)
            .map(|(destination, _)| destination.clone())
    }

    pub fn contains(&self, destination: &str) -> bool {
        lock(&self.calls).contains_key(destination)
    }

    /// Snapshot of every call in flight, ordered by destination.
    pub fn active_calls(&self) -> Vec<CallSession> {
        sorted_sessions(
            lock(&self.calls)
                .iter()
                .map(|(destination, id)| (destination.clone(), id.clone())),
        )
    }

    /// Removes every call and returns them, ordered by destination.
    pub fn drain(&self) -> Vec<CallSession> {
        sorted_sessions(lock(&self.calls).drain())
    }

    pub fn len(&self) -> usize {
        lock(&self.calls).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn sorted_sessions(calls: impl Iterator<Item = (String, String)>) -> Vec<CallSession> {
    let mut sessions: Vec<CallSession> = calls
        .map(|(destination_number, call_id)| CallSession {
            destination_number,
            call_id,
        })
        .collect();
    sessions.sort_by(|a, b| a.destination_number.cmp(&b.destination_number));
    sessions
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_ids_are_unique_and_prefixed() {
        let ids = CallIdGenerator::default();
        let issued: Vec<String> = (0..1000).map(|_| ids.next_id()).collect();
        assert!(issued.iter().all(|id| id.starts_with("SIM800_")));
        let unique: HashSet<_> = issued.iter().collect();
        assert_eq!(unique.len(), issued.len());
    }

    #[test]
    fn test_start_and_end_call() {
        let registry = CallRegistry::new();
        let call_id = registry.start_call("+12345678901").unwrap();
        assert!(registry.contains("+12345678901"));
        assert_eq!(registry.destination_of(&call_id).as_deref(), Some("+12345678901"));

        assert_eq!(registry.end_call(&call_id).unwrap(), "+12345678901");
        assert!(registry.is_empty());
    }

    #[test]
    fn test_duplicate_destination_rejected() {
        let registry = CallRegistry::new();
        let first = registry.start_call("+12345678901").unwrap();
        assert_eq!(
            registry.start_call("+12345678901"),
            Err(DialError::CallInProgress("+12345678901".into()))
        );
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.destination_of(&first).as_deref(), Some("+12345678901"));
    }

    #[test]
    fn test_end_unknown_call_leaves_registry() {
        let registry = CallRegistry::new();
        registry.start_call("+12345678901").unwrap();
        assert_eq!(
            registry.end_call("SIM800_0"),
            Err(HangupError::CallNotFound("SIM800_0".into()))
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_active_calls_sorted() {
        let registry = CallRegistry::new();
        registry.start_call("+447700900123").unwrap();
        registry.start_call("+12345678901").unwrap();
        let numbers: Vec<_> = registry
            .active_calls()
            .into_iter()
            .map(|s| s.destination_number)
            .collect();
        assert_eq!(numbers, ["+12345678901", "+447700900123"]);
    }

    #[test]
    fn test_drain_empties_registry() {
        let registry = CallRegistry::new();
        let second = registry.start_call("+447700900123").unwrap();
        let first = registry.start_call("+12345678901").unwrap();

        let drained = registry.drain();
        assert_eq!(
            drained,
            [
                CallSession {
                    destination_number: "+12345678901".into(),
                    call_id: first,
                },
                CallSession {
                    destination_number: "+447700900123".into(),
                    call_id: second,
                },
            ]
        );
        assert!(registry.is_empty());
        assert!(registry.drain().is_empty());
        assert!(registry.start_call("+12345678901").is_ok());
    }

    #[test]
    fn test_number_reusable_after_hangup() {
        let registry = CallRegistry::new();
        let first = registry.start_call("+12345678901").unwrap();
        registry.end_call(&first).unwrap();
        let second = registry.start_call("+12345678901").unwrap();
        assert_ne!(first, second);
    }
}
