//! In-memory calendar remote.
//!
//! Stores events as iCalendar text keyed by UID, records every call, and
//! can be told to fail. Clones share the same calendar.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::ics::parse_metadata;
use crate::remote::{CalendarRemote, RawEvent, TransportError};

/// A call made against a [`MemoryRemote`], in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    List,
    Create(String),
    Update(String),
    Delete(String),
}

#[derive(Debug, Default)]
struct Inner {
    events: BTreeMap<String, String>,
    hidden: HashSet<String>,
    calls: Vec<RemoteCall>,
    fail_next_list: Option<TransportError>,
    failing_uids: HashMap<String, TransportError>,
}

#[derive(Debug, Default, Clone)]
pub struct MemoryRemote {
    label: String,
    inner: Arc<Mutex<Inner>>,
}

impl MemoryRemote {
    pub fn new(label: impl Into<String>) -> Self {
        MemoryRemote {
            label: label.into(),
            inner: Arc::default(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Put an event straight into the calendar, bypassing the call log.
    /// Returns the event's UID; payloads without one are ignored.
    pub fn insert(&self, ics: impl Into<String>) -> Option<String> {
        let ics = ics.into();
        let uid = parse_metadata(&ics)?.uid;
        self.lock().events.insert(uid.clone(), ics);
        Some(uid)
    }

    /// Remove an event as if a user deleted it.
    pub fn remove(&self, uid: &str) -> Option<String> {
        self.lock().events.remove(uid)
    }

    /// Keep `uid` out of `list_events` while it still exists, like a remote
    /// whose listing lags behind its writes.
    pub fn hide(&self, uid: &str) {
        self.lock().hidden.insert(uid.to_string());
    }

    pub fn get(&self, uid: &str) -> Option<String> {
        self.lock().events.get(uid).cloned()
    }

    pub fn has(&self, uid: &str) -> bool {
        self.lock().events.contains_key(uid)
    }

    pub fn events(&self) -> BTreeMap<String, String> {
        self.lock().events.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().events.is_empty()
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.lock().calls.clone()
    }

    /// Calls other than listing.
    pub fn mutations(&self) -> Vec<RemoteCall> {
        self.calls()
            .into_iter()
            .filter(|call| *call != RemoteCall::List)
            .collect()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Cause the next `list_events` to fail with `error`.
    pub fn fail_next_list(&self, error: TransportError) {
        self.lock().fail_next_list = Some(error);
    }

    /// Cause every create/update/delete of `uid` to fail until `heal`.
    pub fn fail_uid(&self, uid: &str, error: TransportError) {
        self.lock().failing_uids.insert(uid.to_string(), error);
    }

    pub fn heal(&self) {
        let mut inner = self.lock();
        inner.fail_next_list = None;
        inner.failing_uids.clear();
    }
}

impl Inner {
    fn check(&self, uid: &str) -> Result<(), TransportError> {
        match self.failing_uids.get(uid) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CalendarRemote for MemoryRemote {
    fn label(&self) -> String {
        self.label.clone()
    }

    async fn list_events(&self) -> Result<Vec<RawEvent>, TransportError> {
        let mut inner = self.lock();
        inner.calls.push(RemoteCall::List);

        if let Some(error) = inner.fail_next_list.take() {
            return Err(error);
        }

        Ok(inner
            .events
            .iter()
            .filter(|(uid, _)| !inner.hidden.contains(*uid))
            .map(|(_, ics)| RawEvent::new(ics.clone()))
            .collect())
    }

    async fn create_event(&self, ics: &str) -> Result<String, TransportError> {
        let uid = parse_metadata(ics)
            .map(|metadata| metadata.uid)
            .ok_or_else(|| TransportError::Rejected("event has no UID".into()))?;

        let mut inner = self.lock();
        inner.calls.push(RemoteCall::Create(uid.clone()));
        inner.check(&uid)?;

        if inner.events.contains_key(&uid) {
            return Err(TransportError::AlreadyExists(uid));
        }

        inner.events.insert(uid.clone(), ics.to_string());
        Ok(uid)
    }

    async fn update_event(&self, uid: &str, ics: &str) -> Result<(), TransportError> {
        let mut inner = self.lock();
        inner.calls.push(RemoteCall::Update(uid.to_string()));
        inner.check(uid)?;

        match inner.events.get_mut(uid) {
            Some(existing) => {
                *existing = ics.to_string();
                Ok(())
            }
            None => Err(TransportError::NotFound(uid.to_string())),
        }
    }

    async fn delete_event(&self, uid: &str) -> Result<(), TransportError> {
        let mut inner = self.lock();
        inner.calls.push(RemoteCall::Delete(uid.to_string()));
        inner.check(uid)?;

        inner.hidden.remove(uid);
        match inner.events.remove(uid) {
            Some(_) => Ok(()),
            None => Err(TransportError::NotFound(uid.to_string())),
        }
    }
}
