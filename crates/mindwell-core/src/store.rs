//! Persisted record of the single active timer session.
//!
//! The record is the only thing observers share. Each observer reads it on its
//! own probe and derives remaining time independently, so the store has no
//! notion of subscribers. Backends:
//!
//! - [`MemoryStore`]: process-local, shared by cloning
//! - [`Database`](crate::storage::Database): the SQLite `kv` table, survives
//!   restarts
//!
//! The wire shape of the record is
//! `{"endAt":"<epoch milliseconds>","mode":"<focus|break|breathing>"}`.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::timer::TimerMode;

/// Key under which the active session is persisted.
pub const ACTIVE_TIMER_KEY: &str = "active_timer";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    #[serde(rename = "endAt", with = "epoch_ms_string")]
    pub end_at_ms: u64,
    pub mode: TimerMode,
}

impl StoredSession {
    pub fn new(end_at_ms: u64, mode: TimerMode) -> Self {
        Self { end_at_ms, mode }
    }

    pub fn encode(&self) -> Result<String, StoreError> {
        serde_json::to_string(self).map_err(|e| StoreError::Corrupt(e.to_string()))
    }

    pub fn decode(raw: &str) -> Result<Self, StoreError> {
        serde_json::from_str(raw).map_err(|e| StoreError::Corrupt(e.to_string()))
    }
}

mod epoch_ms_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.trim().parse().map_err(serde::de::Error::custom)
    }
}

/// Durable single-slot storage for the active session.
pub trait SessionStore {
    /// Overwrite any existing record.
    fn write(&self, session: &StoredSession) -> Result<(), StoreError>;

    /// The last written record, or `None` when cleared or never set.
    fn read(&self) -> Result<Option<StoredSession>, StoreError>;

    fn clear(&self) -> Result<(), StoreError>;

    /// Remove the record only if it still carries `end_at_ms`.
    ///
    /// Returns `true` for exactly one caller per record, which is how
    /// independent observers agree on who reports a completion.
    fn claim(&self, end_at_ms: u64) -> Result<bool, StoreError>;
}

impl<T: SessionStore + ?Sized> SessionStore for &T {
    fn write(&self, session: &StoredSession) -> Result<(), StoreError> {
        (**self).write(session)
    }
    fn read(&self) -> Result<Option<StoredSession>, StoreError> {
        (**self).read()
    }
    fn clear(&self) -> Result<(), StoreError> {
        (**self).clear()
    }
    fn claim(&self, end_at_ms: u64) -> Result<bool, StoreError> {
        (**self).claim(end_at_ms)
    }
}

impl<T: SessionStore + ?Sized> SessionStore for Arc<T> {
    fn write(&self, session: &StoredSession) -> Result<(), StoreError> {
        (**self).write(session)
    }
    fn read(&self) -> Result<Option<StoredSession>, StoreError> {
        (**self).read()
    }
    fn clear(&self) -> Result<(), StoreError> {
        (**self).clear()
    }
    fn claim(&self, end_at_ms: u64) -> Result<bool, StoreError> {
        (**self).claim(end_at_ms)
    }
}

/// In-process store. Clones share one slot.
///
/// The slot holds the encoded record, the same bytes a durable backend keeps.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    slot: Arc<Mutex<Option<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place raw text in the slot, bypassing encoding.
    pub fn put_raw(&self, raw: &str) -> Result<(), StoreError> {
        *self.lock()? = Some(raw.to_string());
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<String>>, StoreError> {
        self.slot
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))
    }
}

impl SessionStore for MemoryStore {
    fn write(&self, session: &StoredSession) -> Result<(), StoreError> {
        let encoded = session.encode()?;
        *self.lock()? = Some(encoded);
        Ok(())
    }

    fn read(&self) -> Result<Option<StoredSession>, StoreError> {
        self.lock()?.as_deref().map(StoredSession::decode).transpose()
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.lock()? = None;
        Ok(())
    }

    fn claim(&self, end_at_ms: u64) -> Result<bool, StoreError> {
        let mut slot = self.lock()?;
        let matches = match slot.as_deref() {
            Some(raw) => StoredSession::decode(raw)?.end_at_ms == end_at_ms,
            None => false,
        };
        if matches {
            *slot = None;
        }
        Ok(matches)
    }
}
