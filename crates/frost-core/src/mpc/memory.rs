use super::{async_trait, Relay};
use crate::types::{IdentityHash, SessionId};
use crate::{Error, Result};
use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::trace;

type RoundKey = (SessionId, u32);
type MailboxKey = (SessionId, u32, IdentityHash);

/// Relay backed by shared maps; clones share the same mailboxes
///
/// Collect calls wait until enough messages arrived and never time out on
/// their own; [`super::Channel`] bounds them.
#[derive(Clone)]
pub struct MemoryRelay {
    broadcasts: Arc<DashMap<RoundKey, Vec<Vec<u8>>>>,
    directs: Arc<DashMap<MailboxKey, Vec<Vec<u8>>>>,
    notify: broadcast::Sender<()>,
}

impl MemoryRelay {
    pub fn new() -> Self {
        let (notify, _) = broadcast::channel(100);
        Self {
            broadcasts: Arc::new(DashMap::new()),
            directs: Arc::new(DashMap::new()),
            notify,
        }
    }

    /// Drop every message of a session
    pub fn clear_session(&self, session_id: &SessionId) {
        self.broadcasts.retain(|(session, _), _| session != session_id);
        self.directs.retain(|(session, _, _), _| session != session_id);
    }

    fn take_ready<T: DeserializeOwned>(messages: &[Vec<u8>], count: usize) -> Option<Result<Vec<T>>> {
        if messages.len() < count {
            return None;
        }
        Some(messages.iter().take(count).map(|bytes| deserialize(bytes)).collect())
    }
}

impl Default for MemoryRelay {
    fn default() -> Self {
        Self::new()
    }
}

fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| Error::Serialization(e.to_string()))
}

fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| Error::Deserialization(e.to_string()))
}

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[async_trait]
impl Relay for MemoryRelay {
    async fn broadcast<T: Serialize + Send + Sync>(
        &self,
        session_id: &SessionId,
        round: u32,
        message: &T,
    ) -> Result<()> {
        let bytes = serialize(message)?;
        trace!(round, len = bytes.len(), "relay broadcast");

        self.broadcasts
            .entry((*session_id, round))
            .or_default()
            .push(bytes);

        let _ = self.notify.send(());
        Ok(())
    }

    async fn send_direct<T: Serialize + Send + Sync>(
        &self,
        session_id: &SessionId,
        round: u32,
        to: &IdentityHash,
        message: &T,
    ) -> Result<()> {
        let bytes = serialize(message)?;
        trace!(round, to = ?to, len = bytes.len(), "relay direct");

        self.directs
            .entry((*session_id, round, *to))
            .or_default()
            .push(bytes);

        let _ = self.notify.send(());
        Ok(())
    }

    async fn collect_broadcasts<T: DeserializeOwned + Send>(
        &self,
        session_id: &SessionId,
        round: u32,
        count: usize,
    ) -> Result<Vec<T>> {
        let mut rx = self.notify.subscribe();

        loop {
            if let Some(messages) = self.broadcasts.get(&(*session_id, round)) {
                if let Some(result) = Self::take_ready(&messages, count) {
                    return result;
                }
            } else if count == 0 {
                return Ok(Vec::new());
            }

            tokio::select! {
                _ = rx.recv() => continue,
                _ = tokio::time::sleep(POLL_INTERVAL) => continue,
            }
        }
    }

    async fn collect_direct<T: DeserializeOwned + Send>(
        &self,
        session_id: &SessionId,
        round: u32,
        me: &IdentityHash,
        count: usize,
    ) -> Result<Vec<T>> {
        let mut rx = self.notify.subscribe();

        loop {
            if let Some(messages) = self.directs.get(&(*session_id, round, *me)) {
                if let Some(result) = Self::take_ready(&messages, count) {
                    return result;
                }
            } else if count == 0 {
                return Ok(Vec::new());
            }

            tokio::select! {
                _ = rx.recv() => continue,
                _ = tokio::time::sleep(POLL_INTERVAL) => continue,
            }
        }
    }
}
