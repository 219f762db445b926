use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Lifecycle state of a connector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectorState {
    NotReady,
    Ready,
    Errored,
}

impl fmt::Display for ConnectorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectorState::NotReady => "not ready",
            ConnectorState::Ready => "ready",
            ConnectorState::Errored => "errored",
        };
        f.write_str(name)
    }
}

/// Operations a cache connector may expose
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Read,
    Write,
    Delete,
}

/// Health status of the grid connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
    Unknown,
}

/// Kind of a mediated operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Get,
    Set,
    Delete,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::Get => "get",
            OperationKind::Set => "set",
            OperationKind::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Snapshot of connector statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectorStats {
    pub connection_attempts: u64,
    pub gets: u64,
    pub sets: u64,
    pub deletes: u64,
    pub failed_operations: u64,
    pub rejected_not_ready: u64,
    pub connected_at: Option<DateTime<Utc>>,
}

/// Lock-free counters behind `ConnectorStats`
#[derive(Debug, Default)]
pub(crate) struct StatsRecorder {
    connection_attempts: AtomicU64,
    gets: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
    failed_operations: AtomicU64,
    rejected_not_ready: AtomicU64,
    connected_at: Mutex<Option<DateTime<Utc>>>,
}

impl StatsRecorder {
    pub fn record_attempt(&self) {
        self.connection_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connected(&self) {
        if let Ok(mut connected_at) = self.connected_at.lock() {
            *connected_at = Some(Utc::now());
        }
    }

    pub fn record_success(&self, kind: OperationKind) {
        let counter = match kind {
            OperationKind::Get => &self.gets,
            OperationKind::Set => &self.sets,
            OperationKind::Delete => &self.deletes,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed_operations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected_not_ready.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ConnectorStats {
        ConnectorStats {
            connection_attempts: self.connection_attempts.load(Ordering::Relaxed),
            gets: self.gets.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            failed_operations: self.failed_operations.load(Ordering::Relaxed),
            rejected_not_ready: self.rejected_not_ready.load(Ordering::Relaxed),
            connected_at: self.connected_at.lock().ok().and_then(|c| *c),
        }
    }
}
