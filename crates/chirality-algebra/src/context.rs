//! Ambient context of an operation invocation

use chirality_core::{GridKind, ThreadId};
use chrono::{DateTime, Utc};

/// Where and when an operation runs
///
/// The timestamp is part of the caller's input: nothing in the algebra reads
/// the clock, so equal contexts give equal outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationContext {
    /// Namespace for the output grid id
    pub thread: ThreadId,
    /// Recorded on the output grid and the operation
    pub timestamp: DateTime<Utc>,
    /// Station label; defaults to the operation's standard station
    pub station: Option<String>,
    /// Output grid sequence number within the thread
    pub sequence: u32,
    /// Output grid kind; defaults per operation
    pub output_kind: Option<GridKind>,
}

impl OperationContext {
    /// Context with an explicit timestamp and sequence 1
    #[must_use]
    pub fn new(thread: ThreadId, timestamp: DateTime<Utc>) -> Self {
        Self {
            thread,
            timestamp,
            station: None,
            sequence: 1,
            output_kind: None,
        }
    }

    /// Context stamped with the current time
    ///
    /// Outputs built from this context are not reproducible unless the
    /// timestamp is stored alongside them.
    #[must_use]
    pub fn now(thread: ThreadId) -> Self {
        Self::new(thread, Utc::now())
    }

    #[must_use]
    pub fn with_station(mut self, station: impl Into<String>) -> Self {
        self.station = Some(station.into());
        self
    }

    #[must_use]
    pub fn with_sequence(mut self, sequence: u32) -> Self {
        self.sequence = sequence;
        self
    }

    #[must_use]
    pub fn with_output_kind(mut self, kind: GridKind) -> Self {
        self.output_kind = Some(kind);
        self
    }
}
