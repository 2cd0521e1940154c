//! Performance diagnostics.
//!
//! Lowering a computation whose inputs are all constants is correct but
//! wasteful: the emitted code recomputes a value known at build time. The
//! context reports such calls to an optional [`PerfLog`].

/// One diagnostic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PerfNote {
    /// Operation that was lowered.
    pub op: &'static str,
    /// What was inefficient about it.
    pub reason: &'static str,
}

/// Receiver for [`PerfNote`]s.
pub trait PerfLog {
    /// Record one note.
    fn note(&self, note: PerfNote);
}

/// Forwards notes to `tracing` at warn level.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingPerfLog;

impl PerfLog for TracingPerfLog {
    fn note(&self, note: PerfNote) {
        tracing::warn!(op = note.op, "{}", note.reason);
    }
}
