//! Error types for the store layer.

/// Errors that can occur in the persistence provider.
///
/// A failed commit applies nothing: the transaction's buffered writes are
/// discarded as a unit, so callers never observe partial mutations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A commit-time constraint was violated (duplicate membership, a user
    /// joining a second room, counter outside `0..=max_players`, …).
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// Reading or writing a snapshot file failed.
    #[error("snapshot i/o failed: {0}")]
    Io(#[from] std::io::Error),

    /// A snapshot could not be serialized or parsed.
    #[error("snapshot encoding failed: {0}")]
    Snapshot(#[from] serde_json::Error),

    /// The underlying store rejected or aborted the operation.
    ///
    /// The in-memory store never produces this; it exists for injected
    /// providers (real databases, failure-simulating test doubles).
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
