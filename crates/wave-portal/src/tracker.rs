use crate::{
    error::WaveError,
    types::{TransactionHandle, TxState},
};

/// Follows one wave transaction at a time from submission to a terminal state, along with the
/// wave count before and after it.
///
/// Handles are discarded as soon as they reach a terminal state and are handed back to the
/// caller. A handle whose confirmation timed out stays tracked, still pending.
#[derive(Clone, Debug, Default)]
pub struct TransactionTracker {
    current: Option<TransactionHandle>,
    count_before: Option<u64>,
    count_after: Option<u64>,
    confirmed: u64,
    failed: u64,
}

impl TransactionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new submission, remembering the wave count read just before it.
    ///
    /// The snapshot is for display only; nothing depends on it being accurate.
    pub fn begin(&mut self, count_snapshot: Option<u64>) {
        if let Some(stale) = self.current.take() {
            debug!(tx = %stale.id(), "no longer tracking unconfirmed transaction");
        }
        self.count_before = count_snapshot;
        self.count_after = None;
    }

    /// Tracks a handle the wallet just returned.
    pub fn track(&mut self, handle: TransactionHandle) {
        self.current = Some(handle);
    }

    /// Moves the tracked handle from `Submitted` to `Mining`.
    pub fn mining(&mut self) -> Result<(), WaveError> {
        match self.current.as_mut() {
            Some(handle) => handle.mark_mining(),
            None => Ok(()),
        }
    }

    /// Records the terminal handle reported by the network and stops tracking it.
    pub fn settle(&mut self, handle: TransactionHandle, count_after: Option<u64>) -> TransactionHandle {
        debug_assert!(handle.is_terminal(), "settling a non-terminal transaction");
        match handle.state() {
            TxState::Confirmed => self.confirmed += 1,
            TxState::Failed => self.failed += 1,
            TxState::Submitted | TxState::Mining => {}
        }
        self.count_after = count_after;
        self.current = None;
        handle
    }

    /// Fails the tracked handle, if any, and stops tracking it.
    pub fn fail(&mut self, reason: &str) -> Option<TransactionHandle> {
        let mut handle = self.current.take()?;
        if let Err(err) = handle.fail(reason) {
            warn!(%err, "could not mark transaction as failed");
        }
        self.failed += 1;
        Some(handle)
    }

    /// Drops an attempt that never produced a transaction, e.g. the user declined to sign.
    pub fn abandon(&mut self) {
        self.current = None;
    }

    /// The transaction currently in flight, if any.
    pub fn pending(&self) -> Option<&TransactionHandle> {
        self.current.as_ref()
    }

    pub fn count_before(&self) -> Option<u64> {
        self.count_before
    }

    pub fn count_after(&self) -> Option<u64> {
        self.count_after
    }

    /// How much the wave count grew across the last settled submission, if both reads succeeded.
    pub fn count_delta(&self) -> Option<i128> {
        Some(i128::from(self.count_after?) - i128::from(self.count_before?))
    }

    pub fn confirmed(&self) -> u64 {
        self.confirmed
    }

    pub fn failed(&self) -> u64 {
        self.failed
    }
}
