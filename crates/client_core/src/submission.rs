use std::sync::atomic::{AtomicBool, Ordering};

use shared::error::WorkflowError;

/// Allows at most one outstanding submission per controller.
#[derive(Debug, Default)]
pub(crate) struct SubmissionGate {
    busy: AtomicBool,
}

impl SubmissionGate {
    pub(crate) fn try_enter(&self) -> Result<SubmissionPermit<'_>, WorkflowError> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| WorkflowError::Busy)?;
        Ok(SubmissionPermit { busy: &self.busy })
    }

    pub(crate) fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Clears the gate when dropped, on every exit path.
pub(crate) struct SubmissionPermit<'a> {
    busy: &'a AtomicBool,
}

impl Drop for SubmissionPermit<'_> {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}
