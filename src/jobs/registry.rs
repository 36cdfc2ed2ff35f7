//! The process-wide job registry and the signal-mask discipline that guards it.
//!
//! There is one [`JobTable`] per shell process and two ways to reach it:
//!
//! * [`JobsLock`], the only access path for the evaluator and the builtins.
//!   Acquiring it blocks delivery of the tracked signals, so the handlers
//!   cannot interrupt a mutation in progress; dropping it restores the
//!   previous mask.
//! * [`handler_table`], for the `SIGCHLD` handler alone, which runs with a
//!   full `sa_mask` and therefore already has the exclusion the lock would
//!   provide.
//!
//! Blocking the mask *before* forking is what closes the classic race where
//! a short-lived child exits, and is reaped, before its table entry exists.

use std::{io, ptr};

use crate::system::signal::{consts::*, SignalSet};

use super::JobTable;

static mut TABLE: JobTable = JobTable::new();

/// The signals whose handlers may observe or mutate the registry.
fn tracked_signals() -> io::Result<SignalSet> {
    SignalSet::with_signals(&[SIGCHLD, SIGINT, SIGTSTP, SIGQUIT])
}

/// Scoped access to the registry with the tracked signals blocked.
pub(crate) struct JobsLock {
    saved: SignalSet,
}

impl JobsLock {
    pub(crate) fn acquire() -> io::Result<Self> {
        let saved = tracked_signals()?.block()?;
        Ok(Self { saved })
    }

    pub(crate) fn table(&mut self) -> &mut JobTable {
        // SAFETY: while this lock is alive the tracked signals are blocked,
        // so no handler can run; the shell is single threaded, so the
        // reference handed out here is the only live access to the table.
        unsafe { &mut *ptr::addr_of_mut!(TABLE) }
    }

    /// The mask that was in effect before this lock was acquired.
    pub(crate) fn saved_mask(&self) -> &SignalSet {
        &self.saved
    }

    /// Atomically restore the saved mask and wait for a handled signal, then
    /// re-block. Used by the foreground wait so that a status change arriving
    /// between a table check and the suspension still wakes it.
    pub(crate) fn suspend(&self) -> io::Result<()> {
        self.saved.suspend()
    }
}

impl Drop for JobsLock {
    fn drop(&mut self) {
        self.saved.set_mask().ok();
    }
}

/// Registry access for signal handlers.
///
/// # Safety
///
/// Must only be called from a signal handler installed with a full `sa_mask`;
/// that mask is what guarantees no [`JobsLock`] holder is mid-mutation and no
/// other handler is running.
pub(crate) unsafe fn handler_table() -> &'static mut JobTable {
    &mut *ptr::addr_of_mut!(TABLE)
}
