//! Process-wide signal handlers.
//!
//! Three signals drive job control: `SIGCHLD` updates the job table as
//! children change status, and `SIGINT`/`SIGTSTP` are forwarded to the
//! foreground job's process group. Everything a handler does here must be
//! async-signal-safe: no allocation, no locks, bounded work, `errno` saved
//! and restored. Output goes through [`SioBuf`].

use std::io;

use libc::{STDERR_FILENO, STDOUT_FILENO};

use crate::cutils::{errno, set_errno};
use crate::jobs::registry;
use crate::jobs::{JobId, JobState};
use crate::system::{
    _exit,
    interface::ProcessId,
    killpg,
    signal::{consts::*, SignalHandler, SignalHandlerBehavior, SignalNumber},
    sio::SioBuf,
    wait::{Wait, WaitOptions},
};

/// Keeps the shell's dispositions registered; dropping restores the originals.
pub(crate) struct ShellSignals {
    _handlers: [SignalHandler; 6],
}

pub(crate) fn register_handlers() -> io::Result<ShellSignals> {
    Ok(ShellSignals {
        _handlers: [
            SignalHandler::register(SIGCHLD, SignalHandlerBehavior::Handler(sigchld_handler))?,
            SignalHandler::register(SIGINT, SignalHandlerBehavior::Handler(sigint_handler))?,
            SignalHandler::register(SIGTSTP, SignalHandlerBehavior::Handler(sigtstp_handler))?,
            SignalHandler::register(SIGQUIT, SignalHandlerBehavior::Handler(sigquit_handler))?,
            // a background child reading from or writing to the terminal must
            // not stop the shell itself
            SignalHandler::register(SIGTTIN, SignalHandlerBehavior::Ignore)?,
            SignalHandler::register(SIGTTOU, SignalHandlerBehavior::Ignore)?,
        ],
    })
}

/// Reap every child with a pending status change and update the job table.
///
/// Runs whenever a tracked child exits, is killed, stops or continues. The
/// handler is installed with a full `sa_mask`, so the table mutations here
/// cannot interleave with the evaluator (which blocks these signals before
/// touching the table) or with another handler.
extern "C" fn sigchld_handler(_signal: SignalNumber) {
    let saved_errno = errno();

    loop {
        let reaped = ProcessId::ANY_CHILD.wait(
            WaitOptions::new().no_hang().untraced().continued(),
        );
        let (pid, status) = match reaped {
            Ok(reaped) => reaped,
            // NotReady: all pending status changes consumed; Io: no children left
            Err(_) => break,
        };

        // SAFETY: we are in a handler registered with a full `sa_mask`
        let jobs = unsafe { registry::handler_table() };
        let jid = jobs.jid_of(pid);

        if status.did_exit() {
            jobs.remove(pid);
        } else if let Some(signal) = status.term_signal() {
            announce(jid, pid, "terminated by signal", signal);
            jobs.remove(pid);
        } else if let Some(signal) = status.stop_signal() {
            announce(jid, pid, "stopped by signal", signal);
            jobs.set_state(pid, JobState::Stopped);
        }
        // continued children were already moved out of Stopped by bg/fg
    }

    set_errno(saved_errno);
}

/// Forward an interactive interrupt (ctrl-c) to the foreground job's group.
extern "C" fn sigint_handler(_signal: SignalNumber) {
    forward_to_foreground(SIGINT);
}

/// Forward an interactive stop (ctrl-z) to the foreground job's group. The
/// job's transition to Stopped happens in `sigchld_handler` when the stop
/// notification arrives, not here.
extern "C" fn sigtstp_handler(_signal: SignalNumber) {
    forward_to_foreground(SIGTSTP);
}

/// A driver or supervisor can terminate the shell cleanly with SIGQUIT.
extern "C" fn sigquit_handler(_signal: SignalNumber) {
    let mut message = SioBuf::new();
    message.push_str("Terminating after receipt of SIGQUIT signal\n");
    message.write_to(STDERR_FILENO);
    _exit(1);
}

fn forward_to_foreground(signal: SignalNumber) {
    let saved_errno = errno();

    // SAFETY: only called from handlers registered with a full `sa_mask`
    let jobs = unsafe { registry::handler_table() };
    if let Some(pid) = jobs.foreground_pid() {
        // the job's pid doubles as its process group id
        killpg(pid, signal).ok();
    }

    set_errno(saved_errno);
}

/// `Job [<jid>] (<pid>) <what> <signal>` via a single `write(2)`.
fn announce(jid: Option<JobId>, pid: ProcessId, what: &str, signal: SignalNumber) {
    let mut message = SioBuf::new();
    message
        .push_str("Job [")
        .push_num(jid.map_or(0, |jid| jid.get()) as i64)
        .push_str("] (")
        .push_num(pid.get() as i64)
        .push_str(") ")
        .push_str(what)
        .push_str(" ")
        .push_num(signal as i64)
        .push_str("\n");
    message.write_to(STDOUT_FILENO);
}
