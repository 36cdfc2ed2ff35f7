use std::{
    ffi::CString,
    io,
    os::fd::{FromRawFd, OwnedFd, RawFd},
};

use crate::cutils::cerr;

use self::interface::ProcessId;
use self::signal::SignalNumber;

pub mod interface;

pub mod signal;

pub(crate) mod sio;

pub(crate) mod wait;

pub(crate) fn _exit(status: libc::c_int) -> ! {
    // SAFETY: `_exit` does not return, and is callable from any context
    unsafe { libc::_exit(status) }
}

pub(crate) enum ForkResult {
    /// Parent process branch with the child process' PID.
    Parent(ProcessId),
    /// Child process branch.
    Child,
}

/// Create a new process.
///
/// The shell is single threaded, so the child may keep using the standard
/// library between `fork` and `exec`.
pub(crate) fn fork() -> io::Result<ForkResult> {
    // SAFETY: `fork` has no safety preconditions in a single-threaded process
    let pid = cerr(unsafe { libc::fork() })?;
    if pid == 0 {
        Ok(ForkResult::Child)
    } else {
        Ok(ForkResult::Parent(ProcessId::new(pid)))
    }
}

/// Send a signal to a process with the specified ID.
#[cfg(test)]
pub(crate) fn kill(pid: ProcessId, signal: SignalNumber) -> io::Result<()> {
    // SAFETY: this function cannot cause UB even if `pid` is not a valid
    // process ID or if `signal` is not a valid signal code.
    cerr(unsafe { libc::kill(pid.get(), signal) }).map(|_| ())
}

/// Send a signal to the entire process group with the specified ID.
pub(crate) fn killpg(pgid: ProcessId, signal: SignalNumber) -> io::Result<()> {
    // SAFETY: as for `kill`
    cerr(unsafe { libc::killpg(pgid.get(), signal) }).map(|_| ())
}

/// Get the process group ID of the current process.
#[cfg(test)]
pub(crate) fn getpgrp() -> ProcessId {
    // SAFETY: this function is always safe to call
    ProcessId::new(unsafe { libc::getpgrp() })
}

/// Get a process group ID.
#[cfg(test)]
pub(crate) fn getpgid(pid: ProcessId) -> io::Result<ProcessId> {
    // SAFETY: this function cannot cause UB even if `pid` is not a valid process ID
    cerr(unsafe { libc::getpgid(pid.get()) }).map(ProcessId::new)
}

/// Set a process group ID.
#[cfg(test)]
pub(crate) fn setpgid(pid: ProcessId, pgid: ProcessId) -> io::Result<()> {
    // SAFETY: as for `getpgid`
    cerr(unsafe { libc::setpgid(pid.get(), pgid.get()) }).map(|_| ())
}

/// Move the calling process into a fresh process group with itself as leader.
///
/// A spawned child calls this before `exec` so that terminal-generated
/// signals aimed at the shell's own group never reach it directly; the shell
/// forwards them to the foreground group explicitly.
pub(crate) fn become_process_group_leader() -> io::Result<()> {
    // SAFETY: pid 0 / pgid 0 means "the calling process, using its own pid"
    cerr(unsafe { libc::setpgid(0, 0) }).map(|_| ())
}

/// Duplicate a file descriptor, returning an owned handle to the duplicate.
pub(crate) fn dup(fd: RawFd) -> io::Result<OwnedFd> {
    // SAFETY: `dup` cannot cause UB; a negative return is mapped to an error
    let duplicate = cerr(unsafe { libc::dup(fd) })?;
    // SAFETY: `duplicate` is a freshly created descriptor owned by us alone
    Ok(unsafe { OwnedFd::from_raw_fd(duplicate) })
}

/// Make `to` refer to the same open file description as `from`.
pub(crate) fn dup2(from: RawFd, to: RawFd) -> io::Result<()> {
    // SAFETY: `dup2` cannot cause UB even on invalid descriptors
    cerr(unsafe { libc::dup2(from, to) }).map(|_| ())
}

/// Replace the process image, searching `PATH` for the program and passing the
/// environment along unmodified. Only returns on failure.
pub(crate) fn execvp(argv: &[CString]) -> io::Error {
    let mut argv_ptrs: Vec<*const libc::c_char> = argv.iter().map(|arg| arg.as_ptr()).collect();
    argv_ptrs.push(std::ptr::null());

    // SAFETY: `argv_ptrs` is a null-terminated array of pointers to valid C strings
    unsafe { libc::execvp(argv_ptrs[0], argv_ptrs.as_ptr()) };

    io::Error::last_os_error()
}

pub(crate) fn make_zeroed_sigaction() -> libc::sigaction {
    // SAFETY: since sigaction is a C struct, all-zeroes is a valid representation.
    // We cannot use a "literal struct" initialization method since the exact
    // representation of libc::sigaction is not fixed.
    unsafe { std::mem::zeroed() }
}
