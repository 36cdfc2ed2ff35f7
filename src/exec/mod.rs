//! The evaluator: one pass per input line.
//!
//! A tokenized request is either a builtin, handled in-process, or an
//! external command, run in a forked child that becomes its own process
//! group leader. The tracked signals are blocked for the whole evaluation;
//! in particular they are already blocked when `fork` happens, so a child
//! cannot be reaped before its job-table entry exists.

mod signal;

use std::ffi::CString;
use std::fs::File;
use std::io;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};

use libc::{STDIN_FILENO, STDOUT_FILENO};

use crate::common::Error;
use crate::jobs::registry::JobsLock;
use crate::jobs::{JobId, JobState, JobTable};
use crate::log::{dev_info, user_error};
use crate::parse::{Builtin, Request};
use crate::system::signal::consts::SIGCONT;
use crate::system::{self, _exit, interface::ProcessId, killpg, ForkResult};

pub(crate) use signal::register_handlers;

/// Evaluate one input line.
///
/// User-attributable problems (bad syntax, unknown commands, full table) are
/// reported and recovered; an `Err` from here means a shell control
/// primitive failed and the caller should terminate.
pub(crate) fn eval(line: &str) -> Result<(), Error> {
    let request = match Request::parse(line) {
        Ok(request) => request,
        Err(err) => {
            user_error!("{err}");
            return Ok(());
        }
    };
    if request.is_empty() {
        return Ok(());
    }

    let mut lock = JobsLock::acquire().map_err(Error::SignalSetup)?;

    match request.builtin {
        Builtin::Quit => std::process::exit(0),
        Builtin::Jobs => run_jobs(&mut lock, &request),
        Builtin::Bg => run_bg(&mut lock, &request),
        Builtin::Fg => run_fg(&mut lock, &request)?,
        Builtin::None => run_external(&mut lock, &request)?,
    }

    Ok(())
}

/// `jobs`: print the table, honoring redirection of the shell's own stdout.
fn run_jobs(lock: &mut JobsLock, request: &Request) {
    let _restore = match RedirectGuard::apply(request) {
        Ok(guard) => guard,
        Err(RedirectError(path, err)) => {
            user_error!("{}: {err}", path.display());
            return;
        }
    };

    for job in lock.table().iter() {
        println_ignore_io_error!(
            "[{}] ({}) {}{}",
            job.jid,
            job.pid,
            job.state.label(),
            job.cmdline()
        );
    }
}

/// `bg <pid|%jid>`: move a job to the background and resume its group.
fn run_bg(lock: &mut JobsLock, request: &Request) {
    let table = lock.table();
    let Some(pid) = resolve_target(table, request) else {
        // unresolvable targets act on nothing
        dev_info!("bg: no job matches {:?}", request.argv.get(1));
        return;
    };

    table.set_state(pid, JobState::Background);
    if let Some(job) = table.get(pid) {
        println_ignore_io_error!("[{}] ({}) {}", job.jid, job.pid, job.cmdline());
    }
    killpg(pid, SIGCONT).ok();
}

/// `fg <pid|%jid>`: move a job to the foreground, resume its group, and wait.
fn run_fg(lock: &mut JobsLock, request: &Request) -> Result<(), Error> {
    let Some(pid) = resolve_target(lock.table(), request) else {
        dev_info!("fg: no job matches {:?}", request.argv.get(1));
        return Ok(());
    };

    lock.table().set_state(pid, JobState::Foreground);
    killpg(pid, SIGCONT).ok();
    wait_foreground(lock)
}

/// Resolve a `bg`/`fg` argument: a bare number is a pid, `%n` is a job id.
fn resolve_target(table: &JobTable, request: &Request) -> Option<ProcessId> {
    if request.argv.len() != 2 {
        return None;
    }
    let arg = request.argv[1].as_str();

    if let Some(jid) = arg.strip_prefix('%') {
        let jid: JobId = jid.parse().ok()?;
        table.pid_of(jid)
    } else {
        let pid: ProcessId = arg.parse().ok()?;
        table.get(pid).map(|job| job.pid)
    }
}

/// Fork and exec an external command, tracking it as a job.
fn run_external(lock: &mut JobsLock, request: &Request) -> Result<(), Error> {
    // Refusing to fork when the table is full keeps every running child
    // tracked; the alternative (an untracked child) can never be stopped or
    // resumed again.
    if lock.table().is_full() {
        user_error!("too many jobs");
        return Ok(());
    }

    // prepared before the fork so the child goes straight to exec
    let mut argv = Vec::with_capacity(request.argv.len());
    for arg in &request.argv {
        match CString::new(arg.as_str()) {
            Ok(arg) => argv.push(arg),
            Err(_) => {
                user_error!("{}: invalid argument", request.argv[0]);
                return Ok(());
            }
        }
    }

    let state = if request.background {
        JobState::Background
    } else {
        JobState::Foreground
    };

    match system::fork().map_err(Error::Fork)? {
        ForkResult::Child => exec_child(request, &argv, lock),
        ForkResult::Parent(pid) => {
            match lock.table().add(pid, state, request.raw()) {
                Some(jid) => {
                    if request.background {
                        println_ignore_io_error!("[{jid}] ({pid}) {}", request.raw());
                    } else {
                        wait_foreground(lock)?;
                    }
                }
                // capacity was checked before the fork
                None => user_error!("too many jobs"),
            }
            Ok(())
        }
    }
}

/// Suspend until no job remains in the foreground.
///
/// Each `suspend` atomically swaps in the pre-evaluation mask and waits for a
/// handled signal; the condition is re-checked on every wakeup, and a status
/// change delivered between the check and the suspension is not lost.
fn wait_foreground(lock: &mut JobsLock) -> Result<(), Error> {
    while lock.table().foreground_pid().is_some() {
        lock.suspend().map_err(Error::SignalSetup)?;
    }
    Ok(())
}

/// The forked child: new process group, original mask, redirection, exec.
fn exec_child(request: &Request, argv: &[CString], lock: &JobsLock) -> ! {
    if let Err(err) = system::become_process_group_leader() {
        eprintln_ignore_io_error!("jobsh: cannot create process group: {err}");
        _exit(1);
    }

    // the child must not inherit the evaluator's blocked mask
    lock.saved_mask().set_mask().ok();

    if let Some(path) = &request.infile {
        match File::open(path) {
            Ok(file) => redirect_or_die(&file, STDIN_FILENO),
            Err(err) => {
                eprintln_ignore_io_error!("{}: {err}", path.display());
                _exit(1);
            }
        }
    }
    if let Some(path) = &request.outfile {
        match File::options().write(true).create(true).truncate(true).open(path) {
            Ok(file) => redirect_or_die(&file, STDOUT_FILENO),
            Err(err) => {
                eprintln_ignore_io_error!("{}: {err}", path.display());
                _exit(1);
            }
        }
    }

    let err = system::execvp(argv);
    if err.kind() == io::ErrorKind::NotFound {
        eprintln_ignore_io_error!("{}: command not found", request.argv[0]);
    } else {
        eprintln_ignore_io_error!("{}: {err}", request.argv[0]);
    }
    _exit(1)
}

fn redirect_or_die(file: &File, target: RawFd) {
    if let Err(err) = system::dup2(file.as_raw_fd(), target) {
        eprintln_ignore_io_error!("jobsh: cannot redirect: {err}");
        _exit(1);
    }
    // `file` closing afterwards is fine; `target` keeps the description open
}

struct RedirectError(std::path::PathBuf, io::Error);

/// Applies a builtin's redirection to the shell's own stdio and restores the
/// saved descriptors when dropped.
struct RedirectGuard {
    saved: Vec<(OwnedFd, RawFd)>,
}

impl RedirectGuard {
    fn apply(request: &Request) -> Result<Self, RedirectError> {
        let mut guard = Self { saved: Vec::new() };

        if let Some(path) = &request.infile {
            let file = File::open(path).map_err(|err| RedirectError(path.clone(), err))?;
            guard
                .swap_in(&file, STDIN_FILENO)
                .map_err(|err| RedirectError(path.clone(), err))?;
        }
        if let Some(path) = &request.outfile {
            let file = File::options()
                .write(true)
                .create(true)
                .truncate(true)
                .open(path)
                .map_err(|err| RedirectError(path.clone(), err))?;
            guard
                .swap_in(&file, STDOUT_FILENO)
                .map_err(|err| RedirectError(path.clone(), err))?;
        }

        Ok(guard)
    }

    fn swap_in(&mut self, file: &File, target: RawFd) -> io::Result<()> {
        let saved = system::dup(target)?;
        system::dup2(file.as_raw_fd(), target)?;
        self.saved.push((saved, target));
        Ok(())
    }
}

impl Drop for RedirectGuard {
    fn drop(&mut self) {
        // restore in reverse, flushing anything buffered for the redirect first
        let _ = io::Write::flush(&mut io::stdout());
        for (saved, target) in self.saved.drain(..).rev() {
            system::dup2(saved.as_raw_fd(), target).ok();
        }
    }
}
