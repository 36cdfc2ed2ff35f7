//! Utilities to handle signals.
use std::{io, mem::MaybeUninit};

use libc::c_int;

use crate::cutils::{cerr, errno};
use crate::system::make_zeroed_sigaction;

pub(crate) type SignalNumber = c_int;

/// A low-level handler function. It runs on the signal delivery stack, so it
/// is restricted to async-signal-safe operations.
pub(crate) type HandlerFn = extern "C" fn(SignalNumber);

/// The possible dispositions installed by a [`SignalHandler`].
pub(crate) enum SignalHandlerBehavior {
    /// Execute the default action for the signal.
    Default,
    /// Ignore the arrival of the signal.
    Ignore,
    /// Invoke the given function on arrival of the signal.
    Handler(HandlerFn),
}

#[repr(transparent)]
struct SignalAction {
    raw: libc::sigaction,
}

impl SignalAction {
    fn new(behavior: SignalHandlerBehavior) -> io::Result<Self> {
        // Restart interrupted syscalls so the read loop doesn't observe EINTR.
        let sa_flags = libc::SA_RESTART;

        let (sa_sigaction, sa_mask) = match behavior {
            SignalHandlerBehavior::Default => (libc::SIG_DFL, SignalSet::empty()?),
            SignalHandlerBehavior::Ignore => (libc::SIG_IGN, SignalSet::empty()?),
            // A full `sa_mask` means the handler runs with every signal
            // blocked: it cannot be interrupted by another tracked signal
            // while it mutates shared state.
            SignalHandlerBehavior::Handler(f) => {
                (f as libc::sighandler_t, SignalSet::full()?)
            }
        };

        let mut raw: libc::sigaction = make_zeroed_sigaction();
        raw.sa_sigaction = sa_sigaction;
        raw.sa_mask = sa_mask.raw;
        raw.sa_flags = sa_flags;

        Ok(Self { raw })
    }

    fn register(&self, signal: SignalNumber) -> io::Result<Self> {
        let mut original_action = MaybeUninit::<Self>::zeroed();

        // SAFETY: `self.raw` is a fully initialized `sigaction` and the out
        // pointer refers to writable memory of the right size.
        cerr(unsafe { libc::sigaction(signal, &self.raw, original_action.as_mut_ptr().cast()) })?;

        // SAFETY: `sigaction` filled in the previous disposition on success
        Ok(unsafe { original_action.assume_init() })
    }
}

/// A registered disposition for a signal.
///
/// When a value of this type is dropped, it restores the action that was
/// registered for the signal before [`SignalHandler::register`] was called.
pub(crate) struct SignalHandler {
    signal: SignalNumber,
    original_action: SignalAction,
}

impl SignalHandler {
    const FORBIDDEN: &'static [SignalNumber] = &[consts::SIGKILL, consts::SIGSTOP];

    /// Register a new disposition for the given signal.
    ///
    /// # Panics
    ///
    /// If the action for the provided signal cannot be overridden.
    pub(crate) fn register(
        signal: SignalNumber,
        behavior: SignalHandlerBehavior,
    ) -> io::Result<Self> {
        if Self::FORBIDDEN.contains(&signal) {
            panic!(
                "the {} signal action cannot be overriden",
                signal_name(signal)
            );
        }

        let action = SignalAction::new(behavior)?;
        let original_action = action.register(signal)?;

        Ok(Self {
            signal,
            original_action,
        })
    }
}

impl Drop for SignalHandler {
    fn drop(&mut self) {
        self.original_action.register(self.signal).ok();
    }
}

/// A signal set that can be used to mask signals.
#[repr(transparent)]
pub(crate) struct SignalSet {
    raw: libc::sigset_t,
}

impl SignalSet {
    /// Create an empty set.
    pub(crate) fn empty() -> io::Result<Self> {
        let mut set = MaybeUninit::<Self>::zeroed();

        // SAFETY: `sigemptyset` initializes the pointee
        cerr(unsafe { libc::sigemptyset(set.as_mut_ptr().cast()) })?;

        // SAFETY: initialized above
        Ok(unsafe { set.assume_init() })
    }

    /// Create a set containing all the signals.
    pub(crate) fn full() -> io::Result<Self> {
        let mut set = MaybeUninit::<Self>::zeroed();

        // SAFETY: `sigfillset` initializes the pointee
        cerr(unsafe { libc::sigfillset(set.as_mut_ptr().cast()) })?;

        // SAFETY: initialized above
        Ok(unsafe { set.assume_init() })
    }

    /// Create a set containing exactly the given signals.
    pub(crate) fn with_signals(signals: &[SignalNumber]) -> io::Result<Self> {
        let mut set = Self::empty()?;
        for &signal in signals {
            // SAFETY: `set.raw` was initialized by `sigemptyset`
            cerr(unsafe { libc::sigaddset(&mut set.raw, signal) })?;
        }
        Ok(set)
    }

    fn sigprocmask(&self, how: libc::c_int) -> io::Result<Self> {
        let mut original_set = MaybeUninit::<Self>::zeroed();

        // SAFETY: `self.raw` is an initialized signal set and the out pointer
        // refers to writable memory of the right size.
        cerr(unsafe { libc::sigprocmask(how, &self.raw, original_set.as_mut_ptr().cast()) })?;

        // SAFETY: `sigprocmask` filled in the previous mask on success
        Ok(unsafe { original_set.assume_init() })
    }

    /// Block all the signals in this set and return the previous set of blocked signals.
    ///
    /// After calling this function successfully, the set of blocked signals will be the union of
    /// the previous set of blocked signals and this set.
    pub(crate) fn block(&self) -> io::Result<Self> {
        self.sigprocmask(libc::SIG_BLOCK)
    }

    /// Block only the signals that are in this set and return the previous set of blocked signals.
    ///
    /// After calling this function successfully, the set of blocked signals will be exactly
    /// this set.
    pub(crate) fn set_mask(&self) -> io::Result<Self> {
        self.sigprocmask(libc::SIG_SETMASK)
    }

    /// Atomically replace the blocked-signal mask with this set and wait for a
    /// handled signal to arrive. The previous mask is reinstated before this
    /// function returns.
    ///
    /// The atomicity is what prevents lost wakeups: a status change that is
    /// delivered between checking a condition (under a blocking mask) and
    /// suspending will still be observed by the suspend.
    pub(crate) fn suspend(&self) -> io::Result<()> {
        // SAFETY: `self.raw` is an initialized signal set
        unsafe { libc::sigsuspend(&self.raw) };

        // sigsuspend always returns -1; anything other than EINTR is a real failure
        if errno() == libc::EINTR {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }
}

macro_rules! define_consts {
    ($($signal:ident,)*) => {
        pub(crate) mod consts {
            pub(crate) use libc::{$($signal,)*};
        }

        pub(crate) fn signal_name(signal: SignalNumber) -> &'static str {
            match signal {
                $(consts::$signal => stringify!($signal),)*
                _ => "unknown signal",
            }
        }
    };
}

define_consts! {
    SIGINT,
    SIGQUIT,
    SIGTSTP,
    SIGCHLD,
    SIGCONT,
    SIGTTIN,
    SIGTTOU,
    SIGKILL,
    SIGSTOP,
}
