//! The job table: a fixed-capacity registry of tracked child processes.
//!
//! The table itself is a plain data structure with no interior locking. All
//! slots are plain old data (the command line lives in a fixed byte buffer),
//! so the `SIGCHLD` handler may mutate a table without allocating. Exclusion
//! between the handler and the evaluator is the caller's job; see
//! [`registry`].

use std::{fmt, num::ParseIntError, str::FromStr};

use crate::system::interface::ProcessId;

pub(crate) mod registry;

/// Fixed table capacity; exceeding it is a reported, non-fatal error.
pub(crate) const MAX_JOBS: usize = 16;

/// Stored command lines are truncated to this many bytes.
const MAX_CMDLINE: usize = 1024;

/// Monotonically assigned job identifier, unique while the job exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct JobId(u32);

impl JobId {
    pub(crate) fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u32>().map(JobId)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum JobState {
    Foreground,
    Background,
    Stopped,
}

impl JobState {
    /// Fixed-width state label for `jobs` output.
    pub(crate) fn label(self) -> &'static str {
        match self {
            JobState::Foreground => "Foreground ",
            JobState::Background => "Running    ",
            JobState::Stopped => "Stopped    ",
        }
    }
}

#[derive(Clone, Copy)]
struct Slot {
    /// 0 marks a free slot.
    pid: libc::pid_t,
    jid: u32,
    state: JobState,
    cmd: [u8; MAX_CMDLINE],
    cmd_len: u16,
}

impl Slot {
    const FREE: Self = Self {
        pid: 0,
        jid: 0,
        state: JobState::Background,
        cmd: [0; MAX_CMDLINE],
        cmd_len: 0,
    };

    fn in_use(&self) -> bool {
        self.pid != 0
    }
}

/// A borrowed view of one tracked job.
pub(crate) struct Job<'a> {
    pub(crate) jid: JobId,
    pub(crate) pid: ProcessId,
    pub(crate) state: JobState,
    cmd: &'a [u8],
}

impl<'a> Job<'a> {
    pub(crate) fn cmdline(&self) -> &'a str {
        // stored from a `&str` on a char boundary, so this cannot fail
        std::str::from_utf8(self.cmd).unwrap_or("")
    }
}

pub(crate) struct JobTable {
    slots: [Slot; MAX_JOBS],
    next_jid: u32,
}

impl JobTable {
    pub(crate) const fn new() -> Self {
        Self {
            slots: [Slot::FREE; MAX_JOBS],
            next_jid: 1,
        }
    }

    pub(crate) fn is_full(&self) -> bool {
        self.slots.iter().all(Slot::in_use)
    }

    /// Insert a new job, allocating the next job id.
    ///
    /// Returns `None` when the table is full.
    pub(crate) fn add(
        &mut self,
        pid: ProcessId,
        state: JobState,
        cmdline: &str,
    ) -> Option<JobId> {
        debug_assert!(pid.get() > 0);
        if state == JobState::Foreground {
            debug_assert!(self.foreground_pid().is_none());
        }

        let slot = self.slots.iter_mut().find(|slot| !slot.in_use())?;

        let mut len = cmdline.len().min(MAX_CMDLINE);
        while !cmdline.is_char_boundary(len) {
            len -= 1;
        }

        slot.pid = pid.get();
        slot.jid = self.next_jid;
        slot.state = state;
        slot.cmd[..len].copy_from_slice(&cmdline.as_bytes()[..len]);
        slot.cmd_len = len as u16;

        self.next_jid += 1;
        Some(JobId(slot.jid))
    }

    /// Remove the job tracked under `pid`, if any.
    ///
    /// The next job id collapses back to max(existing ids) + 1 so that ids
    /// stay compact across deletions.
    pub(crate) fn remove(&mut self, pid: ProcessId) -> bool {
        let Some(slot) = self.slot_mut(pid) else {
            return false;
        };
        *slot = Slot::FREE;
        self.next_jid = self.max_jid() + 1;
        true
    }

    pub(crate) fn set_state(&mut self, pid: ProcessId, state: JobState) -> bool {
        if state == JobState::Foreground {
            debug_assert!(self
                .foreground_pid()
                .map_or(true, |foreground| foreground == pid));
        }
        match self.slot_mut(pid) {
            Some(slot) => {
                slot.state = state;
                true
            }
            None => false,
        }
    }

    pub(crate) fn get(&self, pid: ProcessId) -> Option<Job<'_>> {
        self.slots
            .iter()
            .find(|slot| slot.in_use() && slot.pid == pid.get())
            .map(Self::view)
    }

    pub(crate) fn pid_of(&self, jid: JobId) -> Option<ProcessId> {
        self.slots
            .iter()
            .find(|slot| slot.in_use() && slot.jid == jid.get())
            .map(|slot| ProcessId::new(slot.pid))
    }

    pub(crate) fn jid_of(&self, pid: ProcessId) -> Option<JobId> {
        self.get(pid).map(|job| job.jid)
    }

    /// The pid of the job currently in the foreground; at most one exists.
    pub(crate) fn foreground_pid(&self) -> Option<ProcessId> {
        self.slots
            .iter()
            .find(|slot| slot.in_use() && slot.state == JobState::Foreground)
            .map(|slot| ProcessId::new(slot.pid))
    }

    /// Slot-order snapshot of the active jobs, for display.
    pub(crate) fn iter(&self) -> impl Iterator<Item = Job<'_>> {
        self.slots.iter().filter(|slot| slot.in_use()).map(Self::view)
    }

    fn view(slot: &Slot) -> Job<'_> {
        Job {
            jid: JobId(slot.jid),
            pid: ProcessId::new(slot.pid),
            state: slot.state,
            cmd: &slot.cmd[..slot.cmd_len as usize],
        }
    }

    fn slot_mut(&mut self, pid: ProcessId) -> Option<&mut Slot> {
        self.slots
            .iter_mut()
            .find(|slot| slot.in_use() && slot.pid == pid.get())
    }

    fn max_jid(&self) -> u32 {
        self.slots
            .iter()
            .filter(|slot| slot.in_use())
            .map(|slot| slot.jid)
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{JobState, JobTable, MAX_JOBS};
    use crate::system::interface::ProcessId;

    fn pid(n: i32) -> ProcessId {
        ProcessId::new(n)
    }

    #[test]
    fn job_ids_increase_monotonically() {
        let mut table = JobTable::new();
        for n in 1..=5 {
            let jid = table.add(pid(100 + n), JobState::Background, "sleep 1 &").unwrap();
            assert_eq!(jid.get(), n as u32);
        }
    }

    #[test]
    fn next_id_collapses_to_max_plus_one_after_removal() {
        let mut table = JobTable::new();
        table.add(pid(101), JobState::Background, "a &").unwrap();
        table.add(pid(102), JobState::Background, "b &").unwrap();
        table.add(pid(103), JobState::Background, "c &").unwrap();

        assert!(table.remove(pid(103)));
        let jid = table.add(pid(104), JobState::Background, "d &").unwrap();
        assert_eq!(jid.get(), 3);

        assert!(table.remove(pid(101)));
        let jid = table.add(pid(105), JobState::Background, "e &").unwrap();
        assert_eq!(jid.get(), 4);
    }

    #[test]
    fn next_id_resets_to_one_when_table_empties() {
        let mut table = JobTable::new();
        table.add(pid(101), JobState::Background, "a &").unwrap();
        table.add(pid(102), JobState::Background, "b &").unwrap();
        table.remove(pid(101));
        table.remove(pid(102));
        let jid = table.add(pid(103), JobState::Background, "c &").unwrap();
        assert_eq!(jid.get(), 1);
    }

    #[test]
    fn removing_an_untracked_pid_is_a_no_op() {
        let mut table = JobTable::new();
        table.add(pid(101), JobState::Background, "a &").unwrap();
        assert!(!table.remove(pid(999)));
        assert_eq!(table.iter().count(), 1);
    }

    #[test]
    fn capacity_is_enforced() {
        let mut table = JobTable::new();
        for n in 0..MAX_JOBS as i32 {
            assert!(table.add(pid(100 + n), JobState::Background, "x &").is_some());
        }
        assert!(table.is_full());
        assert!(table.add(pid(999), JobState::Background, "y &").is_none());

        // freeing one slot makes room again
        table.remove(pid(100));
        assert!(table.add(pid(999), JobState::Background, "y &").is_some());
    }

    #[test]
    fn at_most_one_foreground_job() {
        let mut table = JobTable::new();
        table.add(pid(101), JobState::Foreground, "cat").unwrap();
        table.add(pid(102), JobState::Background, "sleep 5 &").unwrap();
        assert_eq!(table.foreground_pid(), Some(pid(101)));

        // moving the foreground job out makes room for another
        table.set_state(pid(101), JobState::Stopped);
        assert_eq!(table.foreground_pid(), None);
        table.set_state(pid(102), JobState::Foreground);
        assert_eq!(table.foreground_pid(), Some(pid(102)));
    }

    #[test]
    fn set_state_is_idempotent() {
        let mut table = JobTable::new();
        table.add(pid(101), JobState::Foreground, "cat").unwrap();
        assert!(table.set_state(pid(101), JobState::Foreground));
        assert!(table.set_state(pid(101), JobState::Foreground));
        assert_eq!(table.foreground_pid(), Some(pid(101)));
        assert!(!table.set_state(pid(999), JobState::Stopped));
    }

    #[test]
    fn snapshot_lists_exactly_the_tracked_jobs() {
        let mut table = JobTable::new();
        table.add(pid(101), JobState::Background, "sleep 5 &").unwrap();
        table.add(pid(102), JobState::Stopped, "vi notes").unwrap();

        let listed: Vec<(u32, i32, &str)> = table
            .iter()
            .map(|job| (job.jid.get(), job.pid.get(), job.cmdline()))
            .collect();
        assert_eq!(listed, [(1, 101, "sleep 5 &"), (2, 102, "vi notes")]);
    }

    #[test]
    fn lookup_by_either_id() {
        let mut table = JobTable::new();
        let jid = table.add(pid(101), JobState::Background, "a &").unwrap();
        assert_eq!(table.pid_of(jid), Some(pid(101)));
        assert_eq!(table.jid_of(pid(101)), Some(jid));
        assert_eq!(table.pid_of("7".parse().unwrap()), None);
        assert_eq!(table.jid_of(pid(7)), None);
    }

    #[test]
    fn overlong_command_lines_are_truncated() {
        let mut table = JobTable::new();
        let long = "x".repeat(super::MAX_CMDLINE + 100);
        table.add(pid(101), JobState::Background, &long).unwrap();
        let job = table.get(pid(101)).unwrap();
        assert_eq!(job.cmdline().len(), super::MAX_CMDLINE);
    }
}
