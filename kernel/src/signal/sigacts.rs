/*
 * Signal Disposition Table (sigacts)
 *
 * Shared, refcounted via `Arc` so `fork()` can hand the child a clone of
 * the pointer (CLONE_SIGHAND-equivalent) instead of duplicating the table,
 * when the caller asks for it; plain `fork()` duplicates the table by
 * value instead, matching ordinary POSIX fork semantics.
 */

use spin::Mutex;

use super::signum;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigDisposition {
    Default,
    Ignore,
    Handler(usize),
}

#[derive(Debug, Clone, Copy)]
pub struct SigAction {
    pub disposition: SigDisposition,
    pub mask: u64,
}

impl Default for SigAction {
    fn default() -> Self {
        SigAction { disposition: SigDisposition::Default, mask: 0 }
    }
}

pub struct SigActions {
    actions: Mutex<[SigAction; signum::MAX_SIGNUM as usize]>,
}

impl SigActions {
    pub fn new() -> Self {
        SigActions {
            actions: Mutex::new([SigAction::default(); signum::MAX_SIGNUM as usize]),
        }
    }

    pub fn get(&self, signum: u32) -> SigAction {
        self.actions.lock()[(signum - 1) as usize]
    }

    pub fn set(&self, signum: u32, action: SigAction) {
        self.actions.lock()[(signum - 1) as usize] = action;
    }

    /// Clone the table by value (used by a plain `fork()`, not a shared
    /// sigacts fork).
    pub fn duplicate(&self) -> Self {
        SigActions {
            actions: Mutex::new(*self.actions.lock()),
        }
    }

    /// POSIX execve semantics: caught signals revert to Default, ignored
    /// signals and SIGKILL/SIGSTOP-equivalents stay. Not currently wired
    /// to an exec path (exec is out of scope), kept because lifecycle.rs
    /// needs somewhere to put this when a future loader lands.
    pub fn reset_for_exec(&self) {
        let mut actions = self.actions.lock();
        for a in actions.iter_mut() {
            if let SigDisposition::Handler(_) = a.disposition {
                a.disposition = SigDisposition::Default;
            }
        }
    }
}
