// src/session/navigator.rs

use std::collections::BTreeSet;

/// Result of [`SectionNavigator::lock_current_section`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOutcome {
    /// The section was locked before; nothing changed.
    AlreadyLocked,
    /// Section `from` is now locked and `to` is the new active section.
    Advanced { from: usize, to: usize },
    /// The last section is now locked; the exam is ready to be submitted.
    Finished { last: usize },
}

/// Tracks the active section, the locked ones, and the review cursor.
///
/// `current` is the section whose clock is running. Locking it is the only
/// way forward. `viewing` lets the candidate page back through locked
/// sections read-only; it can never pass `current`.
#[derive(Debug, Clone)]
pub struct SectionNavigator {
    count: usize,
    current: usize,
    viewing: usize,
    locked: BTreeSet<usize>,
}

impl SectionNavigator {
    pub fn new(count: usize) -> Self {
        Self {
            count,
            current: 0,
            viewing: 0,
            locked: BTreeSet::new(),
        }
    }

    pub fn section_count(&self) -> usize {
        self.count
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn viewing(&self) -> usize {
        self.viewing
    }

    pub fn last_index(&self) -> usize {
        self.count.saturating_sub(1)
    }

    pub fn is_locked(&self, index: usize) -> bool {
        self.locked.contains(&index)
    }

    /// Only the active, unlocked section accepts answers.
    pub fn is_editable(&self, index: usize) -> bool {
        index == self.current && !self.is_locked(index)
    }

    /// True once the last section is locked.
    pub fn is_finished(&self) -> bool {
        self.count > 0 && self.is_locked(self.last_index())
    }

    pub fn lock_current_section(&mut self) -> LockOutcome {
        self.lock_section(self.current)
    }

    /// Locks `index` if it is the active section. Any other index (already
    /// locked, or not reached yet) is a no-op, so a timer expiry and a
    /// manual submit racing for the same section advance only once.
    pub fn lock_section(&mut self, index: usize) -> LockOutcome {
        if self.count == 0 || index != self.current || !self.locked.insert(index) {
            return LockOutcome::AlreadyLocked;
        }

        let from = self.current;
        if from < self.last_index() {
            self.current += 1;
            self.viewing = self.current;
            LockOutcome::Advanced { from, to: self.current }
        } else {
            self.viewing = from;
            LockOutcome::Finished { last: from }
        }
    }

    /// Gate for the "Next Section" control.
    pub fn can_advance(&self) -> bool {
        self.is_locked(self.viewing) && self.viewing < self.current
    }

    pub fn can_retreat(&self) -> bool {
        self.viewing > 0
    }

    pub fn advance(&mut self) -> bool {
        if !self.can_advance() {
            return false;
        }
        self.viewing += 1;
        true
    }

    pub fn retreat(&mut self) -> bool {
        if !self.can_retreat() {
            return false;
        }
        self.viewing -= 1;
        true
    }
}
