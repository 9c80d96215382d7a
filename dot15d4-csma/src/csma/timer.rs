//! Cancellable timed actions.
//!
//! The engine never sleeps. It hands [`Timer`] tokens to a [`Scheduler`] and
//! expects each one back through [`CsmaCa::fire`](super::CsmaCa::fire) once
//! its delay has elapsed. Every token carries a unique id; cancelling
//! forgets the ids so late tokens are recognised and dropped.

use crate::time::{Duration, Instant};

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Draw (or resume) a random backoff.
    BackoffStart,
    /// Backoff expired in slotted mode, check the transaction fits the CAP.
    CanProceed,
    /// Ask the PHY for a CCA.
    CcaRequest,
    /// The CAP ended before the attempt could finish.
    CapEnd,
}

impl TimerKind {
    const COUNT: usize = 4;

    const fn index(self) -> usize {
        match self {
            TimerKind::BackoffStart => 0,
            TimerKind::CanProceed => 1,
            TimerKind::CcaRequest => 2,
            TimerKind::CapEnd => 3,
        }
    }
}

/// Opaque handle of a scheduled action.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timer {
    kind: TimerKind,
    id: u32,
}

impl Timer {
    pub fn kind(&self) -> TimerKind {
        self.kind
    }
}

/// Clock and timer facility of the host.
pub trait Scheduler {
    fn now(&self) -> Instant;

    /// Hand `timer` back to the engine after `delay`. A zero delay means "as
    /// soon as the current action returns".
    fn schedule(&mut self, delay: Duration, timer: Timer);
}

/// At most one armed timer per kind.
#[derive(Debug, Default)]
pub(crate) struct PendingTimers {
    next_id: u32,
    armed: [Option<u32>; TimerKind::COUNT],
}

impl PendingTimers {
    pub fn arm(&mut self, kind: TimerKind) -> Timer {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        self.armed[kind.index()] = Some(id);
        Timer { kind, id }
    }

    /// Disarm `timer`, returning whether it was still armed.
    pub fn take(&mut self, timer: Timer) -> bool {
        let slot = &mut self.armed[timer.kind.index()];
        if *slot == Some(timer.id) {
            *slot = None;
            true
        } else {
            false
        }
    }

    pub fn disarm_all(&mut self) {
        self.armed = [None; TimerKind::COUNT];
    }

    #[cfg(test)]
    pub fn is_armed(&self, kind: TimerKind) -> bool {
        self.armed[kind.index()].is_some()
    }
}
