//! Minimal state-machine runtime shared by every protocol machine.
//!
//! Each machine keeps its transition table as a `match` over
//! `(current state, event)`; this module supplies the current/previous state
//! holder with transition logging, and the drop-and-log rule for pairs the
//! table does not name.

use std::fmt::Debug;
use tracing::{debug, warn};

/// Current and previous state of one machine, with logged transitions.
#[derive(Debug, Clone)]
pub struct StateHolder<S: Copy + Eq + Debug> {
    machine: &'static str,
    owner: u32,
    current: S,
    previous: S,
}

impl<S: Copy + Eq + Debug> StateHolder<S> {
    pub fn new(machine: &'static str, owner: u32, initial: S) -> Self {
        StateHolder {
            machine,
            owner,
            current: initial,
            previous: initial,
        }
    }

    pub fn current(&self) -> S {
        self.current
    }

    pub fn previous(&self) -> S {
        self.previous
    }

    /// Moves to `next`, remembering the state we left.
    pub fn transition(&mut self, next: S) {
        if next != self.current {
            debug!(
                machine = self.machine,
                owner = self.owner,
                from = ?self.current,
                to = ?next,
                "state transition"
            );
            self.previous = self.current;
            self.current = next;
        }
    }

    /// Records an event the transition table has no rule for. The event is
    /// dropped; the machine stays where it is.
    pub fn unhandled(&self, event: &dyn Debug) {
        warn!(
            machine = self.machine,
            owner = self.owner,
            state = ?self.current,
            event = ?event,
            "dropping event with no transition rule"
        );
    }

    /// Same as [`unhandled`](Self::unhandled) but for events that are
    /// legitimately meaningless in the current state.
    pub fn ignored(&self, event: &dyn Debug) {
        debug!(
            machine = self.machine,
            owner = self.owner,
            state = ?self.current,
            event = ?event,
            "event ignored in this state"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum TestState {
        A,
        B,
    }

    #[test]
    fn test_transition_tracks_previous() {
        let mut holder = StateHolder::new("test", 1, TestState::A);
        assert_eq!(holder.current(), TestState::A);
        assert_eq!(holder.previous(), TestState::A);

        holder.transition(TestState::B);
        assert_eq!(holder.current(), TestState::B);
        assert_eq!(holder.previous(), TestState::A);

        // self-transition does not clobber previous
        holder.transition(TestState::B);
        assert_eq!(holder.previous(), TestState::A);
    }
}
