//! Typing-indicator debounce.
//!
//! The timer is an explicit state object owned by a session: the session
//! feeds it keystrokes and polls it against its deadline, and emits the
//! returned signals over the socket. Nothing here touches the network.

use std::time::{Duration, Instant};

/// Quiet period after the last keystroke before an implicit stop.
pub const TYPING_QUIET_PERIOD: Duration = Duration::from_secs(2);

/// A typing signal the owner must emit to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingSignal {
    Start,
    Stop,
}

/// Debounced typing state for one conversation input.
///
/// Contract: `Start` fires once per burst of keystrokes; `Stop` fires exactly
/// once, either [`TYPING_QUIET_PERIOD`] after the last keystroke (via
/// [`TypingTimer::poll`]) or immediately when the input is cleared, and
/// never both.
#[derive(Debug)]
pub struct TypingTimer {
    quiet_period: Duration,
    active: bool,
    deadline: Option<Instant>,
}

impl TypingTimer {
    pub fn new(quiet_period: Duration) -> Self {
        Self {
            quiet_period,
            active: false,
            deadline: None,
        }
    }

    /// Records an input change. `input_empty` reflects the whole input box,
    /// not the last keystroke, so clearing with select-all-delete stops too.
    pub fn note_input(&mut self, now: Instant, input_empty: bool) -> Option<TypingSignal> {
        if input_empty {
            self.deadline = None;
            if self.active {
                self.active = false;
                return Some(TypingSignal::Stop);
            }
            return None;
        }

        self.deadline = Some(now + self.quiet_period);
        if !self.active {
            self.active = true;
            return Some(TypingSignal::Start);
        }
        None
    }

    /// Fires the quiet-period stop once its deadline passes.
    pub fn poll(&mut self, now: Instant) -> Option<TypingSignal> {
        match self.deadline {
            Some(deadline) if self.active && now >= deadline => {
                self.active = false;
                self.deadline = None;
                Some(TypingSignal::Stop)
            }
            _ => None,
        }
    }

    /// Next instant at which [`TypingTimer::poll`] can fire, for the owner's
    /// timer wheel. `None` while idle.
    pub fn deadline(&self) -> Option<Instant> {
        if self.active { self.deadline } else { None }
    }

    /// Force a stop if one is pending. Called on session close/unmount so
    /// the peer never sees a stuck indicator.
    pub fn finish(&mut self) -> Option<TypingSignal> {
        self.deadline = None;
        if self.active {
            self.active = false;
            return Some(TypingSignal::Stop);
        }
        None
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl Default for TypingTimer {
    fn default() -> Self {
        Self::new(TYPING_QUIET_PERIOD)
    }
}
