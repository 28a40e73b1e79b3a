// Copyright Claudio Mattera 2024-2025.
//
// Distributed under the MIT License or the Apache 2.0 License at your option.
// See the accompanying files LICENSE-MIT.txt and LICENSE-APACHE-2.0.txt, or
// online at
// https://opensource.org/licenses/MIT
// https://opensource.org/licenses/Apache-2.0

//! Wake-source tracking
//!
//! A sleep cycle can be ended by the timer or by one of up to two armed
//! interrupt lines. The [`WakeTracker`] is the single cell recording which
//! line, if any, fired first. It is written from interrupt context through
//! [`WakeHandler`] and read from the scheduler, so it is a word-sized atomic:
//! the interrupt side performs a single store, the scheduler side a single
//! load, and no lock is required.

use core::fmt::Display;
use core::fmt::Formatter;
use core::sync::atomic::AtomicU8;
use core::sync::atomic::Ordering;

/// Reserved line number meaning "no interrupt"
const NO_WAKE: u8 = 0xff;

/// An external interrupt line number
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InterruptLine(u8);

impl InterruptLine {
    /// Create an interrupt line from its number
    ///
    /// The number `0xff` is reserved as the "no interrupt" sentinel and must
    /// not be used for a real line.
    #[must_use]
    pub const fn new(number: u8) -> Self {
        debug_assert!(number != NO_WAKE, "line number 0xff is reserved");
        Self(number)
    }

    /// Return the raw line number
    #[must_use]
    pub const fn number(self) -> u8 {
        self.0
    }
}

impl Display for InterruptLine {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> core::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// What ended a sleep cycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WakeCause {
    /// The requested duration elapsed without any interrupt
    Timer,

    /// The given interrupt line fired before the duration elapsed
    Interrupt(InterruptLine),
}

/// Record of which interrupt line, if any, ended the current sleep cycle
///
/// Exactly one tracker exists per device, as a `static`. It starts at the
/// "no interrupt" sentinel, holds the first line recorded until it is
/// consumed, and is reset to the sentinel at the end of every cycle.
pub struct WakeTracker {
    /// The line that woke the device, or [`NO_WAKE`]
    woke_by: AtomicU8,
}

impl WakeTracker {
    /// Create a tracker in the "not woken" state
    #[must_use]
    pub const fn new() -> Self {
        Self {
            woke_by: AtomicU8::new(NO_WAKE),
        }
    }

    /// Record that `line` woke the device
    ///
    /// The first line to be recorded wins; later calls before [`consume`]
    /// leave the stored value untouched. Returns whether this call was the
    /// recording one.
    ///
    /// This runs in interrupt context. Interrupts are not time-sliced by the
    /// scheduler thread, so the load-then-store pair below cannot be torn by
    /// a concurrent scheduler access.
    pub fn record(&self, line: InterruptLine) -> bool {
        if self.woke_by.load(Ordering::Acquire) == NO_WAKE {
            self.woke_by.store(line.0, Ordering::Release);
            true
        } else {
            false
        }
    }

    /// Return whether an interrupt line has been recorded
    #[must_use]
    pub fn has_woken(&self) -> bool {
        self.woke_by.load(Ordering::Acquire) != NO_WAKE
    }

    /// Return the recorded line, if any, and reset the tracker
    ///
    /// This is called exactly once per sleep cycle, after the cycle's result
    /// has been established, so the next cycle starts clean.
    pub fn consume(&self) -> Option<InterruptLine> {
        let value = self.woke_by.load(Ordering::Acquire);
        self.woke_by.store(NO_WAKE, Ordering::Release);
        (value != NO_WAKE).then_some(InterruptLine(value))
    }
}

impl Default for WakeTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Handler bound to one armed interrupt line
///
/// Built by the scheduler at arm time and passed to the platform, which
/// invokes it when the line fires. It captures only the tracker and the line
/// to record, so handlers for different lines share no hidden state.
#[derive(Clone, Copy)]
pub struct WakeHandler {
    /// The tracker to record into
    tracker: &'static WakeTracker,

    /// The line this handler records
    line: InterruptLine,
}

impl WakeHandler {
    /// Bind a handler to a tracker and a line
    #[must_use]
    pub const fn new(tracker: &'static WakeTracker, line: InterruptLine) -> Self {
        Self { tracker, line }
    }

    /// Deliver the wake, recording the line into the tracker
    ///
    /// Safe to call from interrupt context. Returns whether this call was
    /// the one that recorded the wake.
    pub fn wake(&self) -> bool {
        self.tracker.record(self.line)
    }

    /// Return the line this handler records
    #[must_use]
    pub const fn line(&self) -> InterruptLine {
        self.line
    }
}

#[cfg(test)]
#[allow(
    clippy::missing_docs_in_private_items,
    reason = "Test names are their own documentation"
)]
mod tests {
    use super::*;

    /// Leak a fresh tracker so it can back `'static` handlers
    fn tracker() -> &'static WakeTracker {
        Box::leak(Box::new(WakeTracker::new()))
    }

    #[test]
    fn starts_not_woken() {
        let tracker = tracker();
        assert!(!tracker.has_woken());
        assert_eq!(tracker.consume(), None);
    }

    #[test]
    fn first_recorded_line_wins() {
        let tracker = tracker();
        assert!(tracker.record(InterruptLine::new(2)));
        assert!(!tracker.record(InterruptLine::new(3)));
        assert!(tracker.has_woken());
        assert_eq!(tracker.consume(), Some(InterruptLine::new(2)));
    }

    #[test]
    fn consume_resets_to_sentinel() {
        let tracker = tracker();
        assert!(tracker.record(InterruptLine::new(5)));
        assert_eq!(tracker.consume(), Some(InterruptLine::new(5)));
        assert!(!tracker.has_woken());
        assert_eq!(tracker.consume(), None);
    }

    #[test]
    fn handler_records_its_line() {
        let tracker = tracker();
        let handler = WakeHandler::new(tracker, InterruptLine::new(7));
        assert_eq!(handler.line(), InterruptLine::new(7));
        assert!(handler.wake());
        assert_eq!(tracker.consume(), Some(InterruptLine::new(7)));
    }

    #[test]
    fn double_delivery_records_exactly_one_line() {
        let tracker = tracker();
        let first = WakeHandler::new(tracker, InterruptLine::new(2));
        let second = WakeHandler::new(tracker, InterruptLine::new(3));
        assert!(first.wake());
        assert!(!second.wake());
        assert_eq!(tracker.consume(), Some(InterruptLine::new(2)));
    }
}
