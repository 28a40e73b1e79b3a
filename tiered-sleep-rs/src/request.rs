// Copyright Claudio Mattera 2024-2025.
//
// Distributed under the MIT License or the Apache 2.0 License at your option.
// See the accompanying files LICENSE-MIT.txt and LICENSE-APACHE-2.0.txt, or
// online at
// https://opensource.org/licenses/MIT
// https://opensource.org/licenses/Apache-2.0

//! Sleep requests

use crate::wake::InterruptLine;

/// One wake line to arm: an interrupt line and its trigger mode
#[derive(Clone, Copy, Debug)]
pub struct WakeLine<Mode> {
    /// The interrupt line
    pub line: InterruptLine,

    /// The trigger-edge/level selector, passed through to the hardware
    pub mode: Mode,
}

/// Description of one sleep cycle
///
/// Carries the requested duration and up to two wake lines to arm. A
/// duration of zero means "sleep until an interrupt fires, with no timer
/// bound"; such a request must arm at least one line, or nothing can ever
/// wake the device.
#[derive(Clone, Copy, Debug)]
pub struct SleepRequest<Mode> {
    /// Primary wake line, if any
    primary: Option<WakeLine<Mode>>,

    /// Secondary wake line, if any
    secondary: Option<WakeLine<Mode>>,

    /// Requested duration in milliseconds; zero means until interrupt
    duration_ms: u32,
}

impl<Mode> SleepRequest<Mode>
where
    Mode: Copy,
{
    /// Create a timer-only request
    #[must_use]
    pub const fn timed(duration_ms: u32) -> Self {
        Self {
            primary: None,
            secondary: None,
            duration_ms,
        }
    }

    /// Create a request that sleeps until `line` fires
    ///
    /// The duration is zero: only the armed line can end the cycle.
    #[must_use]
    pub const fn until_interrupt(line: InterruptLine, mode: Mode) -> Self {
        Self {
            primary: Some(WakeLine { line, mode }),
            secondary: None,
            duration_ms: 0,
        }
    }

    /// Arm `line` as the primary wake line
    #[must_use]
    pub fn with_primary(mut self, line: InterruptLine, mode: Mode) -> Self {
        self.primary = Some(WakeLine { line, mode });
        self
    }

    /// Arm `line` as the secondary wake line
    #[must_use]
    pub fn with_secondary(mut self, line: InterruptLine, mode: Mode) -> Self {
        self.secondary = Some(WakeLine { line, mode });
        self
    }

    /// Return the primary wake line, if any
    #[must_use]
    pub fn primary(&self) -> Option<WakeLine<Mode>> {
        self.primary
    }

    /// Return the secondary wake line, if any
    #[must_use]
    pub fn secondary(&self) -> Option<WakeLine<Mode>> {
        self.secondary
    }

    /// Return the requested duration in milliseconds
    #[must_use]
    pub const fn duration_ms(&self) -> u32 {
        self.duration_ms
    }
}

#[cfg(test)]
#[allow(
    clippy::missing_docs_in_private_items,
    reason = "Test names are their own documentation"
)]
mod tests {
    use super::*;

    #[test]
    fn timed_request_arms_nothing() {
        let request: SleepRequest<()> = SleepRequest::timed(5_000);
        assert!(request.primary().is_none());
        assert!(request.secondary().is_none());
        assert_eq!(request.duration_ms(), 5_000);
    }

    #[test]
    fn until_interrupt_has_no_timer_bound() {
        let request = SleepRequest::until_interrupt(InterruptLine::new(2), ());
        assert_eq!(request.duration_ms(), 0);
        assert!(request.primary().is_some());
        assert!(request.secondary().is_none());
    }

    #[test]
    fn builders_fill_both_slots() {
        let request = SleepRequest::timed(1_000)
            .with_primary(InterruptLine::new(2), ())
            .with_secondary(InterruptLine::new(3), ());
        assert_eq!(
            request.primary().map(|wake_line| wake_line.line),
            Some(InterruptLine::new(2)),
        );
        assert_eq!(
            request.secondary().map(|wake_line| wake_line.line),
            Some(InterruptLine::new(3)),
        );
    }
}
