// Copyright Claudio Mattera 2024-2025.
//
// Distributed under the MIT License or the Apache 2.0 License at your option.
// See the accompanying files LICENSE-MIT.txt and LICENSE-APACHE-2.0.txt, or
// online at
// https://opensource.org/licenses/MIT
// https://opensource.org/licenses/Apache-2.0

//! Platform abstraction
//!
//! The scheduler touches hardware only through these two traits. A platform
//! crate implements both on one type: [`PowerDown`] for the single-step
//! power-down primitive and [`WakeInterrupts`] for the interrupt attach and
//! detach primitives.

use crate::interval::Interval;
use crate::wake::InterruptLine;
use crate::wake::WakeHandler;

/// Single-step power-down primitive
pub trait PowerDown {
    /// An error returned by the primitive
    type Error;

    /// Suspend execution for one fixed hardware interval
    ///
    /// The call blocks until the interval elapses or an armed wake line
    /// fires, whichever comes first. [`Interval::Forever`] blocks until a
    /// wake line fires. Must be called from non-interrupt context only.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform fails to enter the low-power state.
    fn power_down(&mut self, interval: Interval) -> Result<(), Self::Error>;
}

/// Wake-interrupt configuration primitives
pub trait WakeInterrupts {
    /// Trigger-edge/level selector, passed through to the hardware unchanged
    type Mode: Copy;

    /// An error returned by the primitives
    type Error;

    /// Attach `handler` to `line` with the given trigger mode
    ///
    /// Once attached, a firing line must be delivered by first disarming
    /// *both* armed lines (so a just-woken device cannot immediately
    /// re-trigger) and then invoking the bound handler once.
    ///
    /// # Errors
    ///
    /// Returns an error if the line cannot be configured as a wake source.
    fn attach(
        &mut self,
        line: InterruptLine,
        mode: Self::Mode,
        handler: WakeHandler,
    ) -> Result<(), Self::Error>;

    /// Detach `line`, discarding its handler
    ///
    /// Detaching a line that is not attached is a no-op; the scheduler
    /// relies on this after cycles in which the platform already disarmed
    /// the lines itself.
    ///
    /// # Errors
    ///
    /// Returns an error if the line cannot be deconfigured.
    fn detach(&mut self, line: InterruptLine) -> Result<(), Self::Error>;
}
