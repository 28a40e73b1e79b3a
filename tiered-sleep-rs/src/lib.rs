// Copyright Claudio Mattera 2024-2025.
//
// Distributed under the MIT License or the Apache 2.0 License at your option.
// See the accompanying files LICENSE-MIT.txt and LICENSE-APACHE-2.0.txt, or
// online at
// https://opensource.org/licenses/MIT
// https://opensource.org/licenses/Apache-2.0

//! Tiered sleep scheduling for microcontrollers
//!
//! Hardware power-down primitives usually support only a small menu of fixed
//! intervals (64 ms, 128 ms, …, 32 s). This crate decomposes an arbitrary
//! requested duration into a descending sequence of such intervals, while up
//! to two external wake interrupts can end the sequence early. The caller is
//! told whether the timer or an interrupt line ended the cycle.
//!
//! The hardware itself is reached through the [`PowerDown`] and
//! [`WakeInterrupts`] traits, so the scheduler runs unchanged on any platform
//! that can provide a single-step power-down and interrupt attach/detach.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

mod error;
pub use self::error::Error;

mod hal;
pub use self::hal::PowerDown;
pub use self::hal::WakeInterrupts;

mod interval;
pub use self::interval::Interval;

mod menu;

mod request;
pub use self::request::SleepRequest;
pub use self::request::WakeLine;

mod scheduler;
pub use self::scheduler::Scheduler;
pub use self::scheduler::SleepError;

mod wake;
pub use self::wake::InterruptLine;
pub use self::wake::WakeCause;
pub use self::wake::WakeHandler;
pub use self::wake::WakeTracker;
