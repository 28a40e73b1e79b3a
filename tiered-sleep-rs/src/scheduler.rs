// Copyright Claudio Mattera 2024-2025.
//
// Distributed under the MIT License or the Apache 2.0 License at your option.
// See the accompanying files LICENSE-MIT.txt and LICENSE-APACHE-2.0.txt, or
// online at
// https://opensource.org/licenses/MIT
// https://opensource.org/licenses/Apache-2.0

//! The sleep scheduler

use log::debug;
use log::trace;
use log::warn;

use crate::error::Error;
use crate::hal::PowerDown;
use crate::hal::WakeInterrupts;
use crate::interval::Interval;
use crate::menu::steps;
use crate::request::SleepRequest;
use crate::wake::InterruptLine;
use crate::wake::WakeCause;
use crate::wake::WakeHandler;
use crate::wake::WakeTracker;

/// Error from a full sleep cycle over platform `Platform`
pub type SleepError<Platform> =
    Error<<Platform as PowerDown>::Error, <Platform as WakeInterrupts>::Error>;

/// A sleep scheduler over one hardware platform
///
/// Powers the device down for an arbitrary requested duration by chaining
/// fixed hardware intervals, while up to two armed interrupt lines can end
/// the cycle early. One cycle runs at a time; `&mut self` on every operation
/// keeps the use synchronous by construction.
pub struct Scheduler<Platform>
where
    Platform: WakeInterrupts,
{
    /// The hardware platform
    platform: Platform,

    /// The process-wide wake tracker
    tracker: &'static WakeTracker,

    /// Lines armed for the current cycle, primary first
    armed: [Option<InterruptLine>; 2],
}

impl<Platform> Scheduler<Platform>
where
    Platform: PowerDown + WakeInterrupts,
{
    /// Create a scheduler over `platform`, recording wakes into `tracker`
    #[must_use]
    pub fn new(platform: Platform, tracker: &'static WakeTracker) -> Self {
        Self {
            platform,
            tracker,
            armed: [None, None],
        }
    }

    /// Run one full sleep cycle
    ///
    /// Arms the requested wake lines, powers down until the duration is
    /// served or a line fires, and reports what ended the cycle. The lines
    /// are detached and the tracker is reset before returning, so the next
    /// cycle starts clean even when this one fails.
    ///
    /// A request with duration zero must arm at least one line; sleeping
    /// forever with nothing that can wake the device is a caller error.
    ///
    /// # Errors
    ///
    /// Returns an error if a platform primitive fails.
    pub fn sleep(
        &mut self,
        request: &SleepRequest<<Platform as WakeInterrupts>::Mode>,
    ) -> Result<WakeCause, SleepError<Platform>> {
        self.arm(request).map_err(Error::Interrupt)?;
        let outcome = self.run(request.duration_ms()).map_err(Error::PowerDown);
        self.disarm().map_err(Error::Interrupt)?;
        outcome
    }

    /// Run a timer-only sleep cycle
    ///
    /// # Errors
    ///
    /// Returns an error if a platform primitive fails.
    pub fn sleep_for(&mut self, duration_ms: u32) -> Result<WakeCause, SleepError<Platform>> {
        self.sleep(&SleepRequest::timed(duration_ms))
    }

    /// Sleep until `line` fires, with no timer bound
    ///
    /// # Errors
    ///
    /// Returns an error if a platform primitive fails.
    pub fn sleep_until(
        &mut self,
        line: InterruptLine,
        mode: <Platform as WakeInterrupts>::Mode,
    ) -> Result<WakeCause, SleepError<Platform>> {
        self.sleep(&SleepRequest::until_interrupt(line, mode))
    }

    /// Arm the wake lines named by `request`
    ///
    /// Runs under a critical section: an interrupt firing between attach and
    /// the first power-down step would otherwise be serviced before the
    /// device sleeps, and the wake event would be silently lost.
    ///
    /// # Errors
    ///
    /// Returns an error if a line cannot be attached; lines attached before
    /// the failure are detached again, and the tracker is reset.
    pub fn arm(
        &mut self,
        request: &SleepRequest<<Platform as WakeInterrupts>::Mode>,
    ) -> Result<(), <Platform as WakeInterrupts>::Error> {
        debug!("Arm wake lines");

        critical_section::with(|_cs| {
            for (slot, wake_line) in [request.primary(), request.secondary()]
                .into_iter()
                .enumerate()
            {
                let Some(wake_line) = wake_line else {
                    continue;
                };
                let handler = WakeHandler::new(self.tracker, wake_line.line);
                if let Err(error) = self.platform.attach(wake_line.line, wake_line.mode, handler) {
                    self.disarm_best_effort();
                    // A line attached before the failure may already have
                    // fired; discard the stale wake.
                    let _stale = self.tracker.consume();
                    return Err(error);
                }
                trace!("Armed wake line {}", wake_line.line);
                self.armed[slot] = Some(wake_line.line);
            }
            Ok(())
        })
    }

    /// Power down until `duration_ms` is served or an armed line fires
    ///
    /// A duration of zero powers down indefinitely; at least one line must
    /// be armed in that case. The tracker is consumed before returning, so
    /// it is clean for the next cycle whatever the outcome.
    ///
    /// # Errors
    ///
    /// Returns an error if the power-down primitive fails.
    pub fn run(
        &mut self,
        duration_ms: u32,
    ) -> Result<WakeCause, <Platform as PowerDown>::Error> {
        let stepped = self.step_down(duration_ms);

        let cause = match self.tracker.consume() {
            Some(line) => {
                debug!("Woke by interrupt line {line}");
                WakeCause::Interrupt(line)
            }
            None => {
                debug!("Woke by timer");
                WakeCause::Timer
            }
        };

        stepped?;
        Ok(cause)
    }

    /// Detach any line still attached
    ///
    /// Covers cycles ended by timer expiry, in which the platform never
    /// disarmed the lines itself. Detaching an already-detached line is a
    /// no-op, so this is idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if a line cannot be detached.
    pub fn disarm(&mut self) -> Result<(), <Platform as WakeInterrupts>::Error> {
        debug!("Disarm wake lines");

        for slot in &mut self.armed {
            if let Some(line) = slot.take() {
                self.platform.detach(line)?;
            }
        }
        Ok(())
    }

    /// Release the scheduler and return the platform
    #[must_use]
    pub fn release(self) -> Platform {
        self.platform
    }

    /// Issue the power-down steps for `duration_ms`
    ///
    /// # Errors
    ///
    /// Returns an error if the power-down primitive fails.
    fn step_down(&mut self, duration_ms: u32) -> Result<(), <Platform as PowerDown>::Error> {
        if duration_ms == 0 {
            debug_assert!(
                self.armed.iter().any(|slot| slot.is_some()),
                "indefinite sleep requires an armed wake line",
            );
            debug!("Power down until a wake line fires");
            self.platform.power_down(Interval::Forever)?;
            return Ok(());
        }

        debug!("Power down for {duration_ms} ms");
        for interval in steps(duration_ms) {
            if self.tracker.has_woken() {
                break;
            }
            trace!("Power down step {interval:?}");
            self.platform.power_down(interval)?;
        }
        Ok(())
    }

    /// Detach armed lines, logging failures instead of propagating them
    fn disarm_best_effort(&mut self) {
        for slot in &mut self.armed {
            if let Some(line) = slot.take() {
                if self.platform.detach(line).is_err() {
                    warn!("Failed to detach wake line {line}");
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::missing_docs_in_private_items,
    reason = "Panicking is the failure mode of tests"
)]
mod tests {
    use super::*;

    use std::cell::RefCell;
    use std::rc::Rc;

    /// State shared between a mock platform and the test body
    #[derive(Default)]
    struct Shared {
        /// Currently attached lines with their handlers
        attached: Vec<(InterruptLine, WakeHandler)>,
        /// Every power-down issued, in order
        powered_down: Vec<Interval>,
        /// Every line actually detached, in order
        detached: Vec<InterruptLine>,
        /// Scripted interrupt delivery
        firing: Option<Firing>,
        /// Line whose attach call fails
        fail_attach: Option<InterruptLine>,
    }

    /// Script entry: deliver these lines during the n-th power-down call
    struct Firing {
        during_call: usize,
        lines: Vec<InterruptLine>,
    }

    #[derive(Debug, PartialEq, Eq)]
    struct MockError;

    /// A scripted platform standing in for the hardware primitives
    #[derive(Clone, Default)]
    struct MockPlatform {
        shared: Rc<RefCell<Shared>>,
    }

    impl PowerDown for MockPlatform {
        type Error = MockError;

        fn power_down(&mut self, interval: Interval) -> Result<(), Self::Error> {
            let mut shared = self.shared.borrow_mut();
            let call = shared.powered_down.len();
            shared.powered_down.push(interval);

            let fires_now = shared
                .firing
                .as_ref()
                .is_some_and(|firing| firing.during_call == call);
            if fires_now {
                let lines = shared.firing.take().unwrap().lines;
                // Per the WakeInterrupts contract: disarm both lines first,
                // then deliver to the bound handlers.
                let attached: Vec<(InterruptLine, WakeHandler)> =
                    shared.attached.drain(..).collect();
                for &(line, _) in &attached {
                    shared.detached.push(line);
                }
                drop(shared);
                for line in lines {
                    if let Some(&(_, handler)) =
                        attached.iter().find(|&&(attached_line, _)| attached_line == line)
                    {
                        let _recorded = handler.wake();
                    }
                }
            }
            Ok(())
        }
    }

    impl WakeInterrupts for MockPlatform {
        type Mode = ();
        type Error = MockError;

        fn attach(
            &mut self,
            line: InterruptLine,
            _mode: Self::Mode,
            handler: WakeHandler,
        ) -> Result<(), Self::Error> {
            let mut shared = self.shared.borrow_mut();
            if shared.fail_attach == Some(line) {
                return Err(MockError);
            }
            shared.attached.push((line, handler));
            Ok(())
        }

        fn detach(&mut self, line: InterruptLine) -> Result<(), Self::Error> {
            let mut shared = self.shared.borrow_mut();
            if let Some(position) = shared
                .attached
                .iter()
                .position(|&(attached_line, _)| attached_line == line)
            {
                shared.attached.remove(position);
                shared.detached.push(line);
            }
            Ok(())
        }
    }

    /// Leak a fresh tracker so it can back `'static` handlers
    fn tracker() -> &'static WakeTracker {
        Box::leak(Box::new(WakeTracker::new()))
    }

    fn scheduler() -> (Scheduler<MockPlatform>, Rc<RefCell<Shared>>) {
        let platform = MockPlatform::default();
        let shared = Rc::clone(&platform.shared);
        (Scheduler::new(platform, tracker()), shared)
    }

    #[test]
    fn nine_seconds_uses_descending_tiers_and_wakes_by_timer() {
        let (mut scheduler, shared) = scheduler();

        let cause = scheduler.sleep_for(9_000).unwrap();

        assert_eq!(cause, WakeCause::Timer);
        assert_eq!(
            shared.borrow().powered_down,
            [Interval::Seconds8, Interval::Seconds4, Interval::Seconds1],
        );
    }

    #[test]
    fn slept_time_is_never_below_the_request_granularity() {
        for duration_ms in [64_u32, 1_000, 9_000, 15_000, 33_000] {
            let (mut scheduler, shared) = scheduler();

            let cause = scheduler.sleep_for(duration_ms).unwrap();
            assert_eq!(cause, WakeCause::Timer);

            let slept_ms: u32 = shared
                .borrow()
                .powered_down
                .iter()
                .map(|interval| interval.length_ms().unwrap())
                .sum();
            assert!(slept_ms >= duration_ms.saturating_sub(63));
        }
    }

    #[test]
    fn interrupt_stops_the_remaining_tiers() {
        let (mut scheduler, shared) = scheduler();
        let button = InterruptLine::new(2);
        shared.borrow_mut().firing = Some(Firing {
            during_call: 1,
            lines: vec![button],
        });

        let request = SleepRequest::timed(9_000).with_primary(button, ());
        let cause = scheduler.sleep(&request).unwrap();

        assert_eq!(cause, WakeCause::Interrupt(button));
        // The wake fired during the second step; the third is never issued.
        assert_eq!(
            shared.borrow().powered_down,
            [Interval::Seconds8, Interval::Seconds4],
        );
    }

    #[test]
    fn simultaneous_interrupts_report_exactly_one_line() {
        let (mut scheduler, shared) = scheduler();
        let button = InterruptLine::new(2);
        let sensor = InterruptLine::new(3);
        shared.borrow_mut().firing = Some(Firing {
            during_call: 0,
            lines: vec![button, sensor],
        });

        let request = SleepRequest::timed(9_000)
            .with_primary(button, ())
            .with_secondary(sensor, ());
        let cause = scheduler.sleep(&request).unwrap();

        // Both handlers ran before the scheduler's next read; the first
        // delivery wins and the second must not corrupt it.
        assert_eq!(cause, WakeCause::Interrupt(button));
    }

    #[test]
    fn timer_expiry_detaches_both_never_fired_lines() {
        let (mut scheduler, shared) = scheduler();
        let button = InterruptLine::new(2);
        let sensor = InterruptLine::new(3);

        let request = SleepRequest::timed(1_000)
            .with_primary(button, ())
            .with_secondary(sensor, ());
        let cause = scheduler.sleep(&request).unwrap();

        assert_eq!(cause, WakeCause::Timer);
        let shared = shared.borrow();
        assert!(shared.attached.is_empty());
        assert_eq!(shared.detached, [button, sensor]);
    }

    #[test]
    fn indefinite_sleep_issues_a_single_forever_step() {
        let (mut scheduler, shared) = scheduler();
        let button = InterruptLine::new(2);
        shared.borrow_mut().firing = Some(Firing {
            during_call: 0,
            lines: vec![button],
        });

        let cause = scheduler.sleep_until(button, ()).unwrap();

        assert_eq!(cause, WakeCause::Interrupt(button));
        assert_eq!(shared.borrow().powered_down, [Interval::Forever]);
    }

    #[test]
    fn consecutive_cycles_start_clean() {
        let (mut scheduler, shared) = scheduler();
        let button = InterruptLine::new(2);
        shared.borrow_mut().firing = Some(Firing {
            during_call: 0,
            lines: vec![button],
        });

        let request = SleepRequest::timed(1_000).with_primary(button, ());
        let first = scheduler.sleep(&request).unwrap();
        assert_eq!(first, WakeCause::Interrupt(button));

        // No firing is scripted for the second cycle: the previous wake
        // must not leak into it.
        let second = scheduler.sleep(&request).unwrap();
        assert_eq!(second, WakeCause::Timer);
    }

    #[test]
    fn failed_arm_detaches_the_lines_attached_before_it() {
        let (mut scheduler, shared) = scheduler();
        let button = InterruptLine::new(2);
        let sensor = InterruptLine::new(3);
        shared.borrow_mut().fail_attach = Some(sensor);

        let request = SleepRequest::timed(1_000)
            .with_primary(button, ())
            .with_secondary(sensor, ());
        let result = scheduler.sleep(&request);

        assert_eq!(result, Err(Error::Interrupt(MockError)));
        let shared = shared.borrow();
        assert!(shared.attached.is_empty());
        assert_eq!(shared.detached, [button]);
        assert!(shared.powered_down.is_empty());
    }

    #[test]
    fn release_returns_the_platform() {
        let (scheduler, shared) = scheduler();
        let platform = scheduler.release();
        assert!(Rc::ptr_eq(&platform.shared, &shared));
    }
}
