// Copyright Claudio Mattera 2024-2025.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Sleep platform over the ESP32-C3 RTC
//!
//! Each power-down step is an RTC light sleep with a timer wakeup source;
//! armed wake lines become RTC IO wakeup sources alongside it. Light sleep
//! preserves RAM and resumes execution in place, so the scheduler simply
//! continues after every step.

use core::convert::Infallible;
use core::time::Duration;

use log::trace;
use log::warn;

use esp_hal::gpio::RtcPinWithResistors;
use esp_hal::rtc_cntl::sleep::RtcioWakeupSource;
use esp_hal::rtc_cntl::sleep::TimerWakeupSource;
use esp_hal::rtc_cntl::sleep::WakeSource;
use esp_hal::rtc_cntl::sleep::WakeupLevel;
use esp_hal::rtc_cntl::wakeup_cause;
use esp_hal::rtc_cntl::Rtc;
use esp_hal::rtc_cntl::SleepSource;

use tiered_sleep_rs::InterruptLine;
use tiered_sleep_rs::Interval;
use tiered_sleep_rs::PowerDown;
use tiered_sleep_rs::WakeHandler;
use tiered_sleep_rs::WakeInterrupts;

/// An error
#[derive(Debug)]
pub enum Error {
    /// The line does not label one of the wake-capable pins
    UnknownLine(InterruptLine),
}

/// A wake-capable pin and its armed state
struct WakeSlot<PIN> {
    /// Line number the scheduler knows this pin by
    line: InterruptLine,

    /// The physical RTC pin
    pin: PIN,

    /// Trigger level and bound handler while armed
    armed: Option<(WakeupLevel, WakeHandler)>,
}

/// Sleep platform over the RTC and two wake-capable pins
///
/// On the ESP32-C3 only GPIO0–GPIO5 can wake the chip from light sleep, so
/// both pins must come from that range.
pub struct RtcPlatform<'rtc, PRIMARY, SECONDARY> {
    /// RTC controller driving light sleep
    rtc: Rtc<'rtc>,

    /// First wake-capable pin
    primary: WakeSlot<PRIMARY>,

    /// Second wake-capable pin
    secondary: WakeSlot<SECONDARY>,
}

impl<'rtc, PRIMARY, SECONDARY> RtcPlatform<'rtc, PRIMARY, SECONDARY>
where
    PRIMARY: RtcPinWithResistors,
    SECONDARY: RtcPinWithResistors,
{
    /// Create a platform over `rtc` and two labeled wake pins
    #[must_use]
    pub fn new(
        rtc: Rtc<'rtc>,
        primary: (InterruptLine, PRIMARY),
        secondary: (InterruptLine, SECONDARY),
    ) -> Self {
        let (primary_line, primary_pin) = primary;
        let (secondary_line, secondary_pin) = secondary;
        Self {
            rtc,
            primary: WakeSlot {
                line: primary_line,
                pin: primary_pin,
                armed: None,
            },
            secondary: WakeSlot {
                line: secondary_line,
                pin: secondary_pin,
                armed: None,
            },
        }
    }

    /// Enter light sleep with the given wakeup sources
    fn sleep_with(
        rtc: &mut Rtc<'rtc>,
        timer: Option<&TimerWakeupSource>,
        rtcio: Option<&RtcioWakeupSource>,
    ) {
        match (timer, rtcio) {
            (Some(timer), Some(rtcio)) => {
                let sources: [&dyn WakeSource; 2] = [timer, rtcio];
                rtc.sleep_light(&sources);
            }
            (Some(timer), None) => {
                let sources: [&dyn WakeSource; 1] = [timer];
                rtc.sleep_light(&sources);
            }
            (None, Some(rtcio)) => {
                let sources: [&dyn WakeSource; 1] = [rtcio];
                rtc.sleep_light(&sources);
            }
            (None, None) => {
                // Nothing could ever end this sleep; refusing it is safer
                // than powering down unwakeable.
                warn!("Indefinite sleep requested with no armed wake line, skipping");
            }
        }
    }

    /// Deliver a pin wake, if any, to the bound handler
    ///
    /// The RTC reports only that *a* GPIO woke the chip, not which one, so
    /// with both lines armed the wake is attributed to the primary line.
    /// Both lines are disarmed before delivery, so a held-down line cannot
    /// immediately re-trigger.
    fn deliver_wake(&mut self) {
        let cause = wakeup_cause();
        trace!("RTC wakeup cause {cause:?}");
        if !matches!(cause, SleepSource::Gpio) {
            return;
        }

        let handler = self
            .primary
            .armed
            .or(self.secondary.armed)
            .map(|(_, handler)| handler);
        if let Some(handler) = handler {
            self.primary.armed = None;
            self.secondary.armed = None;
            if handler.wake() {
                trace!("Wake delivered for line {}", handler.line());
            }
        }
    }
}

impl<'rtc, PRIMARY, SECONDARY> PowerDown for RtcPlatform<'rtc, PRIMARY, SECONDARY>
where
    PRIMARY: RtcPinWithResistors,
    SECONDARY: RtcPinWithResistors,
{
    type Error = Infallible;

    fn power_down(&mut self, interval: Interval) -> Result<(), Self::Error> {
        let timer = interval
            .length_ms()
            .map(|length_ms| TimerWakeupSource::new(Duration::from_millis(u64::from(length_ms))));

        match (self.primary.armed, self.secondary.armed) {
            (Some((primary_level, _)), Some((secondary_level, _))) => {
                let mut pins: [(&mut dyn RtcPinWithResistors, WakeupLevel); 2] = [
                    (&mut self.primary.pin, primary_level),
                    (&mut self.secondary.pin, secondary_level),
                ];
                let rtcio = RtcioWakeupSource::new(&mut pins);
                Self::sleep_with(&mut self.rtc, timer.as_ref(), Some(&rtcio));
            }
            (Some((level, _)), None) => {
                let mut pins: [(&mut dyn RtcPinWithResistors, WakeupLevel); 1] =
                    [(&mut self.primary.pin, level)];
                let rtcio = RtcioWakeupSource::new(&mut pins);
                Self::sleep_with(&mut self.rtc, timer.as_ref(), Some(&rtcio));
            }
            (None, Some((level, _))) => {
                let mut pins: [(&mut dyn RtcPinWithResistors, WakeupLevel); 1] =
                    [(&mut self.secondary.pin, level)];
                let rtcio = RtcioWakeupSource::new(&mut pins);
                Self::sleep_with(&mut self.rtc, timer.as_ref(), Some(&rtcio));
            }
            (None, None) => {
                Self::sleep_with(&mut self.rtc, timer.as_ref(), None);
            }
        }

        self.deliver_wake();
        Ok(())
    }
}

impl<'rtc, PRIMARY, SECONDARY> WakeInterrupts for RtcPlatform<'rtc, PRIMARY, SECONDARY>
where
    PRIMARY: RtcPinWithResistors,
    SECONDARY: RtcPinWithResistors,
{
    type Mode = WakeupLevel;
    type Error = Error;

    fn attach(
        &mut self,
        line: InterruptLine,
        mode: Self::Mode,
        handler: WakeHandler,
    ) -> Result<(), Self::Error> {
        if line == self.primary.line {
            self.primary.armed = Some((mode, handler));
            Ok(())
        } else if line == self.secondary.line {
            self.secondary.armed = Some((mode, handler));
            Ok(())
        } else {
            Err(Error::UnknownLine(line))
        }
    }

    fn detach(&mut self, line: InterruptLine) -> Result<(), Self::Error> {
        // Detach is idempotent: unknown or already-detached lines are no-ops
        if line == self.primary.line {
            self.primary.armed = None;
        }
        if line == self.secondary.line {
            self.secondary.armed = None;
        }
        Ok(())
    }
}
