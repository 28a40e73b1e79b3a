// Copyright Claudio Mattera 2024-2025.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Main crate
//!
//! A duty-cycle firmware for ESP32-C3: stay awake briefly, then power down
//! for a configured period or until one of two wake lines fires, report the
//! wake cause, and repeat.

#![no_std]
#![no_main]

use log::error;
use log::info;

use embassy_executor::Spawner;

use embassy_time::Duration;
use embassy_time::Timer;

use esp_hal::clock::CpuClock;
use esp_hal::init as initialize_esp_hal;
use esp_hal::prelude::*; // main
use esp_hal::rtc_cntl::reset_reason;
use esp_hal::rtc_cntl::sleep::WakeupLevel;
use esp_hal::rtc_cntl::Rtc;
use esp_hal::rtc_cntl::SocResetReason;
use esp_hal::system::Cpu;
use esp_hal::timer::systimer::SystemTimer;
use esp_hal::timer::systimer::Target;
use esp_hal::Config as EspConfig;

use esp_hal_embassy::init as initialize_embassy;

use heapless::HistoryBuffer;

use esp_backtrace as _;

use static_cell::StaticCell;

use tiered_sleep_rs::InterruptLine;
use tiered_sleep_rs::Scheduler;
use tiered_sleep_rs::SleepRequest;
use tiered_sleep_rs::WakeCause;
use tiered_sleep_rs::WakeTracker;

mod logging;
use self::logging::setup as setup_logging;

mod platform;
use self::platform::RtcPlatform;

/// Wake line assigned to the boot button (GPIO2, pulled up, active low)
const BUTTON_LINE: InterruptLine = InterruptLine::new(2);

/// Wake line assigned to the external contact (GPIO3, active high)
const SENSOR_LINE: InterruptLine = InterruptLine::new(3);

/// Duration of each low-power period
const SLEEP_PERIOD_MS: u32 = 30_000;

/// Period to stay awake between low-power periods
const AWAKE_PERIOD: Duration = Duration::from_secs(2);

/// Number of recent wake causes kept for diagnostics
const HISTORY_SIZE: usize = 16;

/// Recent wake causes
static HISTORY: StaticCell<HistoryBuffer<WakeCause, HISTORY_SIZE>> = StaticCell::new();

/// The process-wide wake tracker, written from wake delivery only
static WAKE_TRACKER: WakeTracker = WakeTracker::new();

/// Main task
#[main]
async fn main(_spawner: Spawner) {
    setup_logging();

    let peripherals = initialize_esp_hal({
        let mut config = EspConfig::default();
        config.cpu_clock = CpuClock::max();
        config
    });

    let systimer = SystemTimer::new(peripherals.SYSTIMER).split::<Target>();
    initialize_embassy(systimer.alarm0);

    let reason = reset_reason(Cpu::ProCpu).unwrap_or(SocResetReason::ChipPowerOn);
    info!("Reset reason: {reason:?}");

    info!("Create sleep platform over the RTC");
    let rtc = Rtc::new(peripherals.LPWR);
    let platform = RtcPlatform::new(
        rtc,
        (BUTTON_LINE, peripherals.GPIO2),
        (SENSOR_LINE, peripherals.GPIO3),
    );
    let mut scheduler = Scheduler::new(platform, &WAKE_TRACKER);

    let history: &'static mut HistoryBuffer<WakeCause, HISTORY_SIZE> =
        HISTORY.init(HistoryBuffer::new());

    loop {
        info!("Stay awake for {}s", AWAKE_PERIOD.as_secs());
        Timer::after(AWAKE_PERIOD).await;

        info!("Sleep for {SLEEP_PERIOD_MS} ms or until a wake line fires");
        let request = SleepRequest::timed(SLEEP_PERIOD_MS)
            .with_primary(BUTTON_LINE, WakeupLevel::Low)
            .with_secondary(SENSOR_LINE, WakeupLevel::High);

        match scheduler.sleep(&request) {
            Ok(cause) => {
                match cause {
                    WakeCause::Timer => info!("Woke by timer"),
                    WakeCause::Interrupt(line) => info!("Woke by interrupt line {line}"),
                }
                history.write(cause);
                let interrupts = history
                    .oldest_ordered()
                    .filter(|cause| matches!(cause, &WakeCause::Interrupt(_)))
                    .count();
                info!(
                    "{} of the last {} wakes were interrupts",
                    interrupts,
                    history.len()
                );
            }
            Err(sleep_error) => error!("Error while sleeping: {sleep_error:?}"),
        }
    }
}
