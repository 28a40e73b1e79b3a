// Copyright Claudio Mattera 2024-2025.
//
// Distributed under the MIT License or the Apache 2.0 License at your option.
// See the accompanying files LICENSE-MIT.txt and LICENSE-APACHE-2.0.txt, or
// online at
// https://opensource.org/licenses/MIT
// https://opensource.org/licenses/Apache-2.0

//! Hardware power-down intervals

/// One fixed-length hardware-supported power-down interval
///
/// The menu of intervals is fixed by the hardware; arbitrary durations are
/// obtained by chaining several of them (see [`Scheduler`][crate::Scheduler]).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interval {
    /// 64 ms
    Millis64,

    /// 128 ms
    Millis128,

    /// 256 ms
    Millis256,

    /// 512 ms
    Millis512,

    /// 1 s
    Seconds1,

    /// 2 s
    Seconds2,

    /// 4 s
    Seconds4,

    /// 8 s
    Seconds8,

    /// 16 s
    Seconds16,

    /// 32 s
    Seconds32,

    /// Power down until an armed wake line fires
    Forever,
}

impl Interval {
    /// Return the nominal length in milliseconds
    ///
    /// Returns `None` for [`Interval::Forever`], which has no length.
    #[must_use]
    pub const fn length_ms(self) -> Option<u32> {
        match self {
            Self::Millis64 => Some(64),
            Self::Millis128 => Some(128),
            Self::Millis256 => Some(256),
            Self::Millis512 => Some(512),
            Self::Seconds1 => Some(1_000),
            Self::Seconds2 => Some(2_000),
            Self::Seconds4 => Some(4_000),
            Self::Seconds8 => Some(8_000),
            Self::Seconds16 => Some(16_000),
            Self::Seconds32 => Some(32_000),
            Self::Forever => None,
        }
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
    fn lengths_match_the_hardware_menu() {
        assert_eq!(Interval::Millis64.length_ms(), Some(64));
        assert_eq!(Interval::Seconds1.length_ms(), Some(1_000));
        assert_eq!(Interval::Seconds32.length_ms(), Some(32_000));
        assert_eq!(Interval::Forever.length_ms(), None);
    }
}
