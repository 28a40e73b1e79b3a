// Copyright Claudio Mattera 2024-2025.
//
// Distributed under the MIT License or the Apache 2.0 License at your option.
// See the accompanying files LICENSE-MIT.txt and LICENSE-APACHE-2.0.txt, or
// online at
// https://opensource.org/licenses/MIT
// https://opensource.org/licenses/Apache-2.0

//! Data structures and functions for error handling

/// An error
///
/// The scheduler has no failure modes of its own; it only propagates errors
/// from the platform primitives. `P` is the power-down error type and `W`
/// the wake-interrupt error type; infallible platforms use
/// [`Infallible`][core::convert::Infallible] for both.
#[derive(Debug, PartialEq, Eq)]
pub enum Error<P, W> {
    /// An error in the underlying power-down primitive
    PowerDown(P),

    /// An error in the underlying wake-interrupt configuration
    Interrupt(W),
}

#[cfg(feature = "std")]
impl<P, W> std::error::Error for Error<P, W>
where
    P: core::fmt::Debug,
    W: core::fmt::Debug,
{
}

#[cfg(feature = "std")]
impl<P, W> core::fmt::Display for Error<P, W>
where
    P: core::fmt::Debug,
    W: core::fmt::Debug,
{
    fn fmt(&self, formatter: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(formatter, "{self:?}")
    }
}
