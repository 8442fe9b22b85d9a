//! Deterministic random number generation
//!
//! Uses xorshift64* algorithm for fast, deterministic random number generation.
//! CRITICAL: All randomness in the simulator MUST go through this module.
//!
//! Unseeded runs are not reproducible: they draw one seed from OS entropy via
//! [`entropy_seed`] and then thread it explicitly like any other seed, so the
//! effective seed can still be reported and replayed.

mod xorshift;

pub use xorshift::RngManager;

/// Draw a fresh seed from the operating system's entropy source.
pub fn entropy_seed() -> u64 {
    rand::random::<u64>()
}
