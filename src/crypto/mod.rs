//! Pseudo-random sampling from a published seed.

mod prng;

pub use prng::{generate, PseudoRandomNumberGenerator};
