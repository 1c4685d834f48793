use std::collections::HashSet;

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Deterministic pseudo-random integers in `[minimum, maximum]`, derived from
/// a public seed.
///
/// The `n`th value (1-based counter `n`) is `SHA-256("{seed},{n}")`, read as a
/// big-endian integer, reduced modulo the range size and offset by
/// `minimum`. Anyone holding the seed can reproduce the sequence.
///
/// Without replacement, values already produced are skipped, so the sequence
/// ends once every value in the range has appeared.
#[derive(Debug, Clone)]
pub struct PseudoRandomNumberGenerator {
    seed: String,
    with_replacement: bool,
    minimum: u64,
    maximum: u64,
    /// Hash counter for the next raw value.
    counter: u64,
    /// Every value produced so far, in sequence order.
    generated: Vec<u64>,
    seen: HashSet<u64>,
}

impl PseudoRandomNumberGenerator {
    pub fn new(
        seed: impl Into<String>,
        with_replacement: bool,
        minimum: u64,
        maximum: u64,
    ) -> Result<Self> {
        let seed = seed.into();
        if seed.is_empty() {
            return Err(Error::Prng("seed must not be empty".to_string()));
        }
        if minimum > maximum {
            return Err(Error::Prng(format!(
                "empty range: minimum {minimum} exceeds maximum {maximum}"
            )));
        }
        Ok(Self {
            seed,
            with_replacement,
            minimum,
            maximum,
            counter: 1,
            generated: Vec::new(),
            seen: HashSet::new(),
        })
    }

    /// Number of distinct values the generator can produce.
    fn range_size(&self) -> u128 {
        u128::from(self.maximum - self.minimum) + 1
    }

    /// The value for hash counter `counter`, before any skipping.
    fn raw_value(&self, counter: u64) -> u64 {
        let digest = Sha256::digest(format!("{},{}", self.seed, counter).as_bytes());
        let modulus = self.range_size();
        let reduced = digest
            .iter()
            .fold(0u128, |acc, &byte| (acc * 256 + u128::from(byte)) % modulus);
        // `reduced < modulus <= 2^64`, and `minimum + reduced <= maximum`.
        self.minimum + reduced as u64
    }

    /// Make sure at least `len` values have been produced.
    fn extend_to(&mut self, len: usize) -> Result<()> {
        if !self.with_replacement && len as u128 > self.range_size() {
            return Err(Error::Prng(format!(
                "cannot draw {len} distinct values from [{}, {}]",
                self.minimum, self.maximum
            )));
        }
        while self.generated.len() < len {
            let value = self.raw_value(self.counter);
            self.counter += 1;
            if self.with_replacement || self.seen.insert(value) {
                self.generated.push(value);
            }
        }
        Ok(())
    }

    /// The values at sequence indices `[start, end)` (0-based).
    ///
    /// Overlapping requests always agree on the values they share.
    pub fn get_random_numbers(&mut self, start: usize, end: usize) -> Result<Vec<u64>> {
        if start > end {
            return Err(Error::Prng(format!("invalid slice [{start}, {end})")));
        }
        self.extend_to(end)?;
        Ok(self.generated[start..end].to_vec())
    }

    pub fn seed(&self) -> &str {
        &self.seed
    }

    pub fn with_replacement(&self) -> bool {
        self.with_replacement
    }
}

/// Create a generator for the published `seed`.
pub fn generate(
    seed: &str,
    minimum: u64,
    maximum: u64,
    with_replacement: bool,
) -> Result<PseudoRandomNumberGenerator> {
    PseudoRandomNumberGenerator::new(seed, with_replacement, minimum, maximum)
}
