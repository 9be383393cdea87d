//! Deterministic pseudo-random numbers and low-discrepancy sequences.

/// PCG-style integer hash.
pub fn pcg_hash(input: u32) -> u32 {
    let state = input.wrapping_mul(747_796_405).wrapping_add(2_891_336_453);
    let word = ((state >> ((state >> 28) + 4)) ^ state).wrapping_mul(277_803_737);
    (word >> 22) ^ word
}

/// Hash several values into one seed.
pub fn hash_combine(values: &[u32]) -> u32 {
    values
        .iter()
        .fold(0x9e37_79b9, |acc, &v| pcg_hash(acc ^ v.wrapping_add(0x9e37_79b9)))
}

/// Small sequential generator seeded from a hash.
#[derive(Debug, Clone)]
pub struct SampleGenerator {
    state: u32,
}

impl SampleGenerator {
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    pub fn next_u32(&mut self) -> u32 {
        self.state = pcg_hash(self.state);
        self.state
    }

    /// Uniform value in `[0, 1)`.
    pub fn next_f32(&mut self) -> f32 {
        (self.next_u32() >> 8) as f32 / (1u32 << 24) as f32
    }
}

/// Radical inverse of `index` in `base`.
pub fn halton(base: u32, mut index: u32) -> f32 {
    let mut fraction = 1.0f32;
    let mut result = 0.0f32;
    while index > 0 {
        fraction /= base as f32;
        result += fraction * (index % base) as f32;
        index /= base;
    }
    result
}
