//! Deterministic, seedable random source injected into the simulation so
//! blocked-redirect and placement outcomes are reproducible in tests.

/// Splitmix-style generator: a Weyl increment hashed through an avalanche
/// finalizer. Four bytes of state, full 2^32 period.
#[derive(Clone, Debug)]
pub struct Rng {
    state: u32,
}

impl Rng {
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_add(0x9e37_79b9);
        let mut z = self.state;
        z = (z ^ (z >> 16)).wrapping_mul(0x21f0_aaad);
        z = (z ^ (z >> 15)).wrapping_mul(0x735a_2d97);
        z ^ (z >> 15)
    }

    /// Multiply-shift reduction onto [0, n).
    fn bounded(&mut self, n: u32) -> u32 {
        ((u64::from(self.next_u32()) * u64::from(n)) >> 32) as u32
    }

    /// Uniform integer in [min, max] inclusive.
    pub fn int(&mut self, min: i32, max: i32) -> i32 {
        if max <= min {
            return min;
        }
        min + self.bounded((max - min + 1) as u32) as i32
    }

    pub fn pick_index(&mut self, len: usize) -> usize {
        if len <= 1 {
            return 0;
        }
        self.bounded(len as u32) as usize
    }
}
