use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Seeded source of bounded random integers.
///
/// The same seed and the same sequence of bounds always yield the same
/// values. `random_range` rejects out-of-zone draws instead of taking a
/// plain modulo, so small bounds stay unbiased.
#[derive(Debug, Clone)]
pub struct Sampler {
    rng: StdRng,
}

impl Sampler {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Uniform value in `[0, bound)`. `bound` must be non-zero.
    pub fn sample(&mut self, bound: u32) -> u32 {
        debug_assert!(bound > 0, "sample bound must be positive");
        self.rng.random_range(0..bound)
    }

    pub fn coin(&mut self) -> bool {
        self.sample(2) == 1
    }

    /// Uniform value in `[-magnitude, magnitude]`.
    pub fn signed(&mut self, magnitude: i32) -> i32 {
        let span = (magnitude as u32) * 2 + 1;
        self.sample(span) as i32 - magnitude
    }

    /// Pick one element of a non-empty slice.
    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        &items[self.sample(items.len() as u32) as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_stream() {
        let mut a = Sampler::new(42);
        let mut b = Sampler::new(42);
        let bounds = [32, 2, 4095, 49, 1 << 20, 7];
        for _ in 0..200 {
            for &bound in &bounds {
                assert_eq!(a.sample(bound), b.sample(bound));
            }
        }
    }

    #[test]
    fn test_different_seeds_diverge() {
        let mut a = Sampler::new(1);
        let mut b = Sampler::new(2);
        let sa: Vec<u32> = (0..64).map(|_| a.sample(1 << 20)).collect();
        let sb: Vec<u32> = (0..64).map(|_| b.sample(1 << 20)).collect();
        assert_ne!(sa, sb);
    }

    #[test]
    fn test_bounds_respected() {
        let mut s = Sampler::new(3);
        for _ in 0..10_000 {
            assert!(s.sample(32) < 32);
            assert_eq!(s.sample(1), 0);
            let v = s.signed(2047);
            assert!((-2047..=2047).contains(&v));
        }
    }

    #[test]
    fn test_covers_small_range() {
        let mut s = Sampler::new(9);
        let mut seen = [false; 32];
        for _ in 0..5_000 {
            seen[s.sample(32) as usize] = true;
        }
        assert!(seen.iter().all(|&x| x));
    }
}
