use rand::{Rng, rng};

/// A trait for random sources that return bounded random integers.
///
/// This abstraction allows you to plug in a real random source or a mocked
/// random source in tests.
///
/// # Example
/// ```
/// use wsprov::RandSource;
///
/// struct FixedRand;
/// impl RandSource<u64> for FixedRand {
///     fn rand_below(&self, bound: u64) -> u64 {
///         1234 % bound
///     }
/// }
///
/// let rng = FixedRand;
/// assert_eq!(rng.rand_below(10_000), 1234);
/// ```
pub trait RandSource<T> {
    /// Returns a value drawn uniformly from `0..bound`.
    ///
    /// Callers never pass a zero `bound`.
    fn rand_below(&self, bound: T) -> T;
}

/// A `RandSource` that uses the thread-local RNG (`rand::rng()`).
///
/// This RNG is fast, cryptographically secure (ChaCha-based), and automatically
/// reseeded periodically.
///
/// Each OS thread has its own RNG instance, so calls from multiple threads are
/// contention-free. This type does **not** store the RNG itself; it accesses
/// the thread-local generator on each call, which makes it `Send + Sync` even
/// though `ThreadRng` is not.
#[derive(Default, Clone, Copy, Debug)]
pub struct ThreadRandom;

impl RandSource<u64> for ThreadRandom {
    fn rand_below(&self, bound: u64) -> u64 {
        rng().random_range(0..bound)
    }
}
