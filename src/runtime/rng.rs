//!
//! Seedable random number streams bound to the running simulation.
//!
//! A runtime installs a bank of independent [`StdRng`] streams when it
//! is built. Model code draws from stream 0 through [`random`] and
//! [`sample`], or addresses a numbered stream explicitly. Streams that
//! were not given a seed are seeded from entropy.
//!

use rand::distributions::Standard;
use rand::prelude::Distribution;
use rand::rngs::{OsRng, StdRng};
use rand::{Rng, SeedableRng};
use std::cell::RefCell;

thread_local! {
    static RNG_BANK: RefCell<Vec<StdRng>> = const { RefCell::new(Vec::new()) };
}

// Installs the numbered streams for the coming run, dropping whatever a
// previous run left behind.
pub(crate) fn install(seeds: &[u64]) {
    RNG_BANK.with(|bank| {
        let mut bank = bank.borrow_mut();
        bank.clear();
        bank.extend(seeds.iter().map(|&seed| StdRng::seed_from_u64(seed)));
    });
}

fn with_stream<R>(n: usize, f: impl FnOnce(&mut StdRng) -> R) -> R {
    RNG_BANK.with(|bank| {
        let mut bank = bank.borrow_mut();
        while bank.len() <= n {
            bank.push(StdRng::from_rng(OsRng).expect("failed to seed RNG from entropy"));
        }
        f(&mut bank[n])
    })
}

///
/// Grants access to the default random number stream.
///
pub fn rng<R>(f: impl FnOnce(&mut StdRng) -> R) -> R {
    with_stream(0, f)
}

///
/// Grants access to the `n`-th random number stream.
///
pub fn rng_stream<R>(n: usize, f: impl FnOnce(&mut StdRng) -> R) -> R {
    with_stream(n, f)
}

///
/// Generates a random instance of type `T` with a `Standard`
/// distribution, drawn from the default stream.
///
#[must_use]
pub fn random<T>() -> T
where
    Standard: Distribution<T>,
{
    rng(|rng| rng.gen::<T>())
}

///
/// Samples a value from the given distribution, drawn from the default
/// stream.
///
pub fn sample<T, D>(distr: D) -> T
where
    D: Distribution<T>,
{
    rng(|rng| rng.sample::<T, D>(distr))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_streams_are_reproducible() {
        install(&[123, 456]);
        let a: u64 = random();
        let b: u64 = rng_stream(1, |rng| rng.gen());

        install(&[123, 456]);
        assert_eq!(random::<u64>(), a);
        assert_eq!(rng_stream(1, |rng| rng.gen::<u64>()), b);
        assert_ne!(a, b);
    }
}
