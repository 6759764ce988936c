//! Uniform in-place shuffling of scan results
//!
//! A process-wide generator, guarded by a mutex, is only used to seed one generator per thread.
//! Every draw after that is made from the thread's own generator without synchronization.

use rand::{Rng, RngCore, SeedableRng, rngs::StdRng};
use std::cell::RefCell;
use std::sync::{LazyLock, Mutex, PoisonError};

static SEED_SOURCE: LazyLock<Mutex<StdRng>> = LazyLock::new(|| Mutex::new(StdRng::from_entropy()));

thread_local! {
    static THREAD_RNG: RefCell<Option<StdRng>> = const { RefCell::new(None) };
}

fn next_seed() -> u64 {
    SEED_SOURCE
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .next_u64()
}

/// Make the process-wide seed source deterministic.
///
/// Only threads that have not drawn yet are affected; the calling thread's generator is reset.
pub fn reseed(seed: u64) {
    *SEED_SOURCE.lock().unwrap_or_else(PoisonError::into_inner) = StdRng::seed_from_u64(seed);
    THREAD_RNG.with(|rng| *rng.borrow_mut() = None);
}

/// Shuffle `items` in place using the calling thread's generator
pub fn shuffle<T>(items: &mut [T]) {
    THREAD_RNG.with(|cell| {
        let mut slot = cell.borrow_mut();
        let rng = slot.get_or_insert_with(|| StdRng::seed_from_u64(next_seed()));
        shuffle_with(rng, items);
    });
}

/// Fisher-Yates: for n from len-1 down to 1 swap element n with a uniform pick from [0, n]
pub fn shuffle_with<R: Rng + ?Sized, T>(rng: &mut R, items: &mut [T]) {
    for n in (1..items.len()).rev() {
        let k = rng.gen_range(0..=n);
        items.swap(n, k);
    }
}
