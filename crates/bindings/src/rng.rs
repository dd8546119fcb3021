use core::cell::RefCell;
use core::marker::PhantomData;

use rand08::distributions::{Distribution, Standard};
use rand08::rngs::StdRng;
use rand08::{Error, RngCore, SeedableRng};

use crate::ReducerContext;

impl ReducerContext {
    /// Generates a random value.
    ///
    /// Similar to [`rand08::random()`], but using [`StdbRng`] instead.
    ///
    /// See also [`ReducerContext::rng()`].
    pub fn random<T>(&self) -> T
    where
        Standard: Distribution<T>,
    {
        Standard.sample(&mut self.rng())
    }

    /// Retrieves the random number generator for this reducer invocation,
    /// seeded from the invocation timestamp.
    ///
    /// Import [`rand08::Rng`] to access its many useful algorithms;
    /// if you only need a single value, [`ReducerContext::random()`]
    /// is more convenient.
    pub fn rng(&self) -> &StdbRng {
        self.rng.get_or_init(|| StdbRng {
            rng: RefCell::new(StdRng::seed_from_u64(self.timestamp.to_micros_since_unix_epoch() as u64)),
            _not_send: PhantomData,
        })
    }
}

/// The deterministic pseudo-random source of a reducer invocation.
///
/// Uses the same PRNG as [`StdRng`], but seeded from the publicly known
/// invocation timestamp, so it is in no way cryptographically secure.
///
/// State must not be smuggled between invocations through an rng
/// (or any other in-WASM side channel): anything persisted across
/// reducer calls belongs in the database.
pub struct StdbRng {
    rng: RefCell<StdRng>,

    // !Send + !Sync
    _not_send: PhantomData<*mut ()>,
}

impl RngCore for StdbRng {
    fn next_u32(&mut self) -> u32 {
        (&*self).next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        (&*self).next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        (&*self).fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Error> {
        (&*self).try_fill_bytes(dest)
    }
}

impl RngCore for &StdbRng {
    fn next_u32(&mut self) -> u32 {
        self.rng.borrow_mut().next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.rng.borrow_mut().next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.rng.borrow_mut().fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Error> {
        self.rng.borrow_mut().try_fill_bytes(dest)
    }
}
