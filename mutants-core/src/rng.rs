//! Deterministic named RNG streams shared by the scheduler and creature AI.
use hmac::{Hmac, Mac};
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sha2::Sha256;
use std::cell::{RefCell, RefMut};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

/// Concrete generator backing every stream in the pool.
pub type StreamRng = CountingRng<ChaCha8Rng>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RngError {
    #[error("stream {stream} cannot advance by negative steps ({steps})")]
    NegativeSteps { stream: String, steps: i64 },
}

/// Counting wrapper for RNG streams providing instrumentation.
#[derive(Debug, Clone)]
pub struct CountingRng<R> {
    rng: R,
    draws: u64,
}

impl<R> CountingRng<R> {
    #[must_use]
    pub const fn new(rng: R) -> Self {
        Self { rng, draws: 0 }
    }
}

impl CountingRng<ChaCha8Rng> {
    /// Build a stream seeded directly from a 64-bit value.
    #[must_use]
    pub fn from_seed(seed: u64) -> Self {
        Self::new(ChaCha8Rng::seed_from_u64(seed))
    }
}

impl<R: RngCore> CountingRng<R> {
    /// Number of draw calls performed against this stream.
    #[must_use]
    pub const fn draws(&self) -> u64 {
        self.draws
    }
}

impl<R: RngCore> RngCore for CountingRng<R> {
    fn next_u32(&mut self) -> u32 {
        self.draws = self.draws.saturating_add(1);
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.draws = self.draws.saturating_add(1);
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.draws = self.draws.saturating_add(1);
        self.rng.fill_bytes(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.draws = self.draws.saturating_add(1);
        self.rng.try_fill_bytes(dest)
    }
}

/// Shared handle to a single stream.
///
/// Clones alias the same generator, so a handle injected into a context and
/// the one kept by the pool advance together.
#[derive(Clone)]
pub struct RngHandle(Rc<RefCell<StreamRng>>);

impl RngHandle {
    #[must_use]
    pub fn from_seed(seed: u64) -> Self {
        Self(Rc::new(RefCell::new(StreamRng::from_seed(seed))))
    }

    /// Mutably borrow the underlying generator.
    ///
    /// # Panics
    ///
    /// Panics if the stream is already borrowed; callers borrow one stream at a
    /// time and release it before handing control to nested AI calls.
    #[must_use]
    pub fn borrow_mut(&self) -> RefMut<'_, StreamRng> {
        self.0.borrow_mut()
    }

    #[must_use]
    pub fn draws(&self) -> u64 {
        self.0.borrow().draws()
    }

    /// True when both handles point at the same generator.
    #[must_use]
    pub fn same_stream(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for RngHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RngHandle")
            .field("draws", &self.draws())
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
struct StreamState {
    tick: u64,
    cached: Option<(u64, RngHandle)>,
}

/// Pool of named streams, each with its own tick counter.
///
/// A stream's generator is re-derived from the pool seed, its name and its
/// tick, so replaying the same sequence of ticks reproduces the same draws.
#[derive(Debug, Clone)]
pub struct RngPool {
    seed: u64,
    streams: BTreeMap<String, StreamState>,
}

impl RngPool {
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self {
            seed,
            streams: BTreeMap::new(),
        }
    }

    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Current tick of `name`; unknown streams report zero.
    #[must_use]
    pub fn tick(&self, name: &str) -> u64 {
        self.streams.get(name).map_or(0, |state| state.tick)
    }

    /// Advance `name` by `steps` ticks and return the new tick.
    ///
    /// # Errors
    ///
    /// Returns `RngError::NegativeSteps` when `steps` is negative.
    pub fn advance_tick(&mut self, name: &str, steps: i64) -> Result<u64, RngError> {
        if steps < 0 {
            return Err(RngError::NegativeSteps {
                stream: name.to_string(),
                steps,
            });
        }
        let state = self.streams.entry(name.to_string()).or_default();
        if steps == 0 {
            return Ok(state.tick);
        }
        state.tick = state.tick.saturating_add(steps.unsigned_abs());
        Ok(state.tick)
    }

    pub fn reset_tick(&mut self, name: &str) {
        if let Some(state) = self.streams.get_mut(name) {
            state.tick = 0;
            state.cached = None;
        }
    }

    /// Generator for `name` at its current tick.
    ///
    /// Repeated calls within one tick return the same handle; the first call
    /// after the tick moves derives a fresh generator.
    pub fn get_rng(&mut self, name: &str) -> RngHandle {
        let seed = self.seed;
        let state = self.streams.entry(name.to_string()).or_default();
        let tick = state.tick;
        if let Some((cached_tick, handle)) = &state.cached
            && *cached_tick == tick
        {
            return handle.clone();
        }
        let handle = RngHandle::from_seed(derive_stream_seed(seed, name, tick));
        state.cached = Some((tick, handle.clone()));
        handle
    }
}

/// Derive a stream seed from the pool seed, stream name and tick.
#[must_use]
pub fn derive_stream_seed(seed: u64, name: &str, tick: u64) -> u64 {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(&seed.to_le_bytes()).expect("64-bit seed is valid key");
    mac.update(name.as_bytes());
    mac.update(b":");
    mac.update(&tick.to_le_bytes());
    let digest = mac.finalize().into_bytes();
    let mut seed_bytes = [0_u8; 8];
    seed_bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(seed_bytes)
}

/// Draw a percentile roll in `0..100`.
pub fn percent_roll(rng: &mut dyn RngCore) -> i32 {
    rng.gen_range(0..100)
}
