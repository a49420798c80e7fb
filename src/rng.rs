use crate::Float;
use rand::prelude::*;
use rand_distr::{Standard, StandardNormal};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Mixes a 64-bit value into a well-spread seed (splitmix64 finalizer).
/// Used to derive independent stream seeds from a base seed plus a tag.
#[inline(always)]
pub(crate) fn splitmix64(x: u64) -> u64 {
    let mut z = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// A pool of independent pseudorandom streams.
///
/// Workers check a stream out for the duration of one voxel's work and
/// return it afterward; `scope` does both and releases on every exit
/// path. Checked-out streams must not be shared between concurrent
/// workers; a team that needs concurrent draws derives per-worker
/// sub-streams with `RngState::seeded` instead (see
/// `collide::BinaryCollisionPipeline`).
pub struct RngPool {
    free: Mutex<Vec<StdRng>>,
    seed: u64,
    next_stream: AtomicU64,
}

impl RngPool {
    pub fn new(seed: u64) -> RngPool {
        RngPool {
            free: Mutex::new(Vec::new()),
            seed,
            next_stream: AtomicU64::new(0),
        }
    }

    /// Check out a stream. Pair every acquire with a `release`, on every
    /// exit path; prefer `scope` which cannot forget.
    pub fn acquire(&self) -> RngState {
        let recycled = self
            .free
            .lock()
            .expect("rng pool mutex poisoned")
            .pop();
        let rng = match recycled {
            Some(rng) => rng,
            None => {
                let n = self.next_stream.fetch_add(1, Ordering::Relaxed);
                StdRng::seed_from_u64(splitmix64(self.seed ^ n))
            }
        };
        RngState { rng }
    }

    /// Return a stream to the pool.
    pub fn release(&self, state: RngState) {
        self.free
            .lock()
            .expect("rng pool mutex poisoned")
            .push(state.rng);
    }

    /// Run `f` with a checked-out stream, releasing it afterward.
    pub fn scope<T>(&self, f: impl FnOnce(&mut RngState) -> T) -> T {
        let mut state = self.acquire();
        let out = f(&mut state);
        self.release(state);
        out
    }
}

/// One pseudorandom stream, checked out of an `RngPool` or seeded
/// directly for tests and per-worker sub-streams.
pub struct RngState {
    rng: StdRng,
}

impl RngState {
    /// A standalone stream with a fixed seed. Deterministic; used for
    /// tests and for deriving per-worker sub-streams from a team draw.
    pub fn seeded(seed: u64) -> RngState {
        RngState {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Uniform draw in [0, 1).
    #[inline(always)]
    pub fn frand(&mut self) -> Float {
        self.rng.sample(Standard)
    }

    /// Uniform draw in [low, high).
    #[inline(always)]
    pub fn uniform(&mut self, low: Float, high: Float) -> Float {
        low + (high - low) * self.frand()
    }

    /// Standard normal draw.
    #[inline(always)]
    pub fn normal(&mut self) -> Float {
        self.rng.sample(StandardNormal)
    }

    #[inline(always)]
    pub fn gen_u64(&mut self) -> u64 {
        self.rng.gen()
    }

    /// Fisher-Yates shuffle of a slice.
    #[inline(always)]
    pub fn shuffle<T>(&mut self, xs: &mut [T]) {
        xs.shuffle(&mut self.rng);
    }
}
