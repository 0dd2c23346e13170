//! Time-ordered 128-bit identifiers.
//!
//! Layout (most significant bit first):
//!
//! ```text
//! | 48 bits unix ms | 4 bits version (8) | 12 bits counter | 2 bits variant (10) | 62 random bits |
//! ```
//!
//! Within a millisecond the counter advances by 7 (mod 4096); each new
//! millisecond starts the counter at a random value in `[3, 1024)`.

use std::ops::Range;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use rand::{Rng, RngCore};
use uuid::Uuid;

use crate::clock::{Clock, MonotonicClock};

const COUNTER_START: Range<u64> = 3..1024;
const TIME_SHIFT: u32 = 12;
const COUNTER_MASK: u64 = 0xFFF;
const COUNTER_INCREMENT: u64 = 7;
const TIME_MSB_SHIFT: u32 = 16;
const VERSION_BITS: u64 = 0x8000;
const VARIANT_BITS: u64 = 0x8000_0000_0000_0000;
const RANDOM_MASK: u64 = 0x3FFF_FFFF_FFFF_FFFF;

/// Randomness used for counters, id tails and span ids.
pub trait RandomSource: Send + Sync {
    fn next_u64(&self) -> u64;

    fn next_in_range(&self, range: Range<u64>) -> u64;

    fn fill(&self, dest: &mut [u8]);
}

/// [`RandomSource`] backed by the thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_u64(&self) -> u64 {
        rand::rng().random()
    }

    fn next_in_range(&self, range: Range<u64>) -> u64 {
        rand::rng().random_range(range)
    }

    fn fill(&self, dest: &mut [u8]) {
        rand::rng().fill_bytes(dest);
    }
}

/// Lock-free generator of time-ordered ids.
pub struct IdGenerator {
    clock: Arc<dyn Clock>,
    random: Arc<dyn RandomSource>,
    /// `(last_millis << 12) | last_counter`
    state: AtomicU64,
}

impl IdGenerator {
    pub fn new(clock: Arc<dyn Clock>, random: Arc<dyn RandomSource>) -> Self {
        let counter = random.next_in_range(COUNTER_START);
        let millis = clock.now_millis();
        Self {
            clock,
            random,
            state: AtomicU64::new((millis << TIME_SHIFT) | counter),
        }
    }

    /// Generator over the system clock and thread-local randomness.
    pub fn system() -> Self {
        Self::new(Arc::new(MonotonicClock::new()), Arc::new(ThreadRandom))
    }

    pub fn random(&self) -> &Arc<dyn RandomSource> {
        &self.random
    }

    pub fn generate(&self) -> Uuid {
        let mut current = self.state.load(Ordering::Acquire);
        let (millis, counter) = loop {
            let last_millis = current >> TIME_SHIFT;
            let last_counter = current & COUNTER_MASK;
            let now = self.clock.now_millis();

            let (millis, counter) = if now > last_millis {
                (now, self.random.next_in_range(COUNTER_START))
            } else {
                (
                    last_millis,
                    (last_counter + COUNTER_INCREMENT) & COUNTER_MASK,
                )
            };

            let next = (millis << TIME_SHIFT) | counter;
            match self.state.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break (millis, counter),
                Err(actual) => current = actual,
            }
        };

        let msb = (millis << TIME_MSB_SHIFT) | VERSION_BITS | counter;
        let lsb = VARIANT_BITS | (self.random.next_u64() & RANDOM_MASK);
        Uuid::from_u64_pair(msb, lsb)
    }

    /// Generate an id as 16 big-endian bytes.
    pub fn generate_bytes(&self) -> [u8; 16] {
        *self.generate().as_bytes()
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::system()
    }
}

impl std::fmt::Debug for IdGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdGenerator")
            .field("state", &self.state.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
