use std::sync::{Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use sha2::{Digest, Sha256};

use super::CODE_LENGTH;

/// Produces fixed-length numeric barcodes from identity, randomness and time.
///
/// Codes are unique in practice, not by construction; nothing here is
/// suitable where unguessability matters. The random source is owned by the
/// generator and shared across request tasks behind a mutex.
pub struct CodeGenerator {
    rng: Mutex<StdRng>,
}

impl CodeGenerator {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    pub fn with_rng(rng: StdRng) -> Self {
        Self {
            rng: Mutex::new(rng),
        }
    }

    /// Deterministic generator, for tests.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    pub fn generate(&self, user_id: &str, now_millis: u64) -> String {
        compose(identity_hash(user_id), self.next_random(), now_millis)
    }

    fn next_random(&self) -> u64 {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        rng.next_u64() & i64::MAX as u64
    }
}

impl Default for CodeGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Non-negative 31-bit hash of the identifier, stable across processes.
fn identity_hash(user_id: &str) -> u32 {
    let digest = Sha256::digest(user_id.as_bytes());
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]) & i32::MAX as u32
}

fn compose(hash: u32, random: u64, now_millis: u64) -> String {
    let mut code = format!("{}{}{}", hash, random, now_millis);
    if code.len() < CODE_LENGTH {
        code.extend(std::iter::repeat('0').take(CODE_LENGTH - code.len()));
    }
    code.truncate(CODE_LENGTH);
    code
}
