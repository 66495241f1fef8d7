//! Symmetric payload obfuscation
//!
//! XOR with a keystream drawn from a PCG generator seeded by the session key.
//! Applying the same obfuscator twice restores the input. This hides payloads
//! from casual inspection; it is not encryption.

use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Obfuscator {
    key: u32,
}

impl Obfuscator {
    pub fn new(key: u32) -> Self {
        Self { key }
    }

    pub fn key(&self) -> u32 {
        self.key
    }

    /// XOR `bytes` in place with the keystream for this key
    pub fn apply(&self, bytes: &mut [u8]) {
        let mut rng = Pcg32::seed_from_u64(u64::from(self.key));
        let mut block = [0u8; 64];
        for chunk in bytes.chunks_mut(block.len()) {
            rng.fill_bytes(&mut block);
            for (byte, mask) in chunk.iter_mut().zip(block.iter()) {
                *byte ^= mask;
            }
        }
    }
}
