//! Per-path random streams keyed by `(master seed, stream label, path index)`.

use rand::rngs::StdRng;
use rand::SeedableRng;

/// Hands every path its own `StdRng`, seeded from a BLAKE3 digest of the
/// master seed, a stream label and the path index. Path `k` therefore draws
/// the same numbers whichever worker runs it and whatever ran before.
#[derive(Debug, Clone)]
pub struct RngHierarchy {
    master_seed: u64,
}

impl RngHierarchy {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    /// First eight digest bytes, little-endian. Distinct labels give
    /// unrelated streams under one master seed.
    pub fn sub_seed(&self, stream: &str, path_index: u64) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.master_seed.to_le_bytes());
        hasher.update(stream.as_bytes());
        hasher.update(&path_index.to_le_bytes());
        let hash = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(bytes)
    }

    /// Generator for path `path_index` of `stream`.
    pub fn rng_for(&self, stream: &str, path_index: u64) -> StdRng {
        StdRng::seed_from_u64(self.sub_seed(stream, path_index))
    }
}
