use rand::{Rng, RngCore};
use rand_xoshiro::{Xoshiro256PlusPlus, rand_core::SeedableRng};

/// Random payload whose length depends on the round.
pub fn generate_payload(round: u64) -> Vec<u8> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(round);

    let length: u64 = rng.random_range(round * 97..100 + round * 97);

    let mut data: Vec<u8> = vec![0; length as usize];
    rng.fill_bytes(&mut data);

    data
}

/// Random chunk size between 1 and 300.
pub fn generate_chunk_size(round: u64) -> usize {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(round.wrapping_add(1000));

    rng.random_range(1..=300)
}

/// Reader returning at most a few bytes per call.
pub struct TrickleReader<R> {
    inner: R,
    rng: Xoshiro256PlusPlus,
}

impl<R> TrickleReader<R> {
    pub fn new(inner: R, seed: u64) -> Self {
        Self {
            inner,
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
        }
    }
}

impl<R: std::io::Read> std::io::Read for TrickleReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let len = self.rng.random_range(1..=buf.len().min(7));
        self.inner.read(&mut buf[..len])
    }
}
