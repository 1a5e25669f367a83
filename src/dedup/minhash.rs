//! Native MinHash signatures and LSH banding.
//!
//! k universal-hash permutations over a token set give a signature whose
//! per-component collision rate estimates Jaccard similarity (Broder 1997).
//! Signatures are bucketed band-by-band; documents sharing any band bucket
//! are candidate pairs, and candidates are confirmed against the
//! signature-estimated similarity so the configured threshold — not the
//! banding approximation — is what accepts or rejects.
//!
//! Permutation parameters come from a fixed seed, so signatures are
//! comparable across runs. The index is run-scoped, in-memory, and
//! single-threaded by design.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Modulus for the universal hash family, as in the classic construction.
const MERSENNE_PRIME: u64 = (1 << 61) - 1;

/// Fixed seed for permutation parameters; signatures must be stable across
/// runs or cached comparisons would be meaningless.
const PERMUTATION_SEED: u64 = 0x5eed_cafe_d00d;

/// MinHash signature generator with `num_perm` permutations.
#[derive(Debug, Clone)]
pub struct MinHasher {
    permutations: Vec<(u64, u64)>,
}

impl MinHasher {
    pub fn new(num_perm: usize) -> Self {
        let mut rng = StdRng::seed_from_u64(PERMUTATION_SEED);
        let permutations = (0..num_perm)
            .map(|_| {
                (
                    rng.random_range(1..MERSENNE_PRIME),
                    rng.random_range(0..MERSENNE_PRIME),
                )
            })
            .collect();
        Self { permutations }
    }

    pub fn num_perm(&self) -> usize {
        self.permutations.len()
    }

    /// Signature of a token set. Tokens are a set: duplicates do not change
    /// the result. Empty input yields the degenerate all-MAX signature;
    /// callers are expected to skip empty documents before this point.
    pub fn signature<T: AsRef<str>>(&self, tokens: &[T]) -> Vec<u64> {
        let mut signature = vec![u64::MAX; self.permutations.len()];
        for token in tokens {
            let h = hash_token(token.as_ref());
            for (slot, &(a, b)) in signature.iter_mut().zip(&self.permutations) {
                let permuted =
                    ((a as u128 * h as u128 + b as u128) % MERSENNE_PRIME as u128) as u64;
                if permuted < *slot {
                    *slot = permuted;
                }
            }
        }
        signature
    }
}

fn hash_token(token: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    token.hash(&mut hasher);
    hasher.finish()
}

/// Fraction of equal components between two signatures — the MinHash
/// estimate of Jaccard similarity.
pub fn estimate_similarity(a: &[u64], b: &[u64]) -> f64 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let equal = a.iter().zip(b).filter(|(x, y)| x == y).count();
    equal as f64 / a.len() as f64
}

/// In-memory LSH index over MinHash signatures.
#[derive(Debug)]
pub struct LshIndex {
    threshold: f64,
    bands: usize,
    rows: usize,
    /// Per-band buckets: band hash → signature ids.
    buckets: Vec<HashMap<u64, Vec<usize>>>,
    signatures: Vec<Vec<u64>>,
}

impl LshIndex {
    /// Build an index tuned for `threshold` with `num_perm` permutations.
    pub fn new(threshold: f64, num_perm: usize) -> Self {
        let (bands, rows) = pick_bands(threshold, num_perm);
        Self {
            threshold,
            bands,
            rows,
            buckets: vec![HashMap::new(); bands],
            signatures: Vec::new(),
        }
    }

    /// Band/row split chosen for the threshold.
    pub fn shape(&self) -> (usize, usize) {
        (self.bands, self.rows)
    }

    /// Whether any indexed signature is estimated at or above the threshold.
    pub fn query(&self, signature: &[u64]) -> bool {
        let mut seen: Vec<usize> = Vec::new();
        for band in 0..self.bands {
            let key = self.band_hash(signature, band);
            if let Some(candidates) = self.buckets[band].get(&key) {
                for &candidate in candidates {
                    if seen.contains(&candidate) {
                        continue;
                    }
                    seen.push(candidate);
                    if estimate_similarity(signature, &self.signatures[candidate])
                        >= self.threshold
                    {
                        return true;
                    }
                }
            }
        }
        false
    }

    /// Index a signature. Callers query first; inserting a near-duplicate
    /// is allowed but pointless.
    pub fn insert(&mut self, signature: Vec<u64>) {
        let id = self.signatures.len();
        for band in 0..self.bands {
            let key = self.band_hash(&signature, band);
            self.buckets[band].entry(key).or_default().push(id);
        }
        self.signatures.push(signature);
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    fn band_hash(&self, signature: &[u64], band: usize) -> u64 {
        let start = band * self.rows;
        let end = (start + self.rows).min(signature.len());
        let mut hasher = DefaultHasher::new();
        signature[start..end].hash(&mut hasher);
        hasher.finish()
    }
}

/// Choose `(bands, rows)` with `bands × rows == num_perm` so that the
/// banding curve's crossover `(1/bands)^(1/rows)` sits closest to the
/// target threshold.
fn pick_bands(threshold: f64, num_perm: usize) -> (usize, usize) {
    let mut best = (1, num_perm.max(1));
    let mut best_distance = f64::INFINITY;
    for bands in 1..=num_perm.max(1) {
        if num_perm % bands != 0 {
            continue;
        }
        let rows = num_perm / bands;
        let crossover = (1.0 / bands as f64).powf(1.0 / rows as f64);
        let distance = (crossover - threshold).abs();
        if distance < best_distance {
            best_distance = distance;
            best = (bands, rows);
        }
    }
    best
}
