//! Deterministic transmission scheduling.
//!
//! Every node runs this computation independently and must arrive at the
//! same answer with no coordination: the schedule seed is a hash of the
//! transmission id, the permutation is a seeded Fisher–Yates shuffle, and
//! the input peer ordering is assumed stable across all participants.
//! A peer absent from the resulting map must not transmit at all.

use std::collections::HashMap;
use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::config::{Schedule, ScheduleError, TransmissionConfig};
use crate::transmission::PeerId;

/// Derive the 128-bit permutation seed from a transmission id.
///
/// BLAKE3 digest of the id, truncated to 16 bytes. Same id, same seed,
/// on every node.
pub fn schedule_seed(transmission_id: &str) -> [u8; 16] {
    let digest = blake3::hash(transmission_id.as_bytes());
    let mut key = [0u8; 16];
    key.copy_from_slice(&digest.as_bytes()[..16]);
    key
}

/// Deterministic permutation of `[0..n)` keyed by a 16-byte seed.
///
/// `permutation(n, key)[position]` is the permuted rank of the peer at
/// `position` in the input ordering. Bijective and reproducible
/// bit-for-bit for a given key and n.
pub fn permutation(n: usize, key: [u8; 16]) -> Vec<usize> {
    let mut seed = [0u8; 32];
    seed[..16].copy_from_slice(&key);
    let mut rng = ChaCha20Rng::from_seed(seed);

    let mut ranks: Vec<usize> = (0..n).collect();
    // Fisher–Yates, high index down
    for i in (1..n).rev() {
        let j = rng.gen_range(0..=i);
        ranks.swap(i, j);
    }
    ranks
}

/// Bucket sizes partitioning the permuted rank space into delay tiers.
/// Always sums to `n`.
pub fn schedule_shape(schedule: Schedule, n: usize) -> Vec<usize> {
    match schedule {
        Schedule::AllAtOnce => vec![n],
        Schedule::OneAtATime => vec![1; n],
    }
}

/// Delay for the peer at `position`: `bucket_index * delta_stage` for the
/// first bucket whose cumulative size exceeds the peer's permuted rank.
///
/// `None` is reachable only if the shape does not cover the population,
/// which shape construction rules out.
fn delay_for(
    position: usize,
    shape: &[usize],
    ranks: &[usize],
    delta_stage: Duration,
) -> Option<Duration> {
    let rank = ranks[position];
    let mut sum = 0usize;
    for (bucket, size) in shape.iter().enumerate() {
        sum += size;
        if rank < sum {
            return Some(delta_stage * bucket as u32);
        }
    }
    debug_assert!(
        false,
        "schedule shape sums to {sum}, does not cover rank {rank}"
    );
    None
}

/// Compute each peer's transmission delay for an already-parsed config.
///
/// Deterministic: fixed inputs yield an identical map on every call and on
/// every node.
pub fn delays_for_config(
    peers: &[PeerId],
    transmission_id: &str,
    tc: &TransmissionConfig,
) -> HashMap<PeerId, Duration> {
    let n = peers.len();
    let key = schedule_seed(transmission_id);
    let shape = schedule_shape(tc.schedule, n);
    debug_assert_eq!(shape.iter().sum::<usize>(), n);
    let ranks = permutation(n, key);

    let mut delays = HashMap::with_capacity(n);
    for (position, peer) in peers.iter().enumerate() {
        if let Some(delay) = delay_for(position, &shape, &ranks, tc.delta_stage) {
            delays.insert(*peer, delay);
        }
    }
    delays
}

/// Compute each peer's transmission delay from a request's raw
/// configuration map. Fails synchronously on a malformed config or an
/// empty transmission id; no partial result is produced.
pub fn delays_for_request(
    peers: &[PeerId],
    values: &HashMap<String, String>,
    transmission_id: &str,
) -> Result<HashMap<PeerId, Duration>, ScheduleError> {
    let tc = TransmissionConfig::extract(values)?;
    if transmission_id.is_empty() {
        return Err(ScheduleError::EmptyTransmissionId);
    }
    Ok(delays_for_config(peers, transmission_id, &tc))
}
