//! Consistent-hash ownership decisions.
//!
//! Every member maps to one point on a ring: its MD5 digest read as an
//! unsigned 128-bit integer. A vehicle belongs to the first member whose
//! point is at or past the vehicle's own point, wrapping to the smallest.
//! The decision is a pure function of the member set, so every worker
//! holding the same membership snapshot reaches the same answer.

use std::collections::BTreeSet;

use md5::{Digest, Md5};

/// MD5 of the UTF-8 bytes, as an unsigned 128-bit big-endian integer.
fn hash_point(key: &str) -> u128 {
    let digest = Md5::digest(key.as_bytes());
    u128::from_be_bytes(digest.into())
}

/// First entry at or past `point`, wrapping to the start of the ring.
/// The ring must be sorted by `(hash, id)`; equal hashes fall back to raw
/// byte ordering of the id, keeping ties deterministic on every node.
fn owner_on_ring<'a>(ring: &[(u128, &'a str)], point: u128) -> Option<&'a str> {
    ring.iter()
        .find(|(hash, _)| *hash >= point)
        .or_else(|| ring.first())
        .map(|(_, id)| *id)
}

/// The member that owns `resource_id`, or `None` for an empty member set.
pub fn owner_of<'a, I>(members: I, resource_id: &str) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut ring: Vec<(u128, &str)> = members
        .into_iter()
        .map(|id| (hash_point(id), id))
        .collect();
    ring.sort_unstable();

    owner_on_ring(&ring, hash_point(resource_id))
}

/// Whether `worker_id` owns `resource_id` under the given member set.
pub fn owns(worker_id: &str, members: &BTreeSet<String>, resource_id: &str) -> bool {
    owner_of(members.iter().map(String::as_str), resource_id) == Some(worker_id)
}
