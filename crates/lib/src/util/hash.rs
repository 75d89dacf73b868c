//! Hashing of declared item sets.
//!
//! The checker persists a hash of each configuration's declared inputs so that
//! an added or removed item is noticed even when every remaining file is older
//! than the last build.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// SHA-256 of a sorted item set, as lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemSetHash(pub String);

impl fmt::Display for ItemSetHash {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Hash a set of `(item type, path)` pairs.
///
/// Pairs are sorted first, so enumeration order does not affect the result.
pub fn hash_item_set<'a, I>(items: I) -> ItemSetHash
where
  I: IntoIterator<Item = (&'a str, &'a Path)>,
{
  let mut entries: Vec<(&str, String)> = items
    .into_iter()
    .map(|(item_type, path)| (item_type, path.to_string_lossy().into_owned()))
    .collect();
  entries.sort();
  entries.dedup();

  let mut hasher = Sha256::new();
  for (item_type, path) in &entries {
    hasher.update(item_type.as_bytes());
    hasher.update([0u8]);
    hasher.update(path.as_bytes());
    hasher.update([b'\n']);
  }
  ItemSetHash(hex::encode(hasher.finalize()))
}
