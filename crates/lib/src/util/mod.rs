//! Shared utilities.
//!
//! Path normalization and item-set hashing used across the crate, plus test helpers.

pub mod hash;
pub mod paths;

#[cfg(test)]
pub mod testutil;
