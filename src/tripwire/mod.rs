//! Tripwire: BLAKE3 fingerprints and stale-lock detection.

pub mod drift;
pub mod hasher;
