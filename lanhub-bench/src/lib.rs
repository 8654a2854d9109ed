//! # lanhub Bench
//!
//! Benchmarking utilities for lanhub performance testing.

pub mod framing;
