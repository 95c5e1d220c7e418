//! Test framework for network resolution
//!
//! Mock providers, a recording fork provider factory, running-node records
//! and a small IPC node for connection tests.

pub mod test_utils;

pub use test_utils::*;
