//! Running node processes
//!
//! Nodes are launched elsewhere; this module only records them and looks
//! them up again by PID or by the provider they were launched for.

pub mod running_nodes;

pub use running_nodes::{is_process_alive, NodeProcess, ProcessLookup, RunningNodes};
