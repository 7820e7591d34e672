//! Shared model and input handling for `lanscope`.
//!
//! Everything in here is pure: no sockets, no subprocesses. The discovery
//! engine in `lanscope-core` and the parsers in `lanscope-protocols` both
//! build on these types.

pub mod config;
pub mod error;
pub mod network;
pub mod vendors;
