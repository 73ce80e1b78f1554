//! Server orchestration: accept loop, periodic cycles, shutdown.

pub mod core;
pub mod handlers;

pub use core::SyncServer;
