//! Typed message routing for inbound client traffic.

pub mod router;

pub use router::MessageRouter;
