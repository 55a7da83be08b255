//! The message pipeline: validation, per-key locking, the send coordinator,
//! conversation lifecycle and read-side insights.

pub mod coordinator;
pub mod insight;
pub mod lifecycle;
pub mod locks;
pub mod validate;

pub use coordinator::MessagePipeline;
