//! The ephemeral snapshot store.
//!
//! Deleted messages are captured into the durable store, hydrated into an
//! in-process cache, and handed back to exactly one requester before being
//! removed. Cache entries are reclaimed only on the host's sweep signal.

pub mod cache;
pub mod feature;
pub mod filter;
pub mod manager;
