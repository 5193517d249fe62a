//! Event handling for snipe-bot.
//!
//! This module provides the platform event model and the router that
//! delivers each event to the handlers features registered for it.

pub mod event;
pub mod router;
