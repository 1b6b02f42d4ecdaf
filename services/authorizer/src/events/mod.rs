//! Consistency maintenance.
//!
//! # Purpose
//! Keeps stored policies and role memberships in step with the rest of the
//! platform: when an org entity is deleted its grants go with it, and renames
//! are copied into the denormalized display names.
//!
//! # Key invariants
//! - Delivery is at-least-once, so every handler is idempotent.
//! - Whether a failed message is acknowledged or redelivered depends only on
//!   the error's category; an error nobody classified is redelivered.
//! - Shutdown stops polling and waits for in-flight handlers.
pub mod bus;
pub mod handlers;
pub mod retry;
pub mod worker;

pub use bus::{MemoryQueue, Message, MessageQueue};
pub use handlers::{ConsistencyHandler, EventError, EventHandler, TOPICS};
pub use retry::{Disposition, disposition};
pub use worker::spawn_consumers;
