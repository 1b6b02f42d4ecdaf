//! Warden authorizer service library crate.
//!
//! # Purpose
//! Exposes the decision engine, the authoring services, the consistency
//! consumers, storage backends, and the HTTP adapter for use by the binary
//! and tests.
pub mod api;
pub mod app;
pub mod authoring;
pub mod clock;
pub mod config;
pub mod directory;
pub mod engine;
pub mod error;
pub mod events;
pub mod hierarchy;
pub mod identity;
pub mod model;
pub mod observability;
pub mod reaper;
pub mod registry;
pub mod store;
