//! Tether Core
//!
//! This crate provides the core runtime for Tether, a dependency-tracking
//! reactive state library. It implements:
//!
//! - Tracked records whose property reads and writes are observed
//! - Effects that re-run when a property they read is written
//! - Automatic re-collection of dependencies on every run
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Tracked records, effects, the subscription store and the
//!   runtime that dispatches writes
//! - `config`: Runtime configuration
//! - `error`: Error types for the fallible, typed edges of the API
//!
//! # Example
//!
//! ```rust,ignore
//! use serde_json::json;
//! use tether_core::reactive::Runtime;
//!
//! let runtime = Runtime::new();
//! let state = runtime.wrap_json(json!({ "ok": true, "text": "hello" }))?;
//!
//! // Create an effect
//! let _effect = runtime.effect({
//!     let state = state.clone();
//!     move || {
//!         if state.get("ok") == Some(json!(true)) {
//!             println!("{:?}", state.get("text"));
//!         }
//!     }
//! });
//!
//! // Update the record
//! state.set("text", json!("world"));
//! // Effect automatically runs, prints: Some(String("world"))
//! ```

pub mod config;
pub mod error;
pub mod reactive;

pub use config::RuntimeConfig;
pub use error::{ReactiveError, Result};
pub use reactive::{Effect, Runtime, Tracked};
