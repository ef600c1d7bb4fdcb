//! Core types and trait definitions for the Rollcall attendance backend.
//!
//! No HTTP or database dependencies. The occupancy resolver and analytics
//! are pure functions over scan events.

// Native `async fn` in traits; `Send` bounds are spelled out on the store.
#![allow(async_fn_in_trait)]

pub mod analytics;
pub mod error;
pub mod member;
pub mod notify;
pub mod occupancy;
pub mod scan;
pub mod store;

pub use error::{Error, Result};
