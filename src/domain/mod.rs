//! Domain modules organized as vertical slices.
//!
//! Each sub-module contains:
//! - `mod.rs` — Rich domain types (validated, business-logic-ready)
//! - `wire.rs` — Raw serde structs matching platform responses
//! - `convert.rs` — Conversions with validation, where the shapes differ
//! - `client.rs` — Sub-client with HTTP methods and caching

pub mod chart;
pub mod indicator;
pub mod quote;
pub mod technicals;
