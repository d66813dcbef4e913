//! HTTP client layer — `ChartfeedHttp` with per-endpoint retry policies.

pub mod client;
pub mod retry;

pub use client::ChartfeedHttp;
pub use retry::{RetryConfig, RetryPolicy};
