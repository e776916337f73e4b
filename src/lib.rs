//! Tollbooth - Admission, Caching, and Pub/Sub Toolkit
//!
//! This crate implements the shared-store utility layer behind a rate-limited
//! web backend: fixed-window admission control, TTL-based response caching,
//! and publish/subscribe event fan-out with a bounded recent-history buffer.
//! All three components sit on the [`store::CounterStore`] capability and
//! degrade to pass-through when the store is unavailable.

pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod pipeline;
pub mod ratelimit;
pub mod store;
