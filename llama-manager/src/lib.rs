//! Llama Manager - resilient client for a llama gateway.
//!
//! Every call goes through a fixed-count, fixed-delay [`RetryPolicy`]
//! (3 attempts, 10s per attempt, 2s between attempts by default).

pub mod client;
pub mod error;
pub mod retry;

pub use client::{LlamaManager, DEFAULT_SERVER_URL, SERVER_URL_ENV};
pub use error::{Error, Result};
pub use gateway_common::ChatMessage;
pub use retry::RetryPolicy;
