//! Session layer: owns the token and sequences the API calls.
//!
//! - `login_by_udid` acquires a token, which later calls attach as a bearer
//! - `refresh_token` replaces it wholesale
//! - `get_user_info` and `get_castle_detail` require it and fail fast without it
//!
//! Failures never clear the token and are never retried.

mod client;
mod config;
mod types;

pub use client::SessionClient;
pub use config::{Config, RawConfig};
pub use types::{DEFAULT_DEVICE_TYPE, DEFAULT_PLATFORM, LoginRequest};
