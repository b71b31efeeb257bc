//! # Configuration
//!
//! Client configuration: where the API lives, how long a request may take,
//! and where the session token is kept between runs.

pub mod client;

pub use client::{ClientConfig, ConfigError};
