//! HTTP access module.
//!
//! This module provides:
//! - A shared client with rate-limit backoff and request timeouts
//! - Keyed, expiring API-token cache
//! - A generic OAuth2 client-credentials token exchange

pub mod client;
pub mod keys;

pub use client::{retry_rate_limited, Backoff, FetchedText, HasStatus, HttpClient};
pub use keys::{ApiKey, ApiKeyCache, ClientCredentials, TokenExchange};
