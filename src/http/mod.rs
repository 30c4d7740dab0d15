//! Storage API transport
//!
//! [`HttpClient`] attaches the Storage token, retries transient failures
//! with the configured backoff and throttles through a shared
//! [`RateLimiter`]. Presigned file downloads go through the same client with
//! [`RequestOptions::without_auth`].

mod client;
mod rate_limit;

pub use client::{
    HttpClient, HttpClientConfig, HttpClientConfigBuilder, MultipartField, RequestBody,
    RequestOptions,
};
pub use rate_limit::{RateLimiter, RateLimiterConfig};
