//! REST client module for the hosted identity provider.
//!
//! This module provides the `IdentityClient` implementation of the
//! `IdentityBackend` trait, speaking a GoTrue-style HTTP API for sign-up,
//! OTP delivery and verification, password sign-in, and token refresh.

pub mod client;
pub mod error;

pub use client::IdentityClient;
pub use error::BackendError;
