//! Core library for tripledger.
//!
//! This crate contains everything the front-end binary needs:
//! - `api`: REST client for the hosted identity provider
//! - `auth`: session persistence, the auth flow state machine, and the
//!   process-wide auth context
//! - `store`: local JSON stores for daily entries and vehicle settings
//! - `calc`: the daily profit formula
//! - `config`: application configuration

pub mod api;
pub mod auth;
pub mod calc;
pub mod config;
pub mod models;
pub mod store;
pub mod utils;
