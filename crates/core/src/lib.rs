//! Shonifity Core - Shared domain types.
//!
//! This crate provides the types used across all Shonifity components:
//! - `storefront` - REST API for catalog, cart, coupons, checkout and chatbot
//! - `cli` - Command-line tools for migrations, seeding and maintenance
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no database
//! access, no HTTP clients. Cart mutation rules, minor-unit conversion and
//! totals live here so they can be tested without any infrastructure.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, money, cart entries, coupons, orders and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
