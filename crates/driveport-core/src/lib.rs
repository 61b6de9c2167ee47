//! Driveport Core - Domain types, ports and configuration
//!
//! This crate contains the provider-agnostic core with:
//! - **Domain values** - `OAuthToken`, `DriveInfo`, `RemoteFileItem`, `FileInfo`
//! - **Error taxonomy** - the closed `DriveError` enum
//! - **Port definitions** - Traits for adapters and host collaborators:
//!   `IClock`, `ITokenObserver`, `IPresentationContext`
//! - **Configuration** - YAML-backed `Config` with validation and a builder
//! - **Logging** - optional `tracing-subscriber` setup for hosts
//!
//! # Architecture
//!
//! This crate follows the hexagonal (ports & adapters) architecture pattern.
//! The domain module holds plain values with no I/O. Ports define the trait
//! interfaces that the Graph adapter and the host application implement.

pub mod config;
pub mod domain;
pub mod logging;
pub mod ports;
