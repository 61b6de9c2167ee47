//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the domain core
//! depends on, but whose implementations live in adapter crates or in the
//! host application.
//!
//! ## Ports Overview
//!
//! - [`IClock`] - Current time, injectable for tests
//! - [`ITokenObserver`] - Receives replacement tokens for persistence
//! - [`IPresentationContext`] - Hosts the interactive login page

pub mod clock;
pub mod presentation;
pub mod token_observer;

pub use clock::{IClock, ManualClock, SystemClock};
pub use presentation::{AuthorizationRequest, IPresentationContext, PresentationOutcome};
pub use token_observer::{ITokenObserver, NoopTokenObserver};
