//! Core business logic for arena-rs.
//!
//! The [`CompetitionEngine`] runs every competition kind through one
//! lifecycle; how participants arrive is chosen per kind by an
//! [`Acquisition`] strategy.

pub mod services;

pub use services::*;
