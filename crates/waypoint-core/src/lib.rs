//! Core types and services for the Waypoint tour engine.
//!
//! This crate owns the tour authoring state machine, route measurement, and
//! live tour execution tracking. It has no HTTP or database
//! dependencies: persistence sits behind [`store::TourStore`] and purchase
//! verification behind [`entitlement::PurchaseEntitlement`].

pub mod entitlement;
pub mod error;
pub mod execution;
pub mod geo;
pub mod lifecycle;
pub mod route;
pub mod store;
pub mod tour;
pub mod tracker;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};

/// Numeric identity of an author or tourist, as forwarded by the gateway.
pub type UserId = i64;
