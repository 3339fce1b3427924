//! Kidroute worker - route capacity and assignment engine
//!
//! Dispatchers build draft routes for a day's unassigned children's transport
//! schedules. The engine checks seat and wheelchair capacity plus pickup
//! before dropoff ordering on every change, scores existing routes for
//! auto-match suggestions and persists finished plans through the backend.

pub mod config;
pub mod defaults;
pub mod error;
pub mod handlers;
pub mod services;
pub mod types;
