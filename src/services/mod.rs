//! Business logic services

pub mod auto_match;
pub mod backend;
pub mod capacity;
pub mod geo;
pub mod ordering;
pub mod planner;
pub mod route_plan;
pub mod session;
pub mod time_window;
