//! Type definitions

pub mod messages;
pub mod planner;
pub mod route;
pub mod schedule;
pub mod stop;
pub mod vehicle;

pub use messages::*;
pub use planner::*;
pub use route::*;
pub use schedule::*;
pub use stop::*;
pub use vehicle::*;
