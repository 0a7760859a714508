//! The routing and aggregation engine: policies, rendering, per-route
//! scheduling and dispatch.

pub mod buffer;
pub mod dispatch;
pub mod policy;
pub mod renderer;
pub mod rhai;
pub mod route;
pub mod router;
pub mod scheduler;

pub use router::{RecentEvent, RouteError, RouteFailure, Router, RouterError, RouterSettings};
