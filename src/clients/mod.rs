//! External collaborators
//!
//! One trait per upstream service (routing, forecast, boundary lookup)
//! plus a `reqwest`-backed implementation of each. The trait seam lets
//! tests substitute a fake implementation instead of hitting the network.

pub mod openmeteo;
pub mod osrm;
pub mod overpass;

pub use openmeteo::{ForecastPoint, ForecastProvider};
pub use osrm::{RawRoute, RouteProvider, RouteStep};
pub use overpass::{BoundaryProvider, BoundaryResult};
