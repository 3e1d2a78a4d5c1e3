pub mod cli;
pub mod config;
pub mod model;
pub mod resolver;

mod api;

pub use api::{BuildPlanner, BuildPlannerBuilder};
pub use resolver::{resolve, ResolutionError, Resolver};
