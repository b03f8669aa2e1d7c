//! Application services: blog resolution, merged post queries and archive rendering.

pub mod ambient;
pub mod blogs;
pub mod context;
pub mod error;
pub mod plan;
pub mod posts;
pub mod query;
pub mod render;
pub mod repos;
pub mod transients;
