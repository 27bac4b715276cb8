//! Order domain model.

pub mod model;
