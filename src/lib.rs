pub mod config;
pub mod data;
pub mod error;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod prediction;
pub mod registry;
pub mod transform;
pub mod validation;
