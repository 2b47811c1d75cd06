//! Commodity price prediction: resolves free-text commodity/district/market
//! input against static reference data and runs the commodity's model.

pub mod api;
pub mod config;
pub mod error;
pub mod features;
pub mod invoker;
pub mod model;
pub mod reference;
pub mod registry;
pub mod resolver;
pub mod service;
pub mod types;

pub use error::{ArtifactLoadError, ErrorKind, ModelError, PredictError};
pub use service::PredictionService;
