use thiserror::Error;

/// Failure raised by an encoder, preprocessor or model while serving a request.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("unknown category '{0}'")]
    UnknownCategory(String),
    #[error("feature length mismatch: got {got}, expected {expected}")]
    DimensionMismatch { got: usize, expected: usize },
    #[error("model produced a non-finite value ({0})")]
    NonFinite(f64),
    #[error("model produced no output")]
    EmptyOutput,
    #[error("{0}")]
    Backend(String),
}

/// Request-time errors of the resolution and inference pipeline.
///
/// Every "not found" variant carries the options a client could have picked instead.
#[derive(Debug, Error)]
pub enum PredictError {
    #[error("{} is required", capitalize(.field))]
    Validation { field: &'static str },

    #[error("Commodity '{commodity}' not available. Available: {}", join(.available))]
    UnknownCommodity {
        commodity: String,
        available: Vec<String>,
    },

    #[error("District '{district}' not found. Available districts: {}", join(.known))]
    UnknownDistrict { district: String, known: Vec<String> },

    #[error("Market '{market}' not found in {district}. Available markets: {}", join(.markets))]
    UnknownMarket {
        market: String,
        district: String,
        markets: Vec<String>,
    },

    #[error("District '{district}' not available for {commodity}. Available districts: {}", join(.supported))]
    Incompatible {
        district: String,
        commodity: String,
        supported: Vec<String>,
    },

    #[error("Prediction failed: {0}")]
    Prediction(#[source] ModelError),
}

/// Coarse error category reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Incompatible,
    Prediction,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Incompatible => "incompatible",
            ErrorKind::Prediction => "prediction",
        }
    }
}

impl PredictError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PredictError::Validation { .. } => ErrorKind::Validation,
            PredictError::UnknownCommodity { .. }
            | PredictError::UnknownDistrict { .. }
            | PredictError::UnknownMarket { .. } => ErrorKind::NotFound,
            PredictError::Incompatible { .. } => ErrorKind::Incompatible,
            PredictError::Prediction(_) => ErrorKind::Prediction,
        }
    }

    /// Valid alternatives for the rejected input, empty when none apply.
    pub fn options(&self) -> &[String] {
        match self {
            PredictError::UnknownCommodity { available, .. } => available,
            PredictError::UnknownDistrict { known, .. } => known,
            PredictError::UnknownMarket { markets, .. } => markets,
            PredictError::Incompatible { supported, .. } => supported,
            PredictError::Validation { .. } | PredictError::Prediction(_) => &[],
        }
    }
}

/// Why a commodity was left out of the registry at startup.
#[derive(Debug, Error)]
pub enum ArtifactLoadError {
    #[error("missing files for {commodity}: {}", join(.missing))]
    Missing {
        commodity: String,
        missing: Vec<String>,
    },
    #[error("error loading {artifact} for {commodity}: {source:#}")]
    Unreadable {
        commodity: String,
        artifact: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

fn join(items: &[String]) -> String {
    items.join(", ")
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
