use anyhow::{Context, Result};
use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
};

const BUILTIN_REFERENCE: &str = include_str!("../data/reference.json");

/// Process settings read from the environment at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub models_dir: PathBuf,
    pub reference_path: Option<PathBuf>,
    pub cors_origin: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        fn env_or(key: &str, default: &str) -> String {
            env::var(key).unwrap_or_else(|_| default.to_string())
        }

        Self {
            bind_addr: env_or("BIND_ADDR", "127.0.0.1:5000"),
            models_dir: PathBuf::from(env_or("MODELS_DIR", "./models")),
            reference_path: env::var("REFERENCE_PATH")
                .ok()
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            cors_origin: env_or("CORS_ORIGIN", "http://localhost:3000"),
        }
    }

    /// Reads the reference document named by `REFERENCE_PATH`, or the built-in one.
    pub fn reference_doc(&self) -> Result<ReferenceDoc> {
        match &self.reference_path {
            Some(path) => ReferenceDoc::load(path),
            None => ReferenceDoc::builtin(),
        }
    }
}

// ---------- Reference document ----------

#[derive(Deserialize, Debug, Clone)]
pub struct StateDoc {
    pub id: i64,
    pub name: String,
}

/// Optional per-commodity artifact file overrides.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct ArtifactPaths {
    pub model: Option<PathBuf>,
    pub preprocessor: Option<PathBuf>,
    pub district_encoder: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct CommodityDoc {
    pub key: String,
    pub name: String,
    pub display_name: String,
    pub icon: String,
    pub color: String,
    pub default_p_min: f64,
    pub default_p_max: f64,
    #[serde(default)]
    pub artifacts: ArtifactPaths,
}

#[derive(Deserialize, Debug, Clone)]
pub struct DistrictDoc {
    pub key: String,
    pub name: String,
    pub district_id: i64,
    pub market_id: i64,
    pub markets: Vec<String>,
}

/// Static reference data: the single state, the commodity catalogue and the
/// district/market table, each in the order the file lists them.
#[derive(Deserialize, Debug, Clone)]
pub struct ReferenceDoc {
    pub state: StateDoc,
    pub commodities: Vec<CommodityDoc>,
    pub districts: Vec<DistrictDoc>,
}

impl ReferenceDoc {
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read reference data at {}", path.display()))?;
        serde_json::from_str(&data)
            .with_context(|| format!("invalid reference data JSON in {}", path.display()))
    }

    pub fn builtin() -> Result<Self> {
        serde_json::from_str(BUILTIN_REFERENCE).context("invalid built-in reference data")
    }
}
