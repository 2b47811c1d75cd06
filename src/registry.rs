use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use crate::{
    error::ArtifactLoadError,
    model::{ArtifactLoader, Encoder, Predictor, Transformer},
    reference::CommodityProfile,
};

/// Loaded (model, preprocessor, district encoder) triple of one commodity.
pub struct CommodityModel {
    pub key: String,
    pub model: Box<dyn Predictor>,
    pub preprocessor: Box<dyn Transformer>,
    pub encoder: Box<dyn Encoder>,
    /// Districts the encoder reports; empty when it cannot be introspected.
    pub districts: Vec<String>,
}

impl CommodityModel {
    pub fn new(
        key: impl Into<String>,
        model: Box<dyn Predictor>,
        preprocessor: Box<dyn Transformer>,
        encoder: Box<dyn Encoder>,
    ) -> Self {
        let districts = encoder
            .known_categories()
            .unwrap_or_default()
            .into_iter()
            .map(|d| d.trim().to_string())
            .collect();
        Self {
            key: key.into(),
            model,
            preprocessor,
            encoder,
            districts,
        }
    }
}

impl std::fmt::Debug for CommodityModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommodityModel")
            .field("key", &self.key)
            .field("districts", &self.districts)
            .finish_non_exhaustive()
    }
}

/// Artifact locations of one commodity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSet {
    pub model: PathBuf,
    pub preprocessor: PathBuf,
    pub district_encoder: PathBuf,
}

impl ArtifactSet {
    /// `<dir>/<key>_model.json` etc., unless the profile overrides a path.
    pub fn for_profile(models_dir: &Path, profile: &CommodityProfile) -> Self {
        let pick = |over: &Option<PathBuf>, suffix: &str| match over {
            Some(p) if p.is_absolute() => p.clone(),
            Some(p) => models_dir.join(p),
            None => models_dir.join(format!("{}_{}.json", profile.key, suffix)),
        };
        Self {
            model: pick(&profile.artifacts.model, "model"),
            preprocessor: pick(&profile.artifacts.preprocessor, "preprocessor"),
            district_encoder: pick(&profile.artifacts.district_encoder, "district_encoder"),
        }
    }

    fn entries(&self) -> [(&'static str, &Path); 3] {
        [
            ("model", self.model.as_path()),
            ("preprocessor", self.preprocessor.as_path()),
            ("district_encoder", self.district_encoder.as_path()),
        ]
    }
}

/// Commodities whose artifacts loaded completely, in catalogue order.
///
/// Built once before serving; lookups afterwards are read-only.
#[derive(Debug, Default)]
pub struct CommodityRegistry {
    models: Vec<CommodityModel>,
    index: HashMap<String, usize>,
}

impl CommodityRegistry {
    /// Attempts every profile in order. Failures are logged and the commodity skipped.
    pub fn load(
        profiles: &[CommodityProfile],
        models_dir: &Path,
        loader: &dyn ArtifactLoader,
    ) -> Self {
        tracing::info!("🚀 Loading commodity models from {}", models_dir.display());

        let mut registry = Self::default();
        for profile in profiles {
            tracing::info!("🔍 Attempting to load {}...", profile.key);
            let files = ArtifactSet::for_profile(models_dir, profile);
            match load_one(&profile.key, &files, loader) {
                Ok(model) => {
                    if model.districts.is_empty() {
                        tracing::info!("✅ {} loaded (no district classes info)", profile.key);
                    } else {
                        tracing::info!(
                            "✅ {} loaded with {} districts",
                            profile.key,
                            model.districts.len()
                        );
                    }
                    registry.insert(model);
                }
                Err(e @ ArtifactLoadError::Missing { .. }) => tracing::warn!("❌ {}", e),
                Err(e) => tracing::error!("❌ {}", e),
            }
        }

        tracing::info!("🌾 Available commodities: {:?}", registry.available());
        registry
    }

    /// Registry over already-built models, keeping the given order.
    pub fn from_models(models: impl IntoIterator<Item = CommodityModel>) -> Self {
        let mut registry = Self::default();
        for m in models {
            registry.insert(m);
        }
        registry
    }

    fn insert(&mut self, model: CommodityModel) {
        let key = model.key.to_lowercase();
        match self.index.get(&key) {
            Some(&i) => self.models[i] = model,
            None => {
                self.index.insert(key, self.models.len());
                self.models.push(model);
            }
        }
    }

    pub fn is_available(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&CommodityModel> {
        self.index.get(key).map(|&i| &self.models[i])
    }

    /// Encoder classes of the commodity; empty for unknown keys too.
    pub fn supported_districts(&self, key: &str) -> &[String] {
        self.get(key).map(|m| m.districts.as_slice()).unwrap_or(&[])
    }

    pub fn available(&self) -> Vec<String> {
        self.models.iter().map(|m| m.key.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

fn load_one(
    key: &str,
    files: &ArtifactSet,
    loader: &dyn ArtifactLoader,
) -> Result<CommodityModel, ArtifactLoadError> {
    let missing: Vec<String> = files
        .entries()
        .iter()
        .filter(|(_, path)| !path.exists())
        .map(|(kind, path)| format!("{}: {}", kind, path.display()))
        .collect();
    if !missing.is_empty() {
        return Err(ArtifactLoadError::Missing {
            commodity: key.to_string(),
            missing,
        });
    }

    let unreadable = |artifact: &'static str| {
        move |source: anyhow::Error| ArtifactLoadError::Unreadable {
            commodity: key.to_string(),
            artifact,
            source,
        }
    };

    let model = loader
        .load_predictor(&files.model)
        .map_err(unreadable("model"))?;
    let preprocessor = loader
        .load_transformer(&files.preprocessor)
        .map_err(unreadable("preprocessor"))?;
    let encoder = loader
        .load_encoder(&files.district_encoder)
        .map_err(unreadable("district_encoder"))?;

    Ok(CommodityModel::new(key, model, preprocessor, encoder))
}
