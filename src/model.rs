use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::{collections::HashMap, fs, path::Path};

use crate::error::ModelError;

// ---------- Capabilities ----------

/// Maps a categorical value (a district name) to the number the model was trained on.
pub trait Encoder: Send + Sync {
    fn encode(&self, name: &str) -> Result<f64, ModelError>;

    /// Categories the encoder was fitted on, when the artifact exposes them.
    fn known_categories(&self) -> Option<Vec<String>>;
}

/// Turns a raw feature row into the model's input space.
pub trait Transformer: Send + Sync {
    fn transform(&self, features: &[f64]) -> Result<Vec<f64>, ModelError>;
}

/// Produces a single price estimate from a transformed feature row.
pub trait Predictor: Send + Sync {
    fn predict(&self, features: &[f64]) -> Result<f64, ModelError>;
}

/// Source of deserialized capabilities; one call per artifact at startup.
pub trait ArtifactLoader {
    fn load_encoder(&self, path: &Path) -> Result<Box<dyn Encoder>>;
    fn load_transformer(&self, path: &Path) -> Result<Box<dyn Transformer>>;
    fn load_predictor(&self, path: &Path) -> Result<Box<dyn Predictor>>;
}

// ---------- JSON artifacts ----------

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EncoderArtifact {
    /// Index of the name within `classes`.
    Label { classes: Vec<String> },
    /// Explicit name -> code table without class introspection.
    Ordinal { mapping: HashMap<String, f64> },
}

impl EncoderArtifact {
    fn normalized(self) -> Self {
        match self {
            EncoderArtifact::Label { classes } => EncoderArtifact::Label {
                classes: classes.into_iter().map(|c| c.trim().to_string()).collect(),
            },
            EncoderArtifact::Ordinal { mapping } => EncoderArtifact::Ordinal {
                mapping: mapping
                    .into_iter()
                    .map(|(k, v)| (k.trim().to_string(), v))
                    .collect(),
            },
        }
    }
}

impl Encoder for EncoderArtifact {
    fn encode(&self, name: &str) -> Result<f64, ModelError> {
        let name = name.trim();
        let folded = name.to_lowercase();
        let same = |class: &str| class.trim().to_lowercase() == folded;
        // exact spelling wins over a case-folded match
        let code = match self {
            EncoderArtifact::Label { classes } => classes
                .iter()
                .position(|c| c == name)
                .or_else(|| classes.iter().position(|c| same(c.as_str())))
                .map(|i| i as f64),
            EncoderArtifact::Ordinal { mapping } => mapping.get(name).copied().or_else(|| {
                mapping
                    .iter()
                    .find(|(k, _)| same(k.as_str()))
                    .map(|(_, v)| *v)
            }),
        };
        code.ok_or_else(|| ModelError::UnknownCategory(name.to_string()))
    }

    fn known_categories(&self) -> Option<Vec<String>> {
        match self {
            EncoderArtifact::Label { classes } => Some(classes.clone()),
            EncoderArtifact::Ordinal { .. } => None,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransformerArtifact {
    Passthrough,
    StandardScaler { mean: Vec<f64>, scale: Vec<f64> },
}

impl TransformerArtifact {
    fn validate(&self) -> Result<()> {
        if let TransformerArtifact::StandardScaler { mean, scale } = self {
            if mean.len() != scale.len() {
                bail!(
                    "standard_scaler mean has {} entries but scale has {}",
                    mean.len(),
                    scale.len()
                );
            }
        }
        Ok(())
    }
}

impl Transformer for TransformerArtifact {
    fn transform(&self, features: &[f64]) -> Result<Vec<f64>, ModelError> {
        match self {
            TransformerArtifact::Passthrough => Ok(features.to_vec()),
            TransformerArtifact::StandardScaler { mean, scale } => {
                if features.len() != mean.len() {
                    return Err(ModelError::DimensionMismatch {
                        got: features.len(),
                        expected: mean.len(),
                    });
                }
                Ok(features
                    .iter()
                    .zip(mean.iter().zip(scale))
                    .map(|(x, (m, s))| {
                        let s = if *s == 0.0 { 1.0 } else { *s };
                        (x - m) / s
                    })
                    .collect())
            }
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PredictorArtifact {
    Linear { coefficients: Vec<f64>, intercept: f64 },
}

impl Predictor for PredictorArtifact {
    fn predict(&self, features: &[f64]) -> Result<f64, ModelError> {
        match self {
            PredictorArtifact::Linear {
                coefficients,
                intercept,
            } => {
                if features.len() != coefficients.len() {
                    return Err(ModelError::DimensionMismatch {
                        got: features.len(),
                        expected: coefficients.len(),
                    });
                }
                Ok(intercept
                    + features
                        .iter()
                        .zip(coefficients)
                        .map(|(x, w)| x * w)
                        .sum::<f64>())
            }
        }
    }
}

// ---------- Loader ----------

/// Reads artifacts from disk, choosing the format by file extension.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileArtifactLoader;

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => {}
        other => bail!(
            "unsupported artifact format {:?} at {}",
            other.unwrap_or(""),
            path.display()
        ),
    }
    let txt = fs::read_to_string(path)
        .with_context(|| format!("failed to read artifact at {}", path.display()))?;
    serde_json::from_str(&txt).with_context(|| format!("failed to parse {}", path.display()))
}

impl ArtifactLoader for FileArtifactLoader {
    fn load_encoder(&self, path: &Path) -> Result<Box<dyn Encoder>> {
        let enc: EncoderArtifact = read_json(path)?;
        Ok(Box::new(enc.normalized()))
    }

    fn load_transformer(&self, path: &Path) -> Result<Box<dyn Transformer>> {
        let t: TransformerArtifact = read_json(path)?;
        t.validate()
            .with_context(|| format!("invalid preprocessor {}", path.display()))?;
        Ok(Box::new(t))
    }

    fn load_predictor(&self, path: &Path) -> Result<Box<dyn Predictor>> {
        if path.extension().and_then(|e| e.to_str()) == Some("pt") {
            return load_torchscript(path);
        }
        let p: PredictorArtifact = read_json(path)?;
        Ok(Box::new(p))
    }
}

#[cfg(feature = "torch")]
fn load_torchscript(path: &Path) -> Result<Box<dyn Predictor>> {
    Ok(Box::new(torch::TorchPredictor::load(path)?))
}

#[cfg(not(feature = "torch"))]
fn load_torchscript(path: &Path) -> Result<Box<dyn Predictor>> {
    bail!(
        "TorchScript model {} needs the `torch` feature",
        path.display()
    )
}

// ---------- TorchScript ----------

#[cfg(feature = "torch")]
pub mod torch {
    use super::Predictor;
    use crate::error::ModelError;
    use anyhow::{Context, Result};
    use std::path::Path;
    use tch::{kind::Kind, CModule, Device, Tensor};

    /// TorchScript regression module evaluated on CPU.
    pub struct TorchPredictor {
        model: CModule,
        device: Device,
    }

    impl TorchPredictor {
        pub fn load(path: &Path) -> Result<Self> {
            let device = Device::Cpu;
            let model = CModule::load_on_device(path, device)
                .with_context(|| format!("failed to load TorchScript {}", path.display()))?;
            Ok(Self { model, device })
        }
    }

    impl Predictor for TorchPredictor {
        fn predict(&self, features: &[f64]) -> Result<f64, ModelError> {
            let row: Vec<f32> = features.iter().map(|x| *x as f32).collect();
            let input = Tensor::from_slice(&row)
                .reshape([1, row.len() as i64])
                .to_device(self.device);

            let out = self
                .model
                .forward_ts(&[input])
                .map_err(|e| ModelError::Backend(e.to_string()))?
                .to_kind(Kind::Double)
                .flatten(0, -1);
            if out.numel() == 0 {
                return Err(ModelError::EmptyOutput);
            }
            Ok(out.double_value(&[0]))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_encoder_uses_class_position() {
        let enc = EncoderArtifact::Label {
            classes: vec![" Akola ".into(), "Nashik".into()],
        }
        .normalized();
        assert_eq!(enc.encode("Nashik").unwrap(), 1.0);
        assert_eq!(enc.encode("Akola").unwrap(), 0.0);
        assert!(matches!(
            enc.encode("Pune"),
            Err(ModelError::UnknownCategory(name)) if name == "Pune"
        ));
        assert_eq!(
            enc.known_categories(),
            Some(vec!["Akola".to_string(), "Nashik".to_string()])
        );
    }

    #[test]
    fn encoders_ignore_case_of_the_district_name() {
        let label = EncoderArtifact::Label {
            classes: vec!["nashik".into(), "Nagpur".into(), "NAGPUR".into()],
        };
        assert_eq!(label.encode("Nashik").unwrap(), 0.0);
        assert_eq!(label.encode("NAGPUR").unwrap(), 2.0);
        assert_eq!(label.encode(" nagpur ").unwrap(), 1.0);

        let ordinal = EncoderArtifact::Ordinal {
            mapping: [("amravati ".to_string(), 4.0)].into_iter().collect(),
        };
        assert_eq!(ordinal.encode("Amravati").unwrap(), 4.0);
        assert!(ordinal.encode("Akola").is_err());
    }

    #[test]
    fn ordinal_encoder_hides_its_categories() {
        let enc: EncoderArtifact =
            serde_json::from_str(r#"{"kind":"ordinal","mapping":{"Pune":7}}"#).unwrap();
        assert_eq!(enc.encode("Pune").unwrap(), 7.0);
        assert!(enc.known_categories().is_none());
    }

    #[test]
    fn standard_scaler_centres_and_scales() {
        let t = TransformerArtifact::StandardScaler {
            mean: vec![1.0, 10.0],
            scale: vec![2.0, 0.0],
        };
        assert_eq!(t.transform(&[3.0, 12.0]).unwrap(), vec![1.0, 2.0]);
        assert!(matches!(
            t.transform(&[1.0]),
            Err(ModelError::DimensionMismatch { got: 1, expected: 2 })
        ));
    }

    #[test]
    fn linear_model_is_a_dot_product_plus_intercept() {
        let m = PredictorArtifact::Linear {
            coefficients: vec![2.0, -1.0],
            intercept: 0.5,
        };
        assert_eq!(m.predict(&[3.0, 4.0]).unwrap(), 2.5);
        assert!(m.predict(&[3.0]).is_err());
    }

    #[test]
    fn loader_rejects_unknown_extensions_and_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let pkl = dir.path().join("wheat_model.pkl");
        fs::write(&pkl, b"\x80\x04").unwrap();
        let err = FileArtifactLoader.load_predictor(&pkl).err().unwrap();
        assert!(err.to_string().contains("unsupported artifact format"));

        let bad = dir.path().join("wheat_preprocessor.json");
        fs::write(&bad, r#"{"kind":"standard_scaler","mean":[1.0],"scale":[]}"#).unwrap();
        assert!(FileArtifactLoader.load_transformer(&bad).is_err());
    }
}
