use crate::{error::ModelError, registry::CommodityModel};

/// Runs preprocessor then model; the price is rounded to paise and never negative.
pub fn predict(model: &CommodityModel, features: &[f64]) -> Result<f64, ModelError> {
    let prepared = model.preprocessor.transform(features)?;
    let raw = model.model.predict(&prepared)?;
    if !raw.is_finite() {
        return Err(ModelError::NonFinite(raw));
    }
    let rounded = (raw * 100.0).round() / 100.0;
    // also folds -0.0 into 0.0
    Ok(if rounded > 0.0 { rounded } else { 0.0 })
}
