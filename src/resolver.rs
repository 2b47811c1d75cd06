//! Maps free-text commodity/district/market input onto reference records.
//!
//! Checks run in a fixed order and stop at the first failure: required fields,
//! commodity availability, district (exact, then fuzzy), market membership and
//! finally whether the commodity's encoder knows the district.

use crate::{
    error::PredictError,
    reference::{CommodityProfile, District, ReferenceStore},
    registry::{CommodityModel, CommodityRegistry},
};

/// Everything the feature builder and invoker need for one prediction.
#[derive(Debug)]
pub struct ResolvedRequest<'a> {
    pub profile: &'a CommodityProfile,
    pub model: &'a CommodityModel,
    pub district: &'a District,
    /// Requested market as it is echoed back to the client.
    pub market: String,
    pub district_encoded: f64,
}

/// Trimmed, lowercased text.
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Comparison key for market names: case-insensitive, spaces and underscores ignored.
pub fn market_key(text: &str) -> String {
    text.trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '_'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// `"akhada_balapur"` -> `"Akhada Balapur"`.
pub fn title_case(text: &str) -> String {
    text.trim()
        .replace('_', " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Market id as exposed to clients: lowercase with spaces as `_`.
pub fn market_id(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    reference: &'a ReferenceStore,
    registry: &'a CommodityRegistry,
}

impl<'a> Resolver<'a> {
    pub fn new(reference: &'a ReferenceStore, registry: &'a CommodityRegistry) -> Self {
        Self {
            reference,
            registry,
        }
    }

    /// Available commodity and its profile.
    pub fn commodity(
        &self,
        key: &str,
    ) -> Result<(&'a CommodityProfile, &'a CommodityModel), PredictError> {
        let unknown = || PredictError::UnknownCommodity {
            commodity: key.to_string(),
            available: self
                .registry
                .available()
                .into_iter()
                .filter(|k| self.reference.commodity(k).is_some())
                .collect(),
        };
        let model = self.registry.get(key).ok_or_else(unknown)?;
        let profile = self.reference.commodity(key).ok_or_else(unknown)?;
        Ok((profile, model))
    }

    /// Exact key lookup with fuzzy fallback.
    pub fn district(&self, text: &str) -> Result<&'a District, PredictError> {
        if let Some(d) = self.reference.lookup_district(text) {
            return Ok(d);
        }
        match self.reference.resolve_district_fuzzy(text) {
            Some(d) => {
                tracing::warn!("🔍 Using matching district '{}' for input '{}'", d.name, text);
                Ok(d)
            }
            None => Err(PredictError::UnknownDistrict {
                district: text.to_string(),
                known: self.reference.district_keys(),
            }),
        }
    }

    pub fn resolve(
        &self,
        commodity: &str,
        district: &str,
        market: &str,
    ) -> Result<ResolvedRequest<'a>, PredictError> {
        let commodity = normalize(commodity);
        let district_text = normalize(district);
        let market_text = normalize(market);

        for (field, value) in [
            ("commodity", &commodity),
            ("district", &district_text),
            ("market", &market_text),
        ] {
            if value.is_empty() {
                return Err(PredictError::Validation { field });
            }
        }

        let (profile, model) = self.commodity(&commodity)?;
        let district = self.district(&district_text)?;

        let wanted = market_key(&market_text);
        if !district.markets.iter().any(|m| market_key(m) == wanted) {
            return Err(PredictError::UnknownMarket {
                market: market_text,
                district: district.name.clone(),
                markets: district.markets.clone(),
            });
        }

        let district_encoded = model.encoder.encode(&district.name).map_err(|e| {
            tracing::error!("District encoding failed for {}: {}", commodity, e);
            PredictError::Incompatible {
                district: district.name.clone(),
                commodity: commodity.clone(),
                supported: model.districts.clone(),
            }
        })?;
        tracing::debug!(
            "🔢 District '{}' encoded as: {}",
            district.name,
            district_encoded
        );

        Ok(ResolvedRequest {
            profile,
            model,
            district,
            market: title_case(&market_text),
            district_encoded,
        })
    }
}
