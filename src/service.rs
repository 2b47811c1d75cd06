use std::collections::BTreeMap;

use crate::{
    error::PredictError,
    features::{Clock, FeatureBuilder, FEATURE_NAMES},
    invoker,
    reference::ReferenceStore,
    registry::CommodityRegistry,
    resolver::{self, Resolver},
    types::{
        CommodityHealth, CommoditySummary, DistrictSummary, HealthReport, MarketList,
        MarketSummary, PredictionResult,
    },
};

/// Read-only prediction pipeline shared by every request handler.
pub struct PredictionService {
    reference: ReferenceStore,
    registry: CommodityRegistry,
    clock: Box<dyn Clock>,
}

impl PredictionService {
    pub fn new(
        reference: ReferenceStore,
        registry: CommodityRegistry,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            reference,
            registry,
            clock,
        }
    }

    pub fn reference(&self) -> &ReferenceStore {
        &self.reference
    }

    pub fn registry(&self) -> &CommodityRegistry {
        &self.registry
    }

    fn resolver(&self) -> Resolver<'_> {
        Resolver::new(&self.reference, &self.registry)
    }

    pub fn list_commodities(&self) -> Vec<CommoditySummary> {
        self.registry
            .available()
            .into_iter()
            .filter_map(|key| {
                let p = self.reference.commodity(&key)?;
                Some(CommoditySummary {
                    id: key,
                    name: p.display_name.clone(),
                    color: p.color.clone(),
                    icon: p.icon.clone(),
                })
            })
            .collect()
    }

    /// Districts the commodity's encoder was trained on, mapped onto reference keys.
    ///
    /// Classes without a reference entry are listed under a synthesized id, unless
    /// that id would resolve to some other reference district on prediction.
    pub fn list_districts(&self, commodity: &str) -> Result<Vec<DistrictSummary>, PredictError> {
        let key = resolver::normalize(commodity);
        let (_, model) = self.resolver().commodity(&key)?;

        let mut districts: Vec<DistrictSummary> = Vec::with_capacity(model.districts.len());
        for name in &model.districts {
            let summary = match self.reference.district_by_name(name) {
                Some(d) => DistrictSummary {
                    id: d.key.clone(),
                    name: d.name.clone(),
                },
                None => {
                    let id = name.trim().to_lowercase().replace(' ', "_");
                    if let Some(d) = self.reference.resolve_district_fuzzy(&id) {
                        tracing::debug!("skipping class '{}': would resolve to {}", name, d.name);
                        continue;
                    }
                    DistrictSummary {
                        id,
                        name: name.trim().to_string(),
                    }
                }
            };
            if !districts.iter().any(|d| d.id == summary.id) {
                districts.push(summary);
            }
        }

        tracing::info!("📋 Returning {} districts for {}", districts.len(), key);
        Ok(districts)
    }

    pub fn list_markets(&self, district: &str) -> Result<MarketList, PredictError> {
        let text = resolver::normalize(district);
        if text.is_empty() {
            return Err(PredictError::Validation { field: "district" });
        }
        let d = self.resolver().district(&text)?;
        let markets: Vec<MarketSummary> = d
            .markets
            .iter()
            .map(|m| MarketSummary {
                id: resolver::market_id(m),
                name: m.clone(),
            })
            .collect();

        tracing::info!("🏪 Returning {} markets for {}", markets.len(), d.name);
        Ok(MarketList {
            markets,
            district_name: d.name.clone(),
        })
    }

    pub fn predict(
        &self,
        commodity: &str,
        district: &str,
        market: &str,
    ) -> Result<PredictionResult, PredictError> {
        tracing::info!(
            "🎯 Prediction request for: {}, district: {}, market: {}",
            commodity,
            district,
            market
        );

        let resolved = self.resolver().resolve(commodity, district, market)?;
        let now = self.clock.now();
        let features = FeatureBuilder::new(self.reference.state().id).build(&resolved, now);
        tracing::debug!(
            "features {:?}",
            FEATURE_NAMES.iter().zip(features.iter()).collect::<Vec<_>>()
        );

        let price = invoker::predict(resolved.model, &features).map_err(|e| {
            tracing::error!("❌ Prediction error for {}: {}", resolved.profile.key, e);
            PredictError::Prediction(e)
        })?;

        tracing::info!(
            "✅ Prediction successful: ₹{} for {} in {}",
            price,
            resolved.profile.key,
            resolved.district.name
        );

        Ok(PredictionResult {
            predicted_price: price,
            commodity: resolved.profile.name.clone(),
            commodity_display: resolved.profile.display_name.clone(),
            commodity_icon: resolved.profile.icon.clone(),
            commodity_color: resolved.profile.color.clone(),
            district: resolved.district.name.clone(),
            market: resolved.market,
            state: self.reference.state().name.clone(),
            prediction_date: now.format("%Y-%m-%d").to_string(),
            prediction_time: now.format("%H:%M:%S").to_string(),
            status: "success",
        })
    }

    pub fn health(&self) -> HealthReport {
        let available = self.registry.available();
        let commodity_info: BTreeMap<String, CommodityHealth> = available
            .iter()
            .filter_map(|key| {
                let config = self.reference.commodity(key)?.clone();
                let districts = self.registry.supported_districts(key).to_vec();
                Some((
                    key.clone(),
                    CommodityHealth {
                        district_count: districts.len(),
                        districts,
                        config,
                    },
                ))
            })
            .collect();

        HealthReport {
            status: "healthy",
            total_commodities: self.registry.len(),
            available_commodities: available,
            commodity_info,
            total_districts_available: self.reference.districts().len(),
            all_districts: self.reference.district_keys(),
        }
    }
}
