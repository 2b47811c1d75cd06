use anyhow::{bail, Result};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::config::{ArtifactPaths, ReferenceDoc};

#[derive(Debug, Clone, Serialize)]
pub struct District {
    pub key: String,
    pub name: String,
    pub district_id: i64,
    pub market_id: i64,
    pub markets: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommodityProfile {
    pub key: String,
    pub name: String,
    pub display_name: String,
    pub icon: String,
    pub color: String,
    pub default_p_min: f64,
    pub default_p_max: f64,
    #[serde(skip)]
    pub artifacts: ArtifactPaths,
}

#[derive(Debug, Clone, Serialize)]
pub struct State {
    pub id: i64,
    pub name: String,
}

/// Immutable district/market table and commodity catalogue.
///
/// Iteration always follows the order of the source document; fuzzy matching
/// relies on it as its tie-break.
#[derive(Debug)]
pub struct ReferenceStore {
    state: State,
    districts: Vec<District>,
    district_index: HashMap<String, usize>,
    commodities: Vec<CommodityProfile>,
    commodity_index: HashMap<String, usize>,
}

impl ReferenceStore {
    /// Validates the document and builds the lookup indexes.
    pub fn from_doc(doc: ReferenceDoc) -> Result<Self> {
        let mut districts = Vec::with_capacity(doc.districts.len());
        let mut district_index = HashMap::new();
        let mut district_ids = HashSet::new();
        let mut market_ids = HashSet::new();

        for d in doc.districts {
            let key = d.key.trim().to_lowercase();
            if key.is_empty() {
                bail!("district '{}' has an empty key", d.name);
            }
            if district_index.contains_key(&key) {
                bail!("duplicate district key '{}'", key);
            }
            if !district_ids.insert(d.district_id) {
                bail!("duplicate district id {} ({})", d.district_id, key);
            }
            if !market_ids.insert(d.market_id) {
                bail!("duplicate market id {} ({})", d.market_id, key);
            }
            if d.markets.is_empty() {
                bail!("district '{}' lists no markets", key);
            }
            district_index.insert(key.clone(), districts.len());
            districts.push(District {
                key,
                name: d.name.trim().to_string(),
                district_id: d.district_id,
                market_id: d.market_id,
                markets: d.markets,
            });
        }

        let mut commodities = Vec::with_capacity(doc.commodities.len());
        let mut commodity_index = HashMap::new();
        for c in doc.commodities {
            let key = c.key.trim().to_lowercase();
            if key.is_empty() {
                bail!("commodity '{}' has an empty key", c.name);
            }
            if commodity_index.contains_key(&key) {
                bail!("duplicate commodity key '{}'", key);
            }
            if !(c.default_p_min < c.default_p_max) {
                bail!(
                    "commodity '{}' has an invalid price band: min {} must be below max {}",
                    key,
                    c.default_p_min,
                    c.default_p_max
                );
            }
            commodity_index.insert(key.clone(), commodities.len());
            commodities.push(CommodityProfile {
                key,
                name: c.name,
                display_name: c.display_name,
                icon: c.icon,
                color: c.color,
                default_p_min: c.default_p_min,
                default_p_max: c.default_p_max,
                artifacts: c.artifacts,
            });
        }

        Ok(Self {
            state: State {
                id: doc.state.id,
                name: doc.state.name,
            },
            districts,
            district_index,
            commodities,
            commodity_index,
        })
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn districts(&self) -> &[District] {
        &self.districts
    }

    pub fn commodities(&self) -> &[CommodityProfile] {
        &self.commodities
    }

    pub fn district_keys(&self) -> Vec<String> {
        self.districts.iter().map(|d| d.key.clone()).collect()
    }

    pub fn commodity(&self, key: &str) -> Option<&CommodityProfile> {
        self.commodity_index.get(key).map(|&i| &self.commodities[i])
    }

    /// Exact lookup by lowercase key.
    pub fn lookup_district(&self, key: &str) -> Option<&District> {
        self.district_index.get(key).map(|&i| &self.districts[i])
    }

    /// Exact lookup, falling back to the first district (in document order) where the
    /// text is part of the canonical name, the canonical name is part of the text, or
    /// the text is part of the key.
    pub fn resolve_district_fuzzy(&self, text: &str) -> Option<&District> {
        let needle = text.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }
        if let Some(d) = self.lookup_district(&needle) {
            return Some(d);
        }
        self.districts.iter().find(|d| {
            let name = d.name.to_lowercase();
            name.contains(&needle) || needle.contains(&name) || d.key.contains(&needle)
        })
    }

    /// Finds a district by canonical display name, ignoring case and padding.
    pub fn district_by_name(&self, name: &str) -> Option<&District> {
        let wanted = name.trim().to_lowercase();
        self.districts
            .iter()
            .find(|d| d.name.to_lowercase() == wanted)
    }
}
