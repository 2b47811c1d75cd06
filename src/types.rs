use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::reference::CommodityProfile;

/// Raw client input; absent fields arrive as empty strings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PredictionRequest {
    #[serde(default)]
    pub commodity: String,
    #[serde(default)]
    pub district: String,
    #[serde(default)]
    pub market: String,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct PredictionResult {
    pub predicted_price: f64,
    pub commodity: String,
    pub commodity_display: String,
    pub commodity_icon: String,
    pub commodity_color: String,
    pub district: String,
    pub market: String,
    pub state: String,
    pub prediction_date: String,
    pub prediction_time: String,
    pub status: &'static str,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct CommoditySummary {
    pub id: String,
    pub name: String,
    pub color: String,
    pub icon: String,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct DistrictSummary {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct MarketSummary {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct MarketList {
    pub markets: Vec<MarketSummary>,
    pub district_name: String,
}

#[derive(Debug, Serialize, Clone)]
pub struct CommodityHealth {
    pub districts: Vec<String>,
    pub district_count: usize,
    pub config: CommodityProfile,
}

#[derive(Debug, Serialize, Clone)]
pub struct HealthReport {
    pub status: &'static str,
    pub available_commodities: Vec<String>,
    pub total_commodities: usize,
    pub commodity_info: BTreeMap<String, CommodityHealth>,
    pub total_districts_available: usize,
    pub all_districts: Vec<String>,
}
