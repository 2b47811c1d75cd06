/// Integration tests for the prediction pipeline
///
/// Run with: cargo test --test pipeline_tests -- --nocapture

use chrono::{NaiveDate, NaiveDateTime};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use mandi_predictor::{
    config::ReferenceDoc,
    features::{FixedClock, FEATURE_COUNT},
    model::{Encoder, EncoderArtifact, Predictor, Transformer, TransformerArtifact},
    reference::ReferenceStore,
    registry::{CommodityModel, CommodityRegistry},
    ErrorKind, ModelError, PredictError, PredictionService,
};

/// Sums the features it sees and counts calls.
struct CountingModel {
    calls: Arc<AtomicUsize>,
    offset: f64,
}

impl Predictor for CountingModel {
    fn predict(&self, features: &[f64]) -> Result<f64, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(features.len(), FEATURE_COUNT, "model fed a malformed row");
        Ok(features.iter().sum::<f64>() / 10.0 + self.offset)
    }
}

struct CountingPreprocessor {
    calls: Arc<AtomicUsize>,
}

impl Transformer for CountingPreprocessor {
    fn transform(&self, features: &[f64]) -> Result<Vec<f64>, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(features.to_vec())
    }
}

struct FailingModel;

impl Predictor for FailingModel {
    fn predict(&self, _: &[f64]) -> Result<f64, ModelError> {
        Err(ModelError::Backend("tensor shape [1, 9] rejected".into()))
    }
}

struct Harness {
    service: PredictionService,
    model_calls: Arc<AtomicUsize>,
    preprocessor_calls: Arc<AtomicUsize>,
}

fn clock() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 11, 3)
        .unwrap()
        .and_hms_opt(9, 15, 42)
        .unwrap()
}

fn label(classes: &[&str]) -> Box<dyn Encoder> {
    Box::new(EncoderArtifact::Label {
        classes: classes.iter().map(|c| c.to_string()).collect(),
    })
}

fn harness() -> Harness {
    let reference = ReferenceStore::from_doc(ReferenceDoc::builtin().unwrap()).unwrap();
    let model_calls = Arc::new(AtomicUsize::new(0));
    let preprocessor_calls = Arc::new(AtomicUsize::new(0));

    let counting = |key: &str, offset: f64, encoder: Box<dyn Encoder>| {
        CommodityModel::new(
            key,
            Box::new(CountingModel {
                calls: model_calls.clone(),
                offset,
            }),
            Box::new(CountingPreprocessor {
                calls: preprocessor_calls.clone(),
            }),
            encoder,
        )
    };

    let registry = CommodityRegistry::from_models([
        counting(
            "wheat",
            0.0,
            label(&["Ahmadnagar", "Nagpur", "Nashik", "Pune"]),
        ),
        // an encoder without class introspection
        counting(
            "orange",
            0.0,
            Box::new(EncoderArtifact::Ordinal {
                mapping: [("Nagpur".to_string(), 0.0), ("Amravati".to_string(), 1.0)]
                    .into_iter()
                    .collect(),
            }),
        ),
        // large negative offset: the raw output is always below zero
        counting("grapes", -1.0e6, label(&["Nashik", "Solapur"])),
        CommodityModel::new(
            "rice",
            Box::new(FailingModel),
            Box::new(TransformerArtifact::Passthrough),
            label(&["Thane"]),
        ),
    ]);

    Harness {
        service: PredictionService::new(reference, registry, Box::new(FixedClock(clock()))),
        model_calls,
        preprocessor_calls,
    }
}

#[test]
fn test_wheat_in_nashik_succeeds() {
    let h = harness();
    let result = h.service.predict("wheat", "nashik", "nashik").unwrap();

    assert_eq!(result.status, "success");
    assert_eq!(result.district, "Nashik");
    assert_eq!(result.market, "Nashik");
    assert_eq!(result.state, "Maharashtra");
    assert_eq!(result.commodity, "Wheat");
    assert_eq!(result.commodity_display, "🌾 Wheat");
    assert_eq!(result.prediction_date, "2024-11-03");
    assert_eq!(result.prediction_time, "09:15:42");
    assert!(result.predicted_price >= 0.0);

    // market 1107, state 27, district 507, band 2000..2800, date 2024-11-03, encoded 2
    let expected = (1107.0 + 27.0 + 507.0 + 2000.0 + 2800.0 + 2024.0 + 11.0 + 3.0 + 2.0) / 10.0;
    assert_eq!(result.predicted_price, (expected * 100.0_f64).round() / 100.0);
    println!("✓ wheat/nashik predicted ₹{}", result.predicted_price);
}

#[test]
fn test_unknown_commodity_never_reaches_the_model() {
    let h = harness();
    let err = h
        .service
        .predict("unknown_grain", "nashik", "nashik")
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.options().to_vec(), vec!["wheat", "orange", "grapes", "rice"]);
    assert_eq!(h.model_calls.load(Ordering::SeqCst), 0, "model was invoked");
    assert_eq!(h.preprocessor_calls.load(Ordering::SeqCst), 0, "preprocessor was invoked");
}

#[test]
fn test_every_rejected_request_skips_inference() {
    let h = harness();
    let rejected = [
        ("", "pune", "pune"),
        ("wheat", "", "pune"),
        ("wheat", "pune", ""),
        ("cotton", "pune", "pune"),
        ("wheat", "mumbai", "mumbai"),
        ("wheat", "pune", "mumbai"),
        ("orange", "pune", "pune"),
    ];
    for (c, d, m) in rejected {
        assert!(h.service.predict(c, d, m).is_err(), "{c}/{d}/{m} should fail");
    }
    assert_eq!(h.model_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_market_outside_district_lists_district_markets() {
    let h = harness();
    let err = h.service.predict("wheat", "pune", "mumbai").unwrap_err();
    match &err {
        PredictError::UnknownMarket { markets, .. } => {
            assert_eq!(markets, &vec!["Pune".to_string(), "Baramati".to_string()]);
        }
        other => panic!("expected UnknownMarket, got {other:?}"),
    }
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_district_typo_resolves_through_fuzzy_match() {
    let h = harness();
    let result = h.service.predict("wheat", "nagpu", "umred").unwrap();
    assert_eq!(result.district, "Nagpur");
    assert_eq!(result.market, "Umred");
}

#[test]
fn test_underscored_market_resolves_like_spaced_one() {
    let h = harness();
    let a = h.service.predict("wheat", "ahmadnagar", "akhadabalapur").unwrap();
    let b = h.service.predict("wheat", "ahmadnagar", "Akhada Balapur").unwrap();
    let c = h.service.predict("wheat", "ahmadnagar", "akhada_balapur").unwrap();
    assert_eq!(a.predicted_price, b.predicted_price);
    assert_eq!(b.predicted_price, c.predicted_price);
    assert_eq!(b.market, "Akhada Balapur");
    assert_eq!(c.market, "Akhada Balapur");
}

#[test]
fn test_identical_requests_give_identical_results() {
    let h = harness();
    let first = h.service.predict("wheat", "pune", "baramati").unwrap();
    let second = h.service.predict("wheat", "pune", "baramati").unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_negative_model_output_is_clamped() {
    let h = harness();
    let result = h.service.predict("grapes", "nashik", "malegaon").unwrap();
    assert_eq!(result.predicted_price, 0.0);
}

#[test]
fn test_model_failure_is_a_prediction_error() {
    let h = harness();
    let err = h.service.predict("rice", "thane", "kalyan").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Prediction);
    assert!(err.to_string().contains("tensor shape"));
}

#[test]
fn test_incompatible_district_lists_supported_districts() {
    let h = harness();
    let err = h.service.predict("wheat", "thane", "thane").unwrap_err();
    match err {
        PredictError::Incompatible {
            district,
            commodity,
            supported,
        } => {
            assert_eq!(district, "Thane");
            assert_eq!(commodity, "wheat");
            assert_eq!(supported, vec!["Ahmadnagar", "Nagpur", "Nashik", "Pune"]);
        }
        other => panic!("expected Incompatible, got {other:?}"),
    }
}

#[test]
fn test_listed_districts_are_never_incompatible() {
    let h = harness();
    for commodity in ["wheat", "orange", "grapes"] {
        for district in h.service.list_districts(commodity).unwrap() {
            let Ok(markets) = h.service.list_markets(&district.id) else {
                // encoder class with no reference entry
                continue;
            };
            for market in markets.markets {
                let outcome = h.service.predict(commodity, &district.id, &market.id);
                assert!(
                    !matches!(outcome, Err(PredictError::Incompatible { .. })),
                    "{commodity}/{}/{} reported incompatible",
                    district.id,
                    market.id
                );
            }
        }
    }
}

#[test]
fn test_listed_districts_round_trip_despite_class_spelling() {
    let reference = ReferenceStore::from_doc(ReferenceDoc::builtin().unwrap()).unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let model = |key: &str, classes: &[&str]| {
        CommodityModel::new(
            key,
            Box::new(CountingModel {
                calls: calls.clone(),
                offset: 0.0,
            }),
            Box::new(TransformerArtifact::Passthrough),
            label(classes),
        )
    };
    let registry = CommodityRegistry::from_models([
        model("wheat", &["nashik", "Nagpur Rural", "PUNE", "Pune"]),
        model("jowar", &["Nagpur Rural"]),
    ]);
    let service = PredictionService::new(reference, registry, Box::new(FixedClock(clock())));

    let wheat: Vec<_> = service
        .list_districts("wheat")
        .unwrap()
        .into_iter()
        .map(|d| (d.id, d.name))
        .collect();
    assert_eq!(
        wheat,
        vec![
            ("nashik".to_string(), "Nashik".to_string()),
            ("pune".to_string(), "Pune".to_string()),
        ]
    );
    // "nagpur_rural" would be predicted as Nagpur, which jowar was never trained on
    assert!(service.list_districts("jowar").unwrap().is_empty());

    for district in service.list_districts("wheat").unwrap() {
        let markets = service.list_markets(&district.id).unwrap();
        let market = &markets.markets[0].id;
        let result = service.predict("wheat", &district.id, market);
        assert!(result.is_ok(), "wheat/{}/{market}: {result:?}", district.id);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_list_districts_maps_encoder_classes() {
    let h = harness();
    let grapes = h.service.list_districts("GRAPES").unwrap();
    assert_eq!(grapes.len(), 2);
    assert_eq!(grapes[0].id, "nashik");
    assert_eq!(grapes[0].name, "Nashik");
    // not in the reference table, still listed
    assert_eq!(grapes[1].id, "solapur");
    assert_eq!(grapes[1].name, "Solapur");

    assert!(h.service.list_districts("orange").unwrap().is_empty());
    assert!(matches!(
        h.service.list_districts("cotton"),
        Err(PredictError::UnknownCommodity { .. })
    ));
}

#[test]
fn test_list_markets_uses_fuzzy_resolution() {
    let h = harness();
    let nagpur = h.service.list_markets("Nagpu").unwrap();
    assert_eq!(nagpur.district_name, "Nagpur");
    let ids: Vec<_> = nagpur.markets.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, ["nagpur", "katol", "kalmeshwar", "umred"]);

    let err = h.service.list_markets("atlantis").unwrap_err();
    assert_eq!(err.options().len(), 15);
}

#[test]
fn test_commodity_listing_and_health() {
    let h = harness();
    let listed: Vec<_> = h
        .service
        .list_commodities()
        .into_iter()
        .map(|c| (c.id, c.name))
        .collect();
    assert_eq!(
        listed,
        vec![
            ("wheat".to_string(), "🌾 Wheat".to_string()),
            ("orange".to_string(), "🍊 Orange".to_string()),
            ("grapes".to_string(), "🍇 Grapes".to_string()),
            ("rice".to_string(), "🍚 Rice".to_string()),
        ]
    );

    let health = h.service.health();
    assert_eq!(health.status, "healthy");
    assert_eq!(health.total_commodities, 4);
    assert_eq!(health.total_districts_available, 15);
    assert_eq!(health.commodity_info["wheat"].district_count, 4);
    assert_eq!(health.commodity_info["orange"].district_count, 0);
    assert_eq!(health.all_districts[0], "ahmadnagar");
}

#[test]
fn test_shipped_demo_models_load_and_predict() {
    let models_dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("models");
    let reference = ReferenceStore::from_doc(ReferenceDoc::builtin().unwrap()).unwrap();
    let registry = CommodityRegistry::load(
        reference.commodities(),
        &models_dir,
        &mandi_predictor::model::FileArtifactLoader,
    );
    assert_eq!(registry.available(), vec!["wheat", "cotton", "orange"]);

    let service = PredictionService::new(reference, registry, Box::new(FixedClock(clock())));
    for (c, d, m) in [
        ("wheat", "nashik", "nashik"),
        ("cotton", "yavatmal", "wani"),
        ("orange", "nagpur", "katol"),
    ] {
        let result = service.predict(c, d, m).unwrap();
        assert!(result.predicted_price >= 0.0, "{c}: {}", result.predicted_price);
        println!("✓ {c}/{d}/{m}: ₹{}", result.predicted_price);
    }
}
