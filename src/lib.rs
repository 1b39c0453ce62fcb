use serde::Serialize;
use wasm_bindgen::prelude::*;

pub mod capture;
pub mod error;
pub mod exercises;
pub mod notation;
pub mod pitch;
pub mod rhythm;
pub mod scoring;
pub mod tuning;

pub use error::{PracticeError, Result};

use exercises::generators::PassageGenerator;
use pitch::aggregate::{AggregateDetectorConfig, PitchTracker};
use pitch::PitchDetectorConfig;
use rhythm::converter::RawToDiscreteConverter;
use rhythm::snapper::SnapperConfig;
use rhythm::time_signature::TimeSignature;
use rhythm::types::{DiscretePassage, RawPassage};
use scoring::evaluator::{EvaluatorConfig, PassageEvaluator};

use std::cell::RefCell;

thread_local! {
    static TRACKER: RefCell<Option<PitchTracker>> = RefCell::new(None);
}

fn js_error(e: impl ToString) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// Plain JS objects rather than `Map`s, so flattened passage elements keep
/// their wire shape.
fn to_js<T: Serialize>(value: &T) -> std::result::Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(js_error)
}

fn from_js_or_default<T>(value: JsValue) -> std::result::Result<T, JsValue>
where
    T: serde::de::DeserializeOwned + Default,
{
    if value.is_null() || value.is_undefined() {
        Ok(T::default())
    } else {
        serde_wasm_bindgen::from_value(value).map_err(js_error)
    }
}

/// Replace the thread-local pitch tracker. Either argument may be null for defaults.
#[wasm_bindgen]
pub fn configure_pitch_detection(
    config_js: JsValue,
    aggregate_js: JsValue,
) -> std::result::Result<(), JsValue> {
    let config: PitchDetectorConfig = from_js_or_default(config_js)?;
    let aggregate: AggregateDetectorConfig = from_js_or_default(aggregate_js)?;
    TRACKER.with(|cell| *cell.borrow_mut() = Some(PitchTracker::new(config, aggregate)));
    Ok(())
}

/// Consensus pitch detection returning Float64Array
/// [hz, confidence, midi_float, consensus_count]. All zeros when no pitch is found.
#[wasm_bindgen]
pub fn detect_pitch(samples: &[f32], sample_rate: f32) -> js_sys::Float64Array {
    let result = TRACKER.with(|cell| {
        let mut borrow = cell.borrow_mut();
        let tracker = borrow.get_or_insert_with(|| {
            PitchTracker::new(PitchDetectorConfig::default(), AggregateDetectorConfig::default())
        });
        tracker.set_sample_rate(sample_rate);
        tracker.detect(samples)
    });

    let arr = js_sys::Float64Array::new_with_length(4);
    if let Some(estimate) = result {
        arr.set_index(0, estimate.frequency as f64);
        arr.set_index(1, estimate.confidence as f64);
        arr.set_index(2, estimate.midi_note() as f64);
        arr.set_index(3, estimate.consensus_count as f64);
    }
    arr
}

/// Generate a random rhythm passage. Without a seed the passage differs per call.
#[wasm_bindgen]
pub fn generate_passage(
    measure_count: u32,
    time_signature: &str,
    resolution: u32,
    seed: Option<u32>,
) -> std::result::Result<JsValue, JsValue> {
    let time_signature: TimeSignature = time_signature.parse().map_err(js_error)?;
    let mut generator = match seed {
        Some(seed) => PassageGenerator::seeded(seed as u64),
        None => PassageGenerator::from_os_rng(),
    };
    let passage = generator
        .generate(measure_count, time_signature, resolution)
        .map_err(js_error)?;
    to_js(&passage)
}

/// Quantize a captured performance. Without `measure_count` the passage is
/// sized to fit every note.
#[wasm_bindgen]
pub fn quantize_performance(
    raw_js: JsValue,
    snapper_config_js: JsValue,
    measure_count: Option<u32>,
) -> std::result::Result<JsValue, JsValue> {
    let raw: RawPassage = serde_wasm_bindgen::from_value(raw_js).map_err(js_error)?;
    let config: SnapperConfig = from_js_or_default(snapper_config_js)?;
    let converter = RawToDiscreteConverter::new(config).map_err(js_error)?;
    let passage = match measure_count {
        Some(count) => converter.convert(&raw, count),
        None => converter.convert_all(&raw),
    }
    .map_err(js_error)?;
    to_js(&passage)
}

/// Score a captured performance against the expected passage.
#[wasm_bindgen]
pub fn evaluate_performance(
    expected_js: JsValue,
    raw_js: JsValue,
    snapper_config_js: JsValue,
    evaluator_config_js: JsValue,
) -> std::result::Result<JsValue, JsValue> {
    let expected: DiscretePassage =
        serde_wasm_bindgen::from_value(expected_js).map_err(js_error)?;
    let raw: RawPassage = serde_wasm_bindgen::from_value(raw_js).map_err(js_error)?;
    let snapper_config: SnapperConfig = from_js_or_default(snapper_config_js)?;
    let config: EvaluatorConfig = from_js_or_default(evaluator_config_js)?;
    let evaluator = PassageEvaluator::new(snapper_config, config).map_err(js_error)?;
    to_js(&evaluator.evaluate(&expected, &raw))
}

#[wasm_bindgen]
pub fn passage_to_musicxml(
    passage_js: JsValue,
    time_signature: &str,
) -> std::result::Result<String, JsValue> {
    let passage: DiscretePassage =
        serde_wasm_bindgen::from_value(passage_js).map_err(js_error)?;
    let time_signature: TimeSignature = time_signature.parse().map_err(js_error)?;
    notation::musicxml::passage_to_musicxml(&passage, time_signature).map_err(js_error)
}

/// Get the 4-stage rhythm curriculum.
#[wasm_bindgen]
pub fn get_curriculum() -> std::result::Result<JsValue, JsValue> {
    to_js(&exercises::curriculum::get_curriculum())
}
