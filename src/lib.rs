/// Tab Shelf - browser extension for sending tabs to a saved list of groups
/// Built with Rust + WASM

pub mod backup;
pub mod bridge;
pub mod chrome;
pub mod clock;
pub mod domain;
pub mod error;
pub mod filters;
pub mod groups;
pub mod operations;
pub mod repository;
pub mod schedule;
pub mod settings;
pub mod storage;
pub mod tab_data;

use wasm_bindgen::prelude::*;

pub use bridge::TabShelf;
pub use error::{Result, ShelfError};

// Set up panic hook for better error messages in the browser console
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());
}

// Re-export filter helpers for pages that check a URL before calling into the shelf
#[wasm_bindgen]
pub fn hostname(url: &str) -> Option<String> {
    domain::hostname(url)
}

/// Alarm period in minutes for a backup interval ("hours", "days" or "weeks")
#[wasm_bindgen(js_name = computeNextPeriod)]
pub fn compute_next_period(value: f64, unit: &str) -> f64 {
    let unit = serde_json::from_value(serde_json::Value::String(unit.to_string()))
        .unwrap_or(settings::IntervalUnit::Unrecognized);
    schedule::compute_next_period(value, unit)
}
