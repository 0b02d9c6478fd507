//! Data models for the current logger.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---

/// One raw sample as posted by the device.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Sample {
    // ---
    #[serde(rename = "sample")]
    pub sample_index: i64,
    #[serde(rename = "I", alias = "i")]
    pub value: f64,
}

/// Persisted row: a sample with its synthesized timestamp.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    // ---
    #[serde(rename = "sample")]
    pub sample_index: i64,
    #[serde(rename = "I")]
    pub value: f64,
    pub timestamp: DateTime<FixedOffset>,
    #[serde(rename = "identifier")]
    pub batch_id: Uuid,
    #[serde(rename = "indicator_id", skip_serializing_if = "Option::is_none")]
    pub device_id: Option<i32>,
}

/// All readings produced from one accepted submission.
#[derive(Debug, Clone)]
pub struct Batch {
    pub batch_id: Uuid,
    pub readings: Vec<Reading>,
}

/// One entry of the grouped read-back.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    #[serde(rename = "id")]
    pub batch_id: Uuid,
    #[serde(rename = "timestamp")]
    pub earliest: DateTime<FixedOffset>,
}

/// Last known state of a device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Indicator {
    // ---
    #[serde(rename = "indicator_id")]
    pub device_id: i32,
    #[serde(rename = "I")]
    pub last_value: f64,
    #[serde(rename = "motor")]
    pub label: Option<String>,
    pub updated_at: DateTime<FixedOffset>,
}

/// Indicator upsert request entry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IndicatorUpdate {
    // ---
    #[serde(rename = "indicator_id", alias = "id")]
    pub device_id: i32,
    #[serde(rename = "I", alias = "i", alias = "value")]
    pub value: f64,
    #[serde(rename = "motor", default)]
    pub label: Option<String>,
}

impl IndicatorUpdate {
    /// The record this update produces when nothing was stored before.
    pub fn to_indicator(&self, at: DateTime<FixedOffset>) -> Indicator {
        Indicator {
            device_id: self.device_id,
            last_value: self.value,
            label: self.label.clone(),
            updated_at: at,
        }
    }

    /// Overwrite `existing` in place. An absent label keeps the stored one.
    pub fn apply_to(&self, existing: &mut Indicator, at: DateTime<FixedOffset>) {
        existing.last_value = self.value;
        if self.label.is_some() {
            existing.label = self.label.clone();
        }
        existing.updated_at = at;
    }
}
