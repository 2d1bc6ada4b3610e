//! Record normalization and schema migration
//!
//! Converts raw key/value records (parsed upstream from JSON or JSONL)
//! into validated [`TelemetrySample`]s. Legacy schema versions are
//! migrated to the current field names before validation. A record that
//! fails validation is dropped and counted; it never aborts the batch.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

use crate::models::{TelemetrySample, CURRENT_SCHEMA_VERSION};
use crate::observability::PipelineMetrics;

/// A raw telemetry record as parsed from the input file
pub type RawRecord = Map<String, Value>;

/// Why a single record was rejected by normalization
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("record is not a JSON object")]
    NotAnObject,
    #[error("missing required field `{field}`")]
    MissingField { field: &'static str },
    #[error("field `{field}` has the wrong type")]
    InvalidType { field: &'static str },
    #[error("field `{field}` value {value} is outside {min}..={max}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("field `{field}` must be a non-negative integer, got {value}")]
    NegativeCount { field: &'static str, value: i64 },
}

/// Normalize one raw record into a validated sample.
///
/// Applies schema migration, timestamp resolution, and field aliasing
/// before validation. A missing or unparseable timestamp defaults to
/// the current UTC time rather than failing the record.
pub fn normalize_record(record: &RawRecord) -> Result<TelemetrySample, NormalizeError> {
    let mut payload = record.clone();

    let schema_version = payload
        .get("schema_version")
        .and_then(Value::as_i64)
        .unwrap_or(CURRENT_SCHEMA_VERSION);
    if schema_version < CURRENT_SCHEMA_VERSION {
        migrate_v0(&mut payload);
    }

    let timestamp = resolve_timestamp(&payload);

    alias(&mut payload, "link", "link_id");
    alias(&mut payload, "port", "port_id");

    let link_id = match payload.get("link_id") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::String(_)) | None | Some(Value::Null) => {
            return Err(NormalizeError::MissingField { field: "link_id" })
        }
        Some(_) => return Err(NormalizeError::InvalidType { field: "link_id" }),
    };

    Ok(TelemetrySample {
        timestamp,
        link_id,
        port_id: take_string(&payload, "port_id")?,
        errors: take_count(&payload, "errors")?,
        drops: take_count(&payload, "drops")?,
        retries: take_count(&payload, "retries")?,
        fec_corrected: take_count(&payload, "fec_corrected")?,
        fec_uncorrected: take_count(&payload, "fec_uncorrected")?,
        ber: take_range(&payload, "ber", 0.0, 1.0)?,
        tx_power_dbm: take_float(&payload, "tx_power_dbm")?,
        rx_power_dbm: take_float(&payload, "rx_power_dbm")?,
        temperature_c: take_range(&payload, "temperature_c", -50.0, 150.0)?,
        congestion_pct: take_range(&payload, "congestion_pct", 0.0, 100.0)?,
        power_kw: take_range(&payload, "power_kw", 0.0, f64::MAX)?,
        energy_kwh: take_range(&payload, "energy_kwh", 0.0, f64::MAX)?,
        voltage_v: take_range(&payload, "voltage_v", 0.0, f64::MAX)?,
        current_a: take_range(&payload, "current_a", 0.0, f64::MAX)?,
        battery_soc_pct: take_range(&payload, "battery_soc_pct", 0.0, 100.0)?,
        charger_status: take_string(&payload, "charger_status")?,
        charger_fault_code: take_string(&payload, "charger_fault_code")?,
        meta: take_meta(&payload),
        schema_version: CURRENT_SCHEMA_VERSION,
    })
}

/// Normalize a batch of raw values, dropping invalid records.
///
/// Output order follows input order with failures skipped. Successes
/// and failures are counted on `metrics`; a single bad record never
/// aborts the batch.
pub fn normalize_records(records: &[Value], metrics: &PipelineMetrics) -> Vec<TelemetrySample> {
    let _timer = metrics.start_normalize_timer();
    let mut normalized = Vec::with_capacity(records.len());
    for record in records {
        let result = match record.as_object() {
            Some(map) => normalize_record(map),
            None => Err(NormalizeError::NotAnObject),
        };
        match result {
            Ok(sample) => {
                normalized.push(sample);
                metrics.inc_telemetry_ingested();
            }
            Err(err) => {
                warn!(error = %err, "Invalid telemetry record, dropping");
                metrics.inc_normalize_errors();
            }
        }
    }
    normalized
}

/// Rename v0 field names to their current equivalents. Only fills a
/// target key that is absent, and always stamps the current version.
fn migrate_v0(payload: &mut RawRecord) {
    rename(payload, "temp_c", "temperature_c");
    rename(payload, "tx_power", "tx_power_dbm");
    rename(payload, "rx_power", "rx_power_dbm");
    if !payload.contains_key("power_kw") {
        if let Some(watts) = payload.remove("power_w").as_ref().and_then(Value::as_f64) {
            payload.insert("power_kw".to_string(), json_number(watts / 1000.0));
        }
    }
    if !payload.contains_key("energy_kwh") {
        if let Some(wh) = payload.remove("energy_wh").as_ref().and_then(Value::as_f64) {
            payload.insert("energy_kwh".to_string(), json_number(wh / 1000.0));
        }
    }
    payload.insert(
        "schema_version".to_string(),
        Value::from(CURRENT_SCHEMA_VERSION),
    );
}

fn rename(payload: &mut RawRecord, legacy: &str, current: &str) {
    if !payload.contains_key(current) {
        if let Some(value) = payload.remove(legacy) {
            payload.insert(current.to_string(), value);
        }
    }
}

fn json_number(value: f64) -> Value {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn alias(payload: &mut RawRecord, from: &str, to: &str) {
    if !payload.contains_key(to) {
        if let Some(value) = payload.get(from).cloned() {
            payload.insert(to.to_string(), value);
        }
    }
}

/// Resolve the sample timestamp from `timestamp` or `ts`.
///
/// ISO-8601 strings (trailing `Z` accepted) and numeric epoch seconds
/// are honored; anything else defaults to the current UTC time.
fn resolve_timestamp(payload: &RawRecord) -> DateTime<Utc> {
    let raw = payload
        .get("timestamp")
        .filter(|v| !v.is_null())
        .or_else(|| payload.get("ts"));
    match raw {
        Some(Value::String(text)) => DateTime::parse_from_rfc3339(text)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        Some(value) if value.is_number() => value
            .as_f64()
            .and_then(|secs| {
                let whole = secs.trunc() as i64;
                let nanos = ((secs - secs.trunc()) * 1e9) as u32;
                DateTime::from_timestamp(whole, nanos)
            })
            .unwrap_or_else(Utc::now),
        _ => Utc::now(),
    }
}

fn take_count(payload: &RawRecord, field: &'static str) -> Result<u64, NormalizeError> {
    match payload.get(field) {
        None | Some(Value::Null) => Ok(0),
        Some(value) => match value.as_i64() {
            Some(n) if n >= 0 => Ok(n as u64),
            Some(n) => Err(NormalizeError::NegativeCount { field, value: n }),
            None => value
                .as_u64()
                .ok_or(NormalizeError::InvalidType { field }),
        },
    }
}

fn take_range(
    payload: &RawRecord,
    field: &'static str,
    min: f64,
    max: f64,
) -> Result<Option<f64>, NormalizeError> {
    match take_float(payload, field)? {
        Some(value) if value < min || value > max => Err(NormalizeError::OutOfRange {
            field,
            value,
            min,
            max,
        }),
        other => Ok(other),
    }
}

fn take_float(payload: &RawRecord, field: &'static str) -> Result<Option<f64>, NormalizeError> {
    match payload.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_f64()
            .map(Some)
            .ok_or(NormalizeError::InvalidType { field }),
    }
}

fn take_string(payload: &RawRecord, field: &'static str) -> Result<Option<String>, NormalizeError> {
    match payload.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(NormalizeError::InvalidType { field }),
    }
}

fn take_meta(payload: &RawRecord) -> BTreeMap<String, Value> {
    payload
        .get("meta")
        .and_then(Value::as_object)
        .map(|map| map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default()
}
