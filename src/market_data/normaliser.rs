// Convert venue wire values into typed levels.
// Prices and sizes arrive as decimal strings ("101.25") or bare JSON numbers.
// Every batch helper stops at the first bad entry, so a malformed message is
// dropped whole instead of half-applied.

use serde_json::Value;
use thiserror::Error;

use crate::engine::types::{Level, LevelUpdate, Side};

#[derive(Debug, Error, PartialEq)]
pub enum NormaliseError {
    #[error("field `{field}` is not a finite number: {raw}")]
    InvalidNumber { field: &'static str, raw: String },

    #[error("unknown side tag `{0}`")]
    UnknownSide(String),

    #[error("expected at least {expected} elements, got {got}")]
    ShortEntry { expected: usize, got: usize },

    #[error("expected a JSON array, got {0}")]
    NotAnArray(String),
}

pub type NormaliseResult<T> = Result<T, NormaliseError>;

pub fn parse_number(field: &'static str, value: &Value) -> NormaliseResult<f64> {
    let parsed = match value {
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    };
    match parsed {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(NormaliseError::InvalidNumber {
            field,
            raw: value.to_string(),
        }),
    }
}

/// Accepts the tags used across venues: buy/bid/b and sell/ask/a/s.
pub fn parse_side(tag: &str) -> NormaliseResult<Side> {
    match tag.trim().to_ascii_lowercase().as_str() {
        "buy" | "bid" | "b" => Ok(Side::Bid),
        "sell" | "ask" | "a" | "s" => Ok(Side::Ask),
        _ => Err(NormaliseError::UnknownSide(tag.to_string())),
    }
}

fn as_entry(value: &Value, expected: usize) -> NormaliseResult<&[Value]> {
    let items = value
        .as_array()
        .ok_or_else(|| NormaliseError::NotAnArray(value.to_string()))?;
    if items.len() < expected {
        return Err(NormaliseError::ShortEntry {
            expected,
            got: items.len(),
        });
    }
    Ok(items.as_slice())
}

/// `[price, size, ...]` -> `Level`. Trailing elements (order count, timestamp) are ignored.
pub fn parse_level(value: &Value) -> NormaliseResult<Level> {
    let items = as_entry(value, 2)?;
    Ok(Level::new(
        parse_number("price", &items[0])?,
        parse_number("size", &items[1])?,
    ))
}

pub fn parse_levels(values: &[Value]) -> NormaliseResult<Vec<Level>> {
    values.iter().map(parse_level).collect()
}

/// `[side, price, size]` -> `LevelUpdate`.
pub fn parse_change(value: &Value) -> NormaliseResult<LevelUpdate> {
    let items = as_entry(value, 3)?;
    let tag = items[0]
        .as_str()
        .ok_or_else(|| NormaliseError::UnknownSide(items[0].to_string()))?;
    Ok(LevelUpdate::new(
        parse_side(tag)?,
        parse_number("price", &items[1])?,
        parse_number("size", &items[2])?,
    ))
}

pub fn parse_changes(values: &[Value]) -> NormaliseResult<Vec<LevelUpdate>> {
    values.iter().map(parse_change).collect()
}
