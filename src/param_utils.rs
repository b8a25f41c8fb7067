use crate::compiler::CompileError;
use chrono::NaiveDate;

fn missing(field: &str) -> CompileError {
    CompileError::Missing {
        field: field.to_string(),
    }
}

fn require_input<'a>(field: &str, raw: &'a str) -> Result<&'a str, CompileError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(missing(field));
    }
    Ok(trimmed)
}

/// Parse a raw text input as a finite number.
pub fn parse_number(field: &str, raw: &str) -> Result<f64, CompileError> {
    let trimmed = require_input(field, raw)?;
    let value = trimmed
        .parse::<f64>()
        .map_err(|_| CompileError::NotNumeric {
            field: field.to_string(),
            value: trimmed.to_string(),
        })?;
    if !value.is_finite() {
        return Err(CompileError::NotFinite {
            field: field.to_string(),
            value: trimmed.to_string(),
        });
    }
    Ok(value)
}

/// Blank input means "not set"; anything else must be a finite number.
pub fn parse_optional_number(field: &str, raw: &str) -> Result<Option<f64>, CompileError> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    parse_number(field, raw).map(Some)
}

pub fn parse_positive_number(field: &str, raw: &str) -> Result<f64, CompileError> {
    let value = parse_number(field, raw)?;
    if value <= 0.0 {
        return Err(CompileError::NotPositive {
            field: field.to_string(),
            value: raw.trim().to_string(),
        });
    }
    Ok(value)
}

/// Periods are whole bar counts; `"20"` and `"20.0"` are accepted, `"20.5"` and `"0"` are not.
pub fn parse_period(field: &str, raw: &str) -> Result<u32, CompileError> {
    let value = parse_number(field, raw)?;
    if value.fract() != 0.0 || value < 1.0 || value > u32::MAX as f64 {
        return Err(CompileError::InvalidPeriod {
            field: field.to_string(),
            value: raw.trim().to_string(),
        });
    }
    Ok(value as u32)
}

pub fn parse_date(field: &str, raw: &str) -> Result<NaiveDate, CompileError> {
    let trimmed = require_input(field, raw)?;
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").map_err(|_| CompileError::InvalidDate {
        field: field.to_string(),
        value: trimmed.to_string(),
    })
}

/// Normalizes a ticker string by trimming whitespace and uppercasing.
pub fn normalize_symbol(value: &str) -> Option<String> {
    let normalized = value.trim().to_uppercase();
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}
