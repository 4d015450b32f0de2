//! Best-effort scalar conversion
//!
//! [`coerce`] converts a terminal value into the representation demanded by a
//! field's declared [`TerminalKind`]. Callers treat a failure as "keep the raw
//! value" rather than as a hard error.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use uuid::Uuid;

use crate::scalar::{parse_bool, EnumValue, Scalar, TerminalKind};
use crate::schema::TypeRegistry;

/// Errors produced by [`coerce`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoercionError {
    /// No conversion exists between the two kinds
    #[error("cannot convert {from} to {to}")]
    Unsupported { from: &'static str, to: String },

    /// The value exceeds the target's range
    #[error("value {value} is out of range for {to}")]
    Overflow { value: String, to: String },

    /// Text did not parse as the target kind
    #[error("cannot parse '{input}' as {to}")]
    Parse { input: String, to: String },
}

impl CoercionError {
    fn unsupported(from: &Scalar, to: TerminalKind) -> Self {
        Self::Unsupported {
            from: from.type_name(),
            to: to.to_string(),
        }
    }

    fn parse(input: &str, to: TerminalKind) -> Self {
        Self::Parse {
            input: input.to_string(),
            to: to.to_string(),
        }
    }
}

/// Convert `value` into a scalar that fits `kind`
///
/// Values that already fit are returned unchanged. Float to integer conversion
/// rounds half to even; narrowing conversions are range-checked.
///
/// # Errors
/// Returns error when no conversion exists, the input text does not parse or
/// the result would overflow the target kind
pub fn coerce(
    value: &Scalar,
    kind: TerminalKind,
    registry: &TypeRegistry,
) -> Result<Scalar, CoercionError> {
    if value.fits(kind) {
        return Ok(value.clone());
    }
    match kind {
        k if k.int_range().is_some() => to_integer(value, k),
        TerminalKind::F32 | TerminalKind::F64 => to_float(value, kind),
        TerminalKind::Bool => to_bool(value),
        TerminalKind::Char => to_char(value),
        TerminalKind::Text => Ok(Scalar::Text(to_text(value, registry))),
        TerminalKind::Decimal => to_decimal(value),
        TerminalKind::DateTime => to_datetime(value),
        TerminalKind::DateTimeOffset => to_datetime_offset(value),
        TerminalKind::Uuid => match value {
            Scalar::Text(s) => Uuid::parse_str(s.trim())
                .map(Scalar::Uuid)
                .map_err(|_| CoercionError::parse(s, kind)),
            other => Err(CoercionError::unsupported(other, kind)),
        },
        TerminalKind::Enum(_) => to_enum(value, kind, registry),
        _ => Err(CoercionError::unsupported(value, kind)),
    }
}

/// Text form of a scalar, resolving enumeration members to their names
#[must_use]
pub fn to_text(value: &Scalar, registry: &TypeRegistry) -> String {
    if let Scalar::Enum(member) = value {
        if let Some(variant) = registry
            .get(member.ty())
            .and_then(|desc| desc.variant_by_ordinal(member.ordinal()))
        {
            return variant.name.clone();
        }
    }
    value.to_string()
}

fn to_integer(value: &Scalar, kind: TerminalKind) -> Result<Scalar, CoercionError> {
    let wide: i128 = match value {
        Scalar::Int(v) => i128::from(*v),
        Scalar::UInt(v) => i128::from(*v),
        Scalar::Bool(b) => i128::from(*b),
        Scalar::Char(c) => i128::from(u32::from(*c)),
        Scalar::Enum(e) => i128::from(e.ordinal()),
        Scalar::Float(f) => float_to_wide(*f).ok_or_else(|| overflow(value, kind))?,
        Scalar::Decimal(d) => d
            .round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven)
            .to_i128()
            .ok_or_else(|| overflow(value, kind))?,
        Scalar::Text(s) => {
            let trimmed = s.trim();
            trimmed
                .parse::<i128>()
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().and_then(float_to_wide))
                .ok_or_else(|| CoercionError::parse(s, kind))?
        }
        other => return Err(CoercionError::unsupported(other, kind)),
    };

    match kind.int_range() {
        Some((min, max)) if wide >= min && wide <= max => {
            if kind.is_signed_int() {
                i64::try_from(wide).map(Scalar::Int).map_err(|_| overflow(value, kind))
            } else {
                u64::try_from(wide).map(Scalar::UInt).map_err(|_| overflow(value, kind))
            }
        }
        _ => Err(overflow(value, kind)),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn float_to_wide(value: f64) -> Option<i128> {
    let rounded = value.round_ties_even();
    // i128 spans far beyond every target kind; anything outside is rejected later
    if rounded.is_finite() && rounded.abs() < 1e38 {
        Some(rounded as i128)
    } else {
        None
    }
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn to_float(value: &Scalar, kind: TerminalKind) -> Result<Scalar, CoercionError> {
    let wide = match value {
        Scalar::Float(v) => *v,
        Scalar::Int(v) => *v as f64,
        Scalar::UInt(v) => *v as f64,
        Scalar::Bool(b) => f64::from(u8::from(*b)),
        Scalar::Decimal(d) => d.to_f64().ok_or_else(|| overflow(value, kind))?,
        Scalar::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| CoercionError::parse(s, kind))?,
        other => return Err(CoercionError::unsupported(other, kind)),
    };
    if kind == TerminalKind::F32 {
        let narrow = wide as f32;
        if wide.is_finite() && narrow.is_infinite() {
            return Err(overflow(value, kind));
        }
        Ok(Scalar::Float(f64::from(narrow)))
    } else {
        Ok(Scalar::Float(wide))
    }
}

fn to_bool(value: &Scalar) -> Result<Scalar, CoercionError> {
    match value {
        Scalar::Int(v) => Ok(Scalar::Bool(*v != 0)),
        Scalar::UInt(v) => Ok(Scalar::Bool(*v != 0)),
        Scalar::Float(v) => Ok(Scalar::Bool(*v != 0.0)),
        Scalar::Decimal(d) => Ok(Scalar::Bool(!d.is_zero())),
        Scalar::Text(s) => parse_bool(s.trim())
            .map(Scalar::Bool)
            .ok_or_else(|| CoercionError::parse(s, TerminalKind::Bool)),
        other => Err(CoercionError::unsupported(other, TerminalKind::Bool)),
    }
}

fn to_char(value: &Scalar) -> Result<Scalar, CoercionError> {
    match value {
        Scalar::Text(s) => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(Scalar::Char(c)),
                _ => Err(CoercionError::parse(s, TerminalKind::Char)),
            }
        }
        Scalar::Int(_) | Scalar::UInt(_) => {
            let code = match value {
                Scalar::Int(v) => u32::try_from(*v).ok(),
                Scalar::UInt(v) => u32::try_from(*v).ok(),
                _ => None,
            };
            code.and_then(char::from_u32)
                .map(Scalar::Char)
                .ok_or_else(|| overflow(value, TerminalKind::Char))
        }
        other => Err(CoercionError::unsupported(other, TerminalKind::Char)),
    }
}

fn to_decimal(value: &Scalar) -> Result<Scalar, CoercionError> {
    let kind = TerminalKind::Decimal;
    match value {
        Scalar::Int(v) => Ok(Scalar::Decimal(Decimal::from(*v))),
        Scalar::UInt(v) => Ok(Scalar::Decimal(Decimal::from(*v))),
        Scalar::Bool(b) => Ok(Scalar::Decimal(Decimal::from(u8::from(*b)))),
        Scalar::Float(f) => Decimal::try_from(*f)
            .map(Scalar::Decimal)
            .map_err(|_| overflow(value, kind)),
        Scalar::Text(s) => Decimal::from_str(s.trim())
            .or_else(|_| Decimal::from_scientific(s.trim()))
            .map(Scalar::Decimal)
            .map_err(|_| CoercionError::parse(s, kind)),
        other => Err(CoercionError::unsupported(other, kind)),
    }
}

fn to_datetime(value: &Scalar) -> Result<Scalar, CoercionError> {
    let kind = TerminalKind::DateTime;
    match value {
        Scalar::DateTimeOffset(dt) => Ok(Scalar::DateTime(dt.naive_utc())),
        Scalar::Text(s) => parse_naive(s.trim())
            .map(Scalar::DateTime)
            .ok_or_else(|| CoercionError::parse(s, kind)),
        other => Err(CoercionError::unsupported(other, kind)),
    }
}

fn to_datetime_offset(value: &Scalar) -> Result<Scalar, CoercionError> {
    let kind = TerminalKind::DateTimeOffset;
    match value {
        Scalar::DateTime(dt) => Ok(Scalar::DateTimeOffset(dt.and_utc().fixed_offset())),
        Scalar::Text(s) => {
            let trimmed = s.trim();
            DateTime::parse_from_rfc3339(trimmed)
                .ok()
                .or_else(|| parse_naive(trimmed).map(|dt| dt.and_utc().fixed_offset()))
                .map(Scalar::DateTimeOffset)
                .ok_or_else(|| CoercionError::parse(s, kind))
        }
        other => Err(CoercionError::unsupported(other, kind)),
    }
}

fn parse_naive(input: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.naive_utc());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(input, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(input, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn to_enum(
    value: &Scalar,
    kind: TerminalKind,
    registry: &TypeRegistry,
) -> Result<Scalar, CoercionError> {
    let TerminalKind::Enum(ty) = kind else {
        return Err(CoercionError::unsupported(value, kind));
    };
    let desc = registry
        .get(ty)
        .ok_or_else(|| CoercionError::unsupported(value, kind))?;

    let ordinal = match value {
        Scalar::Text(s) => {
            let trimmed = s.trim();
            if let Some(variant) = desc.variant_by_name(trimmed) {
                return Ok(Scalar::Enum(EnumValue::new(ty, variant.ordinal)));
            }
            trimmed
                .parse::<i64>()
                .map_err(|_| CoercionError::parse(s, kind))?
        }
        Scalar::Int(v) => *v,
        Scalar::UInt(v) => i64::try_from(*v).map_err(|_| overflow(value, kind))?,
        Scalar::Enum(other) => other.ordinal(),
        other => return Err(CoercionError::unsupported(other, kind)),
    };

    desc.variant_by_ordinal(ordinal)
        .map(|v| Scalar::Enum(EnumValue::new(ty, v.ordinal)))
        .ok_or_else(|| overflow(value, kind))
}

fn overflow(value: &Scalar, kind: TerminalKind) -> CoercionError {
    CoercionError::Overflow {
        value: value.to_string(),
        to: kind.to_string(),
    }
}
