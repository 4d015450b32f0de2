//! Terminal values
//!
//! Provides [`Scalar`], the leaf value stored in terminal fields, together with
//! [`TerminalKind`] (the declared kind of a terminal field) and [`MapKey`] for
//! keyed collections. Terminal values are never recursed into by the walkers.

use std::fmt::{self, Display, Formatter};

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeDelta, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::schema::TypeKey;

/// Declared kind of a terminal field
///
/// Integer kinds carry their width so that writes can be range-checked.
/// `Enum` references an enumeration registered in the type registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminalKind {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Char,
    Text,
    Decimal,
    DateTime,
    DateTimeOffset,
    Duration,
    Uuid,
    Enum(TypeKey),
}

impl TerminalKind {
    /// Short lowercase name used in diagnostics
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::I8 => "int8",
            Self::I16 => "int16",
            Self::I32 => "int32",
            Self::I64 => "int64",
            Self::U8 => "uint8",
            Self::U16 => "uint16",
            Self::U32 => "uint32",
            Self::U64 => "uint64",
            Self::F32 => "float32",
            Self::F64 => "float64",
            Self::Char => "char",
            Self::Text => "text",
            Self::Decimal => "decimal",
            Self::DateTime => "datetime",
            Self::DateTimeOffset => "datetimeoffset",
            Self::Duration => "duration",
            Self::Uuid => "uuid",
            Self::Enum(_) => "enum",
        }
    }

    /// Inclusive value range for integer kinds
    #[must_use]
    pub fn int_range(self) -> Option<(i128, i128)> {
        let range = match self {
            Self::I8 => (i128::from(i8::MIN), i128::from(i8::MAX)),
            Self::I16 => (i128::from(i16::MIN), i128::from(i16::MAX)),
            Self::I32 => (i128::from(i32::MIN), i128::from(i32::MAX)),
            Self::I64 => (i128::from(i64::MIN), i128::from(i64::MAX)),
            Self::U8 => (0, i128::from(u8::MAX)),
            Self::U16 => (0, i128::from(u16::MAX)),
            Self::U32 => (0, i128::from(u32::MAX)),
            Self::U64 => (0, i128::from(u64::MAX)),
            _ => return None,
        };
        Some(range)
    }

    /// Whether this kind is a signed integer
    #[inline]
    #[must_use]
    pub fn is_signed_int(self) -> bool {
        matches!(self, Self::I8 | Self::I16 | Self::I32 | Self::I64)
    }

    /// Whether this kind is an unsigned integer
    #[inline]
    #[must_use]
    pub fn is_unsigned_int(self) -> bool {
        matches!(self, Self::U8 | Self::U16 | Self::U32 | Self::U64)
    }

    /// Whether this kind is a floating point number
    #[inline]
    #[must_use]
    pub fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }
}

impl Display for TerminalKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A member of a registered enumeration
///
/// Equality is by enumeration type and ordinal; names live in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnumValue {
    ty: TypeKey,
    ordinal: i64,
}

impl EnumValue {
    /// Create member reference
    #[inline]
    #[must_use]
    pub fn new(ty: TypeKey, ordinal: i64) -> Self {
        Self { ty, ordinal }
    }

    /// Enumeration type
    #[inline]
    #[must_use]
    pub fn ty(&self) -> TypeKey {
        self.ty
    }

    /// Numeric value of the member
    #[inline]
    #[must_use]
    pub fn ordinal(&self) -> i64 {
        self.ordinal
    }
}

/// Terminal (leaf) value
///
/// Signed integer kinds are stored as `Int`, unsigned kinds as `UInt` and both
/// float kinds as `Float`; the declared [`TerminalKind`] of the owning field
/// bounds what fits.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Char(char),
    Text(String),
    Decimal(Decimal),
    DateTime(NaiveDateTime),
    DateTimeOffset(DateTime<FixedOffset>),
    Duration(TimeDelta),
    Uuid(Uuid),
    Enum(EnumValue),
}

impl Scalar {
    /// Text scalar
    #[inline]
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// The zero/empty value of a kind
    ///
    /// Date and time kinds use the Unix epoch, enumerations ordinal 0.
    #[must_use]
    pub fn zero(kind: TerminalKind) -> Self {
        match kind {
            TerminalKind::Bool => Self::Bool(false),
            TerminalKind::I8 | TerminalKind::I16 | TerminalKind::I32 | TerminalKind::I64 => {
                Self::Int(0)
            }
            TerminalKind::U8 | TerminalKind::U16 | TerminalKind::U32 | TerminalKind::U64 => {
                Self::UInt(0)
            }
            TerminalKind::F32 | TerminalKind::F64 => Self::Float(0.0),
            TerminalKind::Char => Self::Char('\0'),
            TerminalKind::Text => Self::Text(String::new()),
            TerminalKind::Decimal => Self::Decimal(Decimal::ZERO),
            TerminalKind::DateTime => Self::DateTime(epoch().naive_utc()),
            TerminalKind::DateTimeOffset => Self::DateTimeOffset(epoch()),
            TerminalKind::Duration => Self::Duration(TimeDelta::zero()),
            TerminalKind::Uuid => Self::Uuid(Uuid::nil()),
            TerminalKind::Enum(ty) => Self::Enum(EnumValue::new(ty, 0)),
        }
    }

    /// Whether the value counts as "default-like"
    ///
    /// Text is default when empty or whitespace-only; every other value is
    /// default when equal to the zero value of its kind.
    #[must_use]
    pub fn is_default_like(&self) -> bool {
        match self {
            Self::Bool(b) => !*b,
            Self::Int(v) => *v == 0,
            Self::UInt(v) => *v == 0,
            Self::Float(v) => *v == 0.0,
            Self::Char(c) => *c == '\0',
            Self::Text(s) => s.trim().is_empty(),
            Self::Decimal(d) => d.is_zero(),
            Self::DateTime(dt) => *dt == epoch().naive_utc(),
            Self::DateTimeOffset(dt) => *dt == epoch(),
            Self::Duration(d) => d.is_zero(),
            Self::Uuid(u) => u.is_nil(),
            Self::Enum(e) => e.ordinal() == 0,
        }
    }

    /// Whether the value can be stored in a field of `kind` as-is
    #[must_use]
    pub fn fits(&self, kind: TerminalKind) -> bool {
        match (self, kind) {
            (Self::Int(v), k) if k.is_signed_int() => in_range(i128::from(*v), k),
            (Self::UInt(v), k) if k.is_unsigned_int() => in_range(i128::from(*v), k),
            (Self::Float(v), TerminalKind::F32) => !v.is_finite() || v.abs() <= f64::from(f32::MAX),
            (Self::Float(_), TerminalKind::F64) => true,
            (Self::Enum(e), TerminalKind::Enum(ty)) => e.ty() == ty,
            (Self::Bool(_), TerminalKind::Bool)
            | (Self::Char(_), TerminalKind::Char)
            | (Self::Text(_), TerminalKind::Text)
            | (Self::Decimal(_), TerminalKind::Decimal)
            | (Self::DateTime(_), TerminalKind::DateTime)
            | (Self::DateTimeOffset(_), TerminalKind::DateTimeOffset)
            | (Self::Duration(_), TerminalKind::Duration)
            | (Self::Uuid(_), TerminalKind::Uuid) => true,
            _ => false,
        }
    }

    /// Type name of the stored value
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::UInt(_) => "uint",
            Self::Float(_) => "float",
            Self::Char(_) => "char",
            Self::Text(_) => "text",
            Self::Decimal(_) => "decimal",
            Self::DateTime(_) => "datetime",
            Self::DateTimeOffset(_) => "datetimeoffset",
            Self::Duration(_) => "duration",
            Self::Uuid(_) => "uuid",
            Self::Enum(_) => "enum",
        }
    }

    /// Borrow as text
    #[inline]
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl Display for Scalar {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::UInt(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Char(c) => write!(f, "{c}"),
            Self::Text(s) => f.write_str(s),
            Self::Decimal(d) => write!(f, "{d}"),
            Self::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S%.f")),
            Self::DateTimeOffset(dt) => f.write_str(&dt.to_rfc3339()),
            Self::Duration(d) => write!(f, "{d}"),
            Self::Uuid(u) => write!(f, "{u}"),
            Self::Enum(e) => write!(f, "{}", e.ordinal()),
        }
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for Scalar {
    fn from(value: u32) -> Self {
        Self::UInt(u64::from(value))
    }
}

impl From<u64> for Scalar {
    fn from(value: u64) -> Self {
        Self::UInt(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Decimal> for Scalar {
    fn from(value: Decimal) -> Self {
        Self::Decimal(value)
    }
}

impl From<Uuid> for Scalar {
    fn from(value: Uuid) -> Self {
        Self::Uuid(value)
    }
}

impl From<EnumValue> for Scalar {
    fn from(value: EnumValue) -> Self {
        Self::Enum(value)
    }
}

/// Declared key kind of a keyed collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    Text,
    Int,
    UInt,
    Char,
    Bool,
    Uuid,
}

impl KeyKind {
    /// Short lowercase name used in diagnostics
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Int => "int",
            Self::UInt => "uint",
            Self::Char => "char",
            Self::Bool => "bool",
            Self::Uuid => "uuid",
        }
    }
}

/// Key of a keyed collection entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MapKey {
    Text(String),
    Int(i64),
    UInt(u64),
    Char(char),
    Bool(bool),
    Uuid(Uuid),
}

impl MapKey {
    /// Text key
    #[inline]
    #[must_use]
    pub fn text(key: impl Into<String>) -> Self {
        Self::Text(key.into())
    }

    /// Kind of this key
    #[must_use]
    pub fn kind(&self) -> KeyKind {
        match self {
            Self::Text(_) => KeyKind::Text,
            Self::Int(_) => KeyKind::Int,
            Self::UInt(_) => KeyKind::UInt,
            Self::Char(_) => KeyKind::Char,
            Self::Bool(_) => KeyKind::Bool,
            Self::Uuid(_) => KeyKind::Uuid,
        }
    }

    /// The zero key of a kind
    #[must_use]
    pub fn zero(kind: KeyKind) -> Self {
        match kind {
            KeyKind::Text => Self::Text(String::new()),
            KeyKind::Int => Self::Int(0),
            KeyKind::UInt => Self::UInt(0),
            KeyKind::Char => Self::Char('\0'),
            KeyKind::Bool => Self::Bool(false),
            KeyKind::Uuid => Self::Uuid(Uuid::nil()),
        }
    }

    /// Parse the textual form of a key
    #[must_use]
    pub fn parse(kind: KeyKind, input: &str) -> Option<Self> {
        let trimmed = input.trim();
        match kind {
            KeyKind::Text => Some(Self::Text(input.to_string())),
            KeyKind::Int => trimmed.parse().ok().map(Self::Int),
            KeyKind::UInt => trimmed.parse().ok().map(Self::UInt),
            KeyKind::Char => {
                let mut chars = input.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Some(Self::Char(c)),
                    _ => None,
                }
            }
            KeyKind::Bool => parse_bool(trimmed).map(Self::Bool),
            KeyKind::Uuid => Uuid::parse_str(trimmed).ok().map(Self::Uuid),
        }
    }

    /// Key from a scalar of a compatible type
    #[must_use]
    pub fn from_scalar(kind: KeyKind, scalar: &Scalar) -> Option<Self> {
        match (kind, scalar) {
            (KeyKind::Text, Scalar::Text(s)) => Some(Self::Text(s.clone())),
            (KeyKind::Int, Scalar::Int(v)) => Some(Self::Int(*v)),
            (KeyKind::Int, Scalar::UInt(v)) => i64::try_from(*v).ok().map(Self::Int),
            (KeyKind::UInt, Scalar::UInt(v)) => Some(Self::UInt(*v)),
            (KeyKind::UInt, Scalar::Int(v)) => u64::try_from(*v).ok().map(Self::UInt),
            (KeyKind::Char, Scalar::Char(c)) => Some(Self::Char(*c)),
            (KeyKind::Bool, Scalar::Bool(b)) => Some(Self::Bool(*b)),
            (KeyKind::Uuid, Scalar::Uuid(u)) => Some(Self::Uuid(*u)),
            (_, other) => Self::parse(kind, &other.to_string()),
        }
    }
}

impl Display for MapKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Int(v) => write!(f, "{v}"),
            Self::UInt(v) => write!(f, "{v}"),
            Self::Char(c) => write!(f, "{c}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Uuid(u) => write!(f, "{u}"),
        }
    }
}

impl From<&str> for MapKey {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<i64> for MapKey {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

/// Case-insensitive `true`/`false`
pub(crate) fn parse_bool(input: &str) -> Option<bool> {
    if input.eq_ignore_ascii_case("true") {
        Some(true)
    } else if input.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

#[inline]
fn in_range(value: i128, kind: TerminalKind) -> bool {
    kind.int_range()
        .is_some_and(|(min, max)| value >= min && value <= max)
}

#[inline]
fn epoch() -> DateTime<FixedOffset> {
    DateTime::<Utc>::default().fixed_offset()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_values_are_default_like() {
        let kinds = [
            TerminalKind::Bool,
            TerminalKind::I32,
            TerminalKind::U64,
            TerminalKind::F64,
            TerminalKind::Char,
            TerminalKind::Text,
            TerminalKind::Decimal,
            TerminalKind::DateTime,
            TerminalKind::DateTimeOffset,
            TerminalKind::Duration,
            TerminalKind::Uuid,
            TerminalKind::Enum(TypeKey::from_index(0)),
        ];
        for kind in kinds {
            let zero = Scalar::zero(kind);
            assert!(zero.is_default_like(), "{kind} zero should be default");
            assert!(zero.fits(kind), "{kind} zero should fit its kind");
        }
    }

    #[test]
    fn whitespace_text_is_default() {
        assert!(Scalar::text("   \t").is_default_like());
        assert!(!Scalar::text(" x ").is_default_like());
    }

    #[test]
    fn integers_fit_by_range() {
        assert!(Scalar::Int(127).fits(TerminalKind::I8));
        assert!(!Scalar::Int(128).fits(TerminalKind::I8));
        assert!(!Scalar::Int(1).fits(TerminalKind::U8));
        assert!(Scalar::UInt(255).fits(TerminalKind::U8));
        assert!(!Scalar::UInt(256).fits(TerminalKind::U8));
    }

    #[test]
    fn floats_fit_by_range() {
        assert!(Scalar::Float(1.5e38).fits(TerminalKind::F32));
        assert!(!Scalar::Float(1.0e39).fits(TerminalKind::F32));
        assert!(Scalar::Float(1.0e39).fits(TerminalKind::F64));
        assert!(!Scalar::Float(1.0).fits(TerminalKind::I32));
    }

    #[test]
    fn enum_fits_only_its_type() {
        let a = TypeKey::from_index(1);
        let b = TypeKey::from_index(2);
        let member = Scalar::Enum(EnumValue::new(a, 1));
        assert!(member.fits(TerminalKind::Enum(a)));
        assert!(!member.fits(TerminalKind::Enum(b)));
    }

    #[test]
    fn offset_epoch_compares_by_instant() {
        let shifted = epoch().with_timezone(&FixedOffset::east_opt(3600).unwrap());
        assert!(Scalar::DateTimeOffset(shifted).is_default_like());
    }

    #[test]
    fn map_key_parse() {
        assert_eq!(MapKey::parse(KeyKind::Int, " 42 "), Some(MapKey::Int(42)));
        assert_eq!(MapKey::parse(KeyKind::Bool, "TRUE"), Some(MapKey::Bool(true)));
        assert_eq!(MapKey::parse(KeyKind::Char, "ab"), None);
        assert_eq!(MapKey::parse(KeyKind::UInt, "-1"), None);
    }

    #[test]
    fn map_key_from_scalar_falls_back_to_parsing() {
        assert_eq!(
            MapKey::from_scalar(KeyKind::Int, &Scalar::text("7")),
            Some(MapKey::Int(7))
        );
        assert_eq!(MapKey::from_scalar(KeyKind::UInt, &Scalar::Int(-3)), None);
    }
}
