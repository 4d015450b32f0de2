//! Coercion and scalar range properties

use expando_model::{coerce, CoercionError, Scalar, TerminalKind, TypeRegistry};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn signed_kind() -> impl Strategy<Value = (TerminalKind, i64, i64)> {
    prop_oneof![
        Just((TerminalKind::I8, i64::from(i8::MIN), i64::from(i8::MAX))),
        Just((TerminalKind::I16, i64::from(i16::MIN), i64::from(i16::MAX))),
        Just((TerminalKind::I32, i64::from(i32::MIN), i64::from(i32::MAX))),
        Just((TerminalKind::I64, i64::MIN, i64::MAX)),
    ]
}

fn unsigned_kind() -> impl Strategy<Value = (TerminalKind, u64)> {
    prop_oneof![
        Just((TerminalKind::U8, u64::from(u8::MAX))),
        Just((TerminalKind::U16, u64::from(u16::MAX))),
        Just((TerminalKind::U32, u64::from(u32::MAX))),
        Just((TerminalKind::U64, u64::MAX)),
    ]
}

proptest! {
    #[test]
    fn prop_signed_coercion_follows_range((kind, min, max) in signed_kind(), v in any::<i64>()) {
        let registry = TypeRegistry::new();
        let result = coerce(&Scalar::Int(v), kind, &registry);
        if (min..=max).contains(&v) {
            let coerced = result.unwrap();
            prop_assert!(coerced.fits(kind));
            prop_assert_eq!(coerced, Scalar::Int(v));
        } else {
            let is_overflow = matches!(result, Err(CoercionError::Overflow { .. }));
            prop_assert!(is_overflow);
            prop_assert!(!Scalar::Int(v).fits(kind));
        }
    }

    #[test]
    fn prop_signed_into_unsigned((kind, max) in unsigned_kind(), v in any::<i64>()) {
        let registry = TypeRegistry::new();
        let result = coerce(&Scalar::Int(v), kind, &registry);
        match u64::try_from(v) {
            Ok(u) if u <= max => prop_assert_eq!(result.unwrap(), Scalar::UInt(u)),
            _ => prop_assert!(result.is_err()),
        }
    }

    #[test]
    fn prop_integer_text_round_trip(v in any::<i64>(), pad in "[ \t]{0,3}") {
        let registry = TypeRegistry::new();
        let text = coerce(&Scalar::Int(v), TerminalKind::Text, &registry).unwrap();
        let Scalar::Text(s) = text else {
            panic!("text coercion produced a non-text scalar");
        };
        let padded = Scalar::Text(format!("{pad}{s}{pad}"));
        prop_assert_eq!(coerce(&padded, TerminalKind::I64, &registry).unwrap(), Scalar::Int(v));
    }

    #[test]
    fn prop_wide_floats_overflow_f32(
        magnitude in (f64::from(f32::MAX) * 2.0)..1e300_f64,
        negative in any::<bool>(),
    ) {
        let registry = TypeRegistry::new();
        let v = if negative { -magnitude } else { magnitude };
        prop_assert!(!Scalar::Float(v).fits(TerminalKind::F32));
        let is_overflow = matches!(
            coerce(&Scalar::Float(v), TerminalKind::F32, &registry),
            Err(CoercionError::Overflow { .. })
        );
        prop_assert!(is_overflow);
        prop_assert_eq!(coerce(&Scalar::Float(v), TerminalKind::F64, &registry).unwrap(), Scalar::Float(v));
    }

    #[test]
    fn prop_blank_text_is_default_like(s in "[ \t\n]{0,8}") {
        prop_assert!(Scalar::Text(s).is_default_like());
    }
}

#[test]
fn every_zero_is_default_like_and_fits() {
    let kinds = [
        TerminalKind::Bool,
        TerminalKind::I8,
        TerminalKind::I16,
        TerminalKind::I32,
        TerminalKind::I64,
        TerminalKind::U8,
        TerminalKind::U16,
        TerminalKind::U32,
        TerminalKind::U64,
        TerminalKind::F32,
        TerminalKind::F64,
        TerminalKind::Char,
        TerminalKind::Text,
        TerminalKind::Decimal,
        TerminalKind::DateTime,
        TerminalKind::DateTimeOffset,
        TerminalKind::Duration,
        TerminalKind::Uuid,
    ];
    let failing: Vec<TerminalKind> = kinds
        .into_iter()
        .filter(|&kind| {
            let zero = Scalar::zero(kind);
            !(zero.is_default_like() && zero.fits(kind))
        })
        .collect();
    assert_eq!(failing, Vec::new());
}
