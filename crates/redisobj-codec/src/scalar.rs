use crate::error::{CodecError, CodecResult};
use crate::kind::ScalarKind;

/// A primitive value with a lossless string wire encoding.
///
/// Implementations must satisfy the round-trip law
/// `T::decode(&v.encode()?)? == v` for every value they accept, and must
/// decode the empty string to their zero value (strings excepted, where the
/// empty string is itself the zero value).
///
/// User-defined newtypes can implement this trait with
/// [`ScalarKind::Custom`] to be stored as scalar fields, list elements, or
/// map keys and values.
pub trait Scalar: Sized + Send + Sync + 'static {
    /// The kind recorded in compiled plans.
    const KIND: ScalarKind;

    /// Encode to the wire representation.
    fn encode(&self) -> CodecResult<String>;

    /// Decode from the wire representation.
    fn decode(wire: &str) -> CodecResult<Self>;
}

macro_rules! integer_scalar {
    ($($ty:ty => $kind:ident),* $(,)?) => {$(
        impl Scalar for $ty {
            const KIND: ScalarKind = ScalarKind::$kind;

            fn encode(&self) -> CodecResult<String> {
                Ok(self.to_string())
            }

            fn decode(wire: &str) -> CodecResult<Self> {
                if wire.is_empty() {
                    return Ok(0);
                }
                wire.parse::<$ty>()
                    .map_err(|e| CodecError::decode(Self::KIND, wire, e))
            }
        }
    )*};
}

integer_scalar! {
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    i128 => I128,
    isize => Isize,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    u128 => U128,
    usize => Usize,
}

// `Display` for floats prints the shortest decimal that parses back to the
// same bits, without an exponent.
macro_rules! float_scalar {
    ($($ty:ty => $kind:ident),* $(,)?) => {$(
        impl Scalar for $ty {
            const KIND: ScalarKind = ScalarKind::$kind;

            fn encode(&self) -> CodecResult<String> {
                Ok(self.to_string())
            }

            fn decode(wire: &str) -> CodecResult<Self> {
                if wire.is_empty() {
                    return Ok(0.0);
                }
                wire.parse::<$ty>()
                    .map_err(|e| CodecError::decode(Self::KIND, wire, e))
            }
        }
    )*};
}

float_scalar! {
    f32 => F32,
    f64 => F64,
}

impl Scalar for bool {
    const KIND: ScalarKind = ScalarKind::Bool;

    fn encode(&self) -> CodecResult<String> {
        Ok(if *self { "true" } else { "false" }.to_string())
    }

    fn decode(wire: &str) -> CodecResult<Self> {
        match wire {
            "" => Ok(false),
            "true" | "TRUE" | "True" | "t" | "T" | "1" => Ok(true),
            "false" | "FALSE" | "False" | "f" | "F" | "0" => Ok(false),
            other => Err(CodecError::decode(Self::KIND, other, "not a boolean")),
        }
    }
}

impl Scalar for char {
    const KIND: ScalarKind = ScalarKind::Char;

    fn encode(&self) -> CodecResult<String> {
        Ok(self.to_string())
    }

    fn decode(wire: &str) -> CodecResult<Self> {
        let mut chars = wire.chars();
        match (chars.next(), chars.next()) {
            (None, _) => Ok('\0'),
            (Some(c), None) => Ok(c),
            (Some(_), Some(_)) => Err(CodecError::decode(
                Self::KIND,
                wire,
                "expected exactly one character",
            )),
        }
    }
}

impl Scalar for String {
    const KIND: ScalarKind = ScalarKind::String;

    fn encode(&self) -> CodecResult<String> {
        Ok(self.clone())
    }

    fn decode(wire: &str) -> CodecResult<Self> {
        Ok(wire.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn round_trip<T: Scalar + PartialEq + std::fmt::Debug>(value: T) {
        let wire = value.encode().unwrap();
        assert_eq!(T::decode(&wire).unwrap(), value, "wire form {wire:?}");
    }

    // -----------------------------------------------------------------------
    // Round-trip laws
    // -----------------------------------------------------------------------

    proptest! {
        #[test]
        fn signed_integers_round_trip(a: i8, b: i16, c: i32, d: i64, e: i128, f: isize) {
            round_trip(a);
            round_trip(b);
            round_trip(c);
            round_trip(d);
            round_trip(e);
            round_trip(f);
        }

        #[test]
        fn unsigned_integers_round_trip(a: u8, b: u16, c: u32, d: u64, e: u128, f: usize) {
            round_trip(a);
            round_trip(b);
            round_trip(c);
            round_trip(d);
            round_trip(e);
            round_trip(f);
        }

        #[test]
        fn f64_round_trips_bit_exact(v in any::<f64>().prop_filter("finite", |v| v.is_finite())) {
            let decoded = f64::decode(&v.encode().unwrap()).unwrap();
            prop_assert_eq!(decoded.to_bits(), v.to_bits());
        }

        #[test]
        fn f32_round_trips_bit_exact(v in any::<f32>().prop_filter("finite", |v| v.is_finite())) {
            let decoded = f32::decode(&v.encode().unwrap()).unwrap();
            prop_assert_eq!(decoded.to_bits(), v.to_bits());
        }

        #[test]
        fn strings_are_identity(s in ".*") {
            prop_assert_eq!(s.encode().unwrap(), s.clone());
            prop_assert_eq!(String::decode(&s).unwrap(), s);
        }

        #[test]
        fn chars_round_trip(c: char) {
            round_trip(c);
        }
    }

    #[test]
    fn booleans_round_trip() {
        round_trip(true);
        round_trip(false);
        assert_eq!(true.encode().unwrap(), "true");
        assert_eq!(false.encode().unwrap(), "false");
    }

    #[test]
    fn zero_values_round_trip() {
        round_trip(0i32);
        round_trip(0u64);
        round_trip(0.0f64);
        round_trip(String::new());
    }

    #[test]
    fn float_encoding_has_no_exponent() {
        assert_eq!(0.1f64.encode().unwrap(), "0.1");
        assert_eq!(1.5f32.encode().unwrap(), "1.5");
        assert_eq!(1e21f64.encode().unwrap(), "1000000000000000000000");
    }

    #[test]
    fn infinities_round_trip() {
        round_trip(f64::INFINITY);
        round_trip(f32::NEG_INFINITY);
    }

    // -----------------------------------------------------------------------
    // Empty-string decoding
    // -----------------------------------------------------------------------

    #[test]
    fn empty_string_decodes_to_zero() {
        assert_eq!(i8::decode("").unwrap(), 0);
        assert_eq!(i64::decode("").unwrap(), 0);
        assert_eq!(u128::decode("").unwrap(), 0);
        assert_eq!(usize::decode("").unwrap(), 0);
        assert_eq!(f32::decode("").unwrap(), 0.0);
        assert_eq!(f64::decode("").unwrap(), 0.0);
        assert!(!bool::decode("").unwrap());
        assert_eq!(char::decode("").unwrap(), '\0');
        assert_eq!(String::decode("").unwrap(), "");
    }

    // -----------------------------------------------------------------------
    // Rejections
    // -----------------------------------------------------------------------

    #[test]
    fn out_of_range_integer_is_rejected() {
        let err = u8::decode("256").unwrap_err();
        assert_eq!(err.kind(), ScalarKind::U8);
        assert!(i8::decode("-129").is_err());
        assert!(u32::decode("-1").is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(i32::decode("twelve").is_err());
        assert!(f64::decode("1.2.3").is_err());
        assert!(bool::decode("yes").is_err());
        assert!(char::decode("ab").is_err());
    }

    #[test]
    fn alternate_boolean_spellings_decode() {
        for wire in ["1", "t", "T", "TRUE", "True", "true"] {
            assert!(bool::decode(wire).unwrap(), "{wire}");
        }
        for wire in ["0", "f", "F", "FALSE", "False", "false"] {
            assert!(!bool::decode(wire).unwrap(), "{wire}");
        }
    }

    #[test]
    fn decode_error_names_kind_and_value() {
        let err = i16::decode("abc").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("invalid field type"));
        assert!(msg.contains("i16"));
        assert!(msg.contains("\"abc\""));
    }

    // -----------------------------------------------------------------------
    // Custom scalars
    // -----------------------------------------------------------------------

    #[derive(Debug, PartialEq)]
    struct Percent(u8);

    impl Scalar for Percent {
        const KIND: ScalarKind = ScalarKind::Custom("percent");

        fn encode(&self) -> CodecResult<String> {
            if self.0 > 100 {
                return Err(CodecError::encode(Self::KIND, "above 100"));
            }
            Ok(format!("{}%", self.0))
        }

        fn decode(wire: &str) -> CodecResult<Self> {
            if wire.is_empty() {
                return Ok(Percent(0));
            }
            let digits = wire
                .strip_suffix('%')
                .ok_or_else(|| CodecError::decode(Self::KIND, wire, "missing '%'"))?;
            u8::decode(digits)
                .map(Percent)
                .map_err(|_| CodecError::decode(Self::KIND, wire, "not a percentage"))
        }
    }

    #[test]
    fn custom_scalar_round_trips_and_rejects() {
        round_trip(Percent(42));
        let err = Percent(101).encode().unwrap_err();
        assert_eq!(err.kind(), ScalarKind::Custom("percent"));
        assert!(Percent::decode("42").is_err());
    }
}
