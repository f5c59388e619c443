//! Decimal-string encoding for `f64` fields.
//!
//! The persistence layer stores every numeric field as a decimal string. Rust's
//! `Display` for `f64` emits the shortest string that parses back to the same
//! bits, so a write/read cycle is exact. Readers also accept plain JSON numbers.

use serde::de::{self, Deserializer, Visitor};
use serde::ser::{SerializeSeq, Serializer};
use std::fmt;

pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    deserializer.deserialize_any(DecimalVisitor)
}

/// Parse a decimal string, trimming surrounding whitespace.
pub fn parse(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok()
}

struct DecimalVisitor;

impl<'de> Visitor<'de> for DecimalVisitor {
    type Value = f64;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a decimal string or number")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<f64, E> {
        parse(v).ok_or_else(|| E::custom(format!("invalid decimal '{}'", v)))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<f64, E> {
        Ok(v)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<f64, E> {
        Ok(v as f64)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<f64, E> {
        Ok(v as f64)
    }
}

pub mod option {
    use super::*;
    use serde::Deserialize;

    pub fn serialize<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.collect_str(v),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
        #[derive(Deserialize)]
        struct Wrapper(#[serde(with = "super")] f64);

        Ok(Option::<Wrapper>::deserialize(deserializer)?.map(|w| w.0))
    }
}

pub mod rows {
    use super::*;
    use serde::Deserialize;

    pub fn serialize<S: Serializer>(values: &[f64; 9], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(values.len()))?;
        for v in values {
            seq.serialize_element(&v.to_string())?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[f64; 9], D::Error> {
        #[derive(Deserialize)]
        struct Wrapper(#[serde(with = "super")] f64);

        let items = Vec::<Wrapper>::deserialize(deserializer)?;
        if items.len() != 9 {
            return Err(de::Error::invalid_length(items.len(), &"9 matrix entries"));
        }
        let mut out = [0.0; 9];
        for (slot, item) in out.iter_mut().zip(items) {
            *slot = item.0;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Probe {
        #[serde(with = "super")]
        value: f64,
        #[serde(with = "super::option")]
        maybe: Option<f64>,
    }

    #[test]
    fn test_written_as_string() {
        let json = serde_json::to_string(&Probe { value: 0.1, maybe: None }).unwrap();
        assert_eq!(json, r#"{"value":"0.1","maybe":null}"#);
    }

    #[test]
    fn test_exact_bits_survive() {
        let tricky = 10.538_461_538_461_538_f64 / 3.0;
        let json = serde_json::to_string(&Probe { value: tricky, maybe: Some(1e-9) }).unwrap();
        let back: Probe = serde_json::from_str(&json).unwrap();
        assert_eq!(back.value.to_bits(), tricky.to_bits());
        assert_eq!(back.maybe, Some(1e-9));
    }

    #[test]
    fn test_accepts_numbers_and_rejects_garbage() {
        let back: Probe = serde_json::from_str(r#"{"value":2.5,"maybe":"3"}"#).unwrap();
        assert_eq!(back.value, 2.5);
        assert_eq!(back.maybe, Some(3.0));
        assert!(serde_json::from_str::<Probe>(r#"{"value":"abc","maybe":null}"#).is_err());
    }
}
