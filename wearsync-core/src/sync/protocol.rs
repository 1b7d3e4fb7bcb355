//! Wire format for the weather record.
//!
//! The record travels as a flat map of primitive values stored under a
//! single data item path. Key names are the ones both devices agree on;
//! unknown keys are ignored on decode so either side can add fields.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::error::DecodeError;
use crate::models::SyncRecord;

/// Data item path of the one synchronized record.
pub const WEATHER_TOPIC: &str = "/wear";

/// Keys of the record schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireKey {
    Time,
    TempMax,
    TempMin,
    WeatherId,
}

impl WireKey {
    /// All keys, in the order `decode` checks them.
    pub const ALL: [WireKey; 4] = [
        WireKey::Time,
        WireKey::TempMax,
        WireKey::TempMin,
        WireKey::WeatherId,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WireKey::Time => "time",
            WireKey::TempMax => "KEY_TEMP_MAX",
            WireKey::TempMin => "KEY_TEMP_MIN",
            WireKey::WeatherId => "KEY_WEATHER_ID",
        }
    }
}

impl fmt::Display for WireKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A primitive value in a wire map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum WireValue {
    Str(String),
    Int(i32),
    Long(i64),
}

/// Key/value payload as the transport stores it.
pub type WireMap = BTreeMap<String, WireValue>;

/// Encodes a record into its wire map.
pub fn encode(record: &SyncRecord) -> WireMap {
    let mut map = WireMap::new();
    map.insert(
        WireKey::Time.as_str().to_string(),
        WireValue::Long(record.timestamp),
    );
    map.insert(
        WireKey::TempMax.as_str().to_string(),
        WireValue::Str(record.temp_max_display.clone()),
    );
    map.insert(
        WireKey::TempMin.as_str().to_string(),
        WireValue::Str(record.temp_min_display.clone()),
    );
    map.insert(
        WireKey::WeatherId.as_str().to_string(),
        WireValue::Int(record.condition_code),
    );
    map
}

/// Decodes a wire map into a record.
///
/// Keys are checked in [`WireKey::ALL`] order and the first problem wins.
pub fn decode(map: &WireMap) -> Result<SyncRecord, DecodeError> {
    let timestamp = match field(map, WireKey::Time)? {
        WireValue::Long(v) => *v,
        _ => return Err(DecodeError::TypeMismatch(WireKey::Time)),
    };
    let temp_max_display = string_field(map, WireKey::TempMax)?;
    let temp_min_display = string_field(map, WireKey::TempMin)?;
    let condition_code = match field(map, WireKey::WeatherId)? {
        WireValue::Int(v) => *v,
        _ => return Err(DecodeError::TypeMismatch(WireKey::WeatherId)),
    };

    Ok(SyncRecord {
        timestamp,
        temp_max_display,
        temp_min_display,
        condition_code,
    })
}

fn field(map: &WireMap, key: WireKey) -> Result<&WireValue, DecodeError> {
    map.get(key.as_str())
        .ok_or(DecodeError::MissingField(key))
}

fn string_field(map: &WireMap, key: WireKey) -> Result<String, DecodeError> {
    match field(map, key)? {
        WireValue::Str(s) => Ok(s.clone()),
        _ => Err(DecodeError::TypeMismatch(key)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SyncRecord {
        SyncRecord::new(1, "20°", "10°", 800)
    }

    #[test]
    fn test_encode_uses_fixed_keys() {
        let map = encode(&sample());

        assert_eq!(map.len(), 4);
        assert_eq!(map.get("time"), Some(&WireValue::Long(1)));
        assert_eq!(
            map.get("KEY_TEMP_MAX"),
            Some(&WireValue::Str("20°".to_string()))
        );
        assert_eq!(
            map.get("KEY_TEMP_MIN"),
            Some(&WireValue::Str("10°".to_string()))
        );
        assert_eq!(map.get("KEY_WEATHER_ID"), Some(&WireValue::Int(800)));
    }

    #[test]
    fn test_encode_decode() {
        let record = SyncRecord::new(i64::MAX, "-12°", "", -1);
        assert_eq!(decode(&encode(&record)).unwrap(), record);
    }

    #[test]
    fn test_decode_reports_the_missing_key() {
        for key in WireKey::ALL {
            let mut map = encode(&sample());
            map.remove(key.as_str());

            assert_eq!(decode(&map), Err(DecodeError::MissingField(key)));
        }
    }

    #[test]
    fn test_decode_type_mismatch() {
        let mut map = encode(&sample());
        map.insert("time".to_string(), WireValue::Int(1));
        assert_eq!(
            decode(&map),
            Err(DecodeError::TypeMismatch(WireKey::Time))
        );

        let mut map = encode(&sample());
        map.insert("KEY_TEMP_MIN".to_string(), WireValue::Long(10));
        assert_eq!(
            decode(&map),
            Err(DecodeError::TypeMismatch(WireKey::TempMin))
        );

        let mut map = encode(&sample());
        map.insert("KEY_WEATHER_ID".to_string(), WireValue::Str("800".into()));
        assert_eq!(
            decode(&map),
            Err(DecodeError::TypeMismatch(WireKey::WeatherId))
        );
    }

    #[test]
    fn test_decode_ignores_unknown_keys() {
        let mut map = encode(&sample());
        map.insert("KEY_HUMIDITY".to_string(), WireValue::Int(40));
        map.insert("KEY_STRING".to_string(), WireValue::Str("hi".into()));

        assert_eq!(decode(&map).unwrap(), sample());
    }

    #[test]
    fn test_decode_empty_map() {
        assert_eq!(
            decode(&WireMap::new()),
            Err(DecodeError::MissingField(WireKey::Time))
        );
    }

    #[test]
    fn test_wire_value_json_shape() {
        let json = serde_json::to_string(&WireValue::Long(5)).unwrap();
        assert_eq!(json, r#"{"type":"long","value":5}"#);

        let parsed: WireValue = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, WireValue::Long(5));
    }
}
