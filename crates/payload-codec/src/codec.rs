//! Wire Serialization

use crate::CodecError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::trace;

/// Serialization used for frame payloads. Both peers must agree on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    /// Compact binary (postcard)
    #[default]
    Postcard,
    /// UTF-8 JSON text
    Json,
}

impl WireFormat {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            WireFormat::Postcard => "postcard",
            WireFormat::Json => "json",
        }
    }

    /// Serialize a value into a payload
    pub fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        let bytes = match self {
            WireFormat::Postcard => postcard::to_allocvec(value).map_err(|e| e.to_string()),
            WireFormat::Json => serde_json::to_vec(value).map_err(|e| e.to_string()),
        }
        .map_err(|reason| CodecError::Encode {
            format: self.as_str(),
            reason,
        })?;

        trace!("Encoded {} payload: {} bytes", self.as_str(), bytes.len());
        Ok(bytes)
    }

    /// Deserialize a payload. Trailing bytes are rejected.
    pub fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        let decoded = match self {
            WireFormat::Postcard => match postcard::take_from_bytes::<T>(bytes) {
                Ok((value, [])) => Ok(value),
                Ok((_, rest)) => Err(format!("{} trailing bytes", rest.len())),
                Err(e) => Err(e.to_string()),
            },
            WireFormat::Json => serde_json::from_slice(bytes).map_err(|e| e.to_string()),
        };

        decoded.map_err(|reason| CodecError::Decode {
            format: self.as_str(),
            reason,
        })
    }
}

impl FromStr for WireFormat {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postcard" => Ok(WireFormat::Postcard),
            "json" => Ok(WireFormat::Json),
            other => Err(CodecError::UnknownFormat(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FeatureVector, Prediction};
    use proptest::prelude::*;

    const FORMATS: [WireFormat; 2] = [WireFormat::Postcard, WireFormat::Json];

    #[test]
    fn test_json_payload_is_plain_array() {
        let features = FeatureVector::new(vec![0.1, 0.2, 0.3]);
        let bytes = WireFormat::Json.encode(&features).unwrap();
        assert_eq!(bytes, b"[0.1,0.2,0.3]".to_vec());
    }

    #[test]
    fn test_corrupt_payload_rejected() {
        let err = WireFormat::Json.decode::<FeatureVector>(b"[0.1,").unwrap_err();
        assert!(matches!(err, CodecError::Decode { format: "json", .. }));

        // Class tag out of range for the enum
        let err = WireFormat::Postcard.decode::<Prediction>(&[9, 1]).unwrap_err();
        assert!(matches!(err, CodecError::Decode { format: "postcard", .. }));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut bytes = WireFormat::Postcard.encode(&Prediction::Class(7)).unwrap();
        bytes.push(0);
        assert!(WireFormat::Postcard.decode::<Prediction>(&bytes).is_err());
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("JSON".parse::<WireFormat>().unwrap(), WireFormat::Json);
        assert_eq!("postcard".parse::<WireFormat>().unwrap(), WireFormat::Postcard);
        assert!("pickle".parse::<WireFormat>().is_err());
    }

    #[test]
    fn test_json_refuses_non_finite_values() {
        let features = FeatureVector::new(vec![0.1, f64::NAN, f64::INFINITY]);
        let err = WireFormat::Json.encode(&features).unwrap_err();
        assert!(matches!(err, CodecError::Encode { format: "json", .. }));

        let err = WireFormat::Json.encode(&Prediction::Value(f64::INFINITY)).unwrap_err();
        assert!(matches!(err, CodecError::Encode { format: "json", .. }));

        // Finite values in the same types still encode
        assert!(WireFormat::Json.encode(&Prediction::Value(1.5)).is_ok());
    }

    #[test]
    fn test_postcard_carries_non_finite_values() {
        let bytes = WireFormat::Postcard.encode(&Prediction::Value(f64::NEG_INFINITY)).unwrap();
        assert_eq!(
            WireFormat::Postcard.decode::<Prediction>(&bytes).unwrap(),
            Prediction::Value(f64::NEG_INFINITY)
        );

        let features = FeatureVector::new(vec![0.1, f64::NAN]);
        let bytes = WireFormat::Postcard.encode(&features).unwrap();
        let decoded: FeatureVector = WireFormat::Postcard.decode(&bytes).unwrap();
        assert_eq!(decoded.values()[0], 0.1);
        assert!(decoded.values()[1].is_nan());
    }

    proptest! {
        #[test]
        fn prop_feature_vector_round_trip(values in proptest::collection::vec(-1.0e9f64..1.0e9, 0..64)) {
            let features = FeatureVector::new(values);
            for format in FORMATS {
                let bytes = format.encode(&features).unwrap();
                prop_assert_eq!(format.decode::<FeatureVector>(&bytes).unwrap(), features.clone());
            }
        }

        #[test]
        fn prop_prediction_round_trip(code in any::<i64>(), value in -1.0e9f64..1.0e9) {
            for format in FORMATS {
                for prediction in [Prediction::Class(code), Prediction::Value(value)] {
                    let bytes = format.encode(&prediction).unwrap();
                    prop_assert_eq!(format.decode::<Prediction>(&bytes).unwrap(), prediction);
                }
            }
        }
    }
}
