//! Conversion options

use crate::error::ConvertError;
use crate::normalizer::MS_PER_SECOND;
use serde::{Deserialize, Serialize};

/// Default marker written for cells a task does not populate
pub const NOT_APPLICABLE: &str = "n/a";

/// Options controlling unit conversion and output encoding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertOptions {
    /// Log time units per second
    pub unit_divisor: f64,
    /// TSV marker for not-applicable cells
    pub not_applicable: String,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            unit_divisor: MS_PER_SECOND,
            not_applicable: NOT_APPLICABLE.to_string(),
        }
    }
}

impl ConvertOptions {
    /// Load options from JSON; absent keys keep their defaults
    pub fn from_json(json: &str) -> Result<Self, ConvertError> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    pub fn to_json(&self) -> Result<String, ConvertError> {
        serde_json::to_string_pretty(self).map_err(ConvertError::JsonError)
    }

    fn validate(&self) -> Result<(), ConvertError> {
        if !(self.unit_divisor.is_finite() && self.unit_divisor > 0.0) {
            return Err(ConvertError::ParseError(format!(
                "unit_divisor must be positive, got {}",
                self.unit_divisor
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ConvertOptions::default();
        assert_eq!(options.unit_divisor, 1000.0);
        assert_eq!(options.not_applicable, "n/a");
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let options = ConvertOptions::from_json(r#"{"not_applicable": "NA"}"#).unwrap();
        assert_eq!(options.not_applicable, "NA");
        assert_eq!(options.unit_divisor, 1000.0);
    }

    #[test]
    fn test_rejects_non_positive_divisor() {
        assert!(ConvertOptions::from_json(r#"{"unit_divisor": 0}"#).is_err());
    }

    #[test]
    fn test_json_roundtrip() {
        let options = ConvertOptions {
            unit_divisor: 1.0,
            not_applicable: String::new(),
        };
        let restored = ConvertOptions::from_json(&options.to_json().unwrap()).unwrap();
        assert_eq!(restored, options);
    }
}
