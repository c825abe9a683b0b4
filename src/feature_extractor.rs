//! Feature extraction for fraud model inference.
//!
//! Turns a [`Transaction`] into the numeric vector the scaler and classifier
//! were fitted on. The layout is fixed when the extractor is built from its
//! [`FeatureConfig`] and must match the feature names stored in the model
//! artifact.

use crate::config::FeatureConfig;
use crate::error::FeatureExtractionError;
use crate::types::transaction::Transaction;
use chrono::{DateTime, Datelike, NaiveDateTime, Timelike, Utc};
use std::collections::HashSet;

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse a transaction timestamp. Naive timestamps are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, FeatureExtractionError> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| FeatureExtractionError::InvalidTimestamp(raw.to_string()))
}

/// Feature extractor that transforms transactions into model input features.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    transaction_types: Vec<String>,
    high_risk_merchants: HashSet<String>,
    numeric_attributes: Vec<String>,
    night_start_hour: u32,
    night_end_hour: u32,
    feature_names: Vec<String>,
}

impl FeatureExtractor {
    /// Create a new feature extractor.
    pub fn new(config: &FeatureConfig) -> Self {
        let transaction_types: Vec<String> = config
            .transaction_types
            .iter()
            .map(|t| t.to_lowercase())
            .collect();

        let mut feature_names: Vec<String> = [
            "amount",
            "log_amount",
            "hour_of_day",
            "day_of_week",
            "is_weekend",
            "is_night",
            "has_location",
            "high_risk_merchant",
        ]
        .iter()
        .map(|n| n.to_string())
        .collect();
        feature_names.extend(transaction_types.iter().map(|t| format!("type_{}", t)));
        feature_names.push("type_other".to_string());
        feature_names.push("attribute_count".to_string());
        feature_names.extend(
            config
                .numeric_attributes
                .iter()
                .map(|a| format!("attr_{}", a)),
        );

        Self {
            transaction_types,
            high_risk_merchants: config.high_risk_merchants.iter().cloned().collect(),
            numeric_attributes: config.numeric_attributes.clone(),
            night_start_hour: config.night_start_hour,
            night_end_hour: config.night_end_hour,
            feature_names,
        }
    }

    /// Extract features from a transaction.
    ///
    /// Optional fields that are absent contribute `0.0`. Only the amount and
    /// timestamp can make extraction fail.
    pub fn extract(&self, tx: &Transaction) -> Result<Vec<f64>, FeatureExtractionError> {
        let amount = match tx.amount {
            None => return Err(FeatureExtractionError::MissingAmount),
            Some(a) if !a.is_finite() || a < 0.0 => {
                return Err(FeatureExtractionError::InvalidAmount(a))
            }
            Some(a) => a,
        };
        let timestamp = parse_timestamp(&tx.timestamp)?;

        let mut features = Vec::with_capacity(self.feature_count());

        // Amount (2)
        features.push(amount);
        features.push(amount.ln_1p());

        // Time of day / week (4)
        let hour = timestamp.hour();
        let weekday = timestamp.weekday().num_days_from_monday();
        features.push(hour as f64);
        features.push(weekday as f64);
        features.push(flag(weekday >= 5));
        features.push(flag(self.is_night(hour)));

        // Context (2)
        let has_location = tx
            .location
            .as_deref()
            .is_some_and(|l| !l.trim().is_empty());
        features.push(flag(has_location));
        features.push(flag(self.high_risk_merchants.contains(&tx.merchant_id)));

        // Transaction type one-hot, with a trailing "other" slot
        let tx_type = tx.transaction_type.trim().to_lowercase();
        let known = self.transaction_types.iter().position(|t| *t == tx_type);
        for i in 0..self.transaction_types.len() {
            features.push(flag(known == Some(i)));
        }
        features.push(flag(known.is_none()));

        // Additional attributes
        let data = tx.additional_data.as_ref();
        features.push(data.map_or(0, |d| d.len()) as f64);
        for key in &self.numeric_attributes {
            let value = data
                .and_then(|d| d.get(key))
                .and_then(|v| v.as_f64())
                .unwrap_or(0.0);
            features.push(value);
        }

        debug_assert_eq!(features.len(), self.feature_names.len());
        Ok(features)
    }

    fn is_night(&self, hour: u32) -> bool {
        if self.night_start_hour <= self.night_end_hour {
            hour >= self.night_start_hour && hour < self.night_end_hour
        } else {
            hour >= self.night_start_hour || hour < self.night_end_hour
        }
    }

    /// Get the number of features produced.
    pub fn feature_count(&self) -> usize {
        self.feature_names.len()
    }

    /// Get feature names in vector order.
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new(&FeatureConfig::default())
    }
}

fn flag(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::transaction::AttributeValue;

    fn sample() -> Transaction {
        Transaction::new(9999.99, "2024-01-01T00:00:00", "M1", "4111111111111111", "online")
    }

    #[test]
    fn test_feature_extraction() {
        let extractor = FeatureExtractor::default();
        let features = extractor.extract(&sample()).unwrap();

        assert_eq!(features.len(), extractor.feature_count());
        assert_eq!(features[0], 9999.99); // amount
        assert!((features[1] - 9999.99f64.ln_1p()).abs() < 1e-12);
        assert_eq!(features[2], 0.0); // midnight
        assert_eq!(features[3], 0.0); // 2024-01-01 was a Monday
        assert_eq!(features[4], 0.0); // weekday
        assert_eq!(features[5], 1.0); // night
        assert_eq!(features[6], 0.0); // no location
        assert_eq!(features[8], 1.0); // type_online
        assert_eq!(features[12], 0.0); // type_other
        assert_eq!(features[13], 0.0); // no attributes
    }

    #[test]
    fn test_feature_names() {
        let extractor = FeatureExtractor::default();
        let names = extractor.feature_names();

        assert_eq!(names.len(), 14);
        assert_eq!(names[0], "amount");
        assert_eq!(names[8], "type_online");
        assert_eq!(names[12], "type_other");
        assert_eq!(names[13], "attribute_count");
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let extractor = FeatureExtractor::default();
        let tx = sample()
            .with_location("Berlin")
            .with_attribute("device", AttributeValue::Text("mobile".to_string()));

        assert_eq!(extractor.extract(&tx).unwrap(), extractor.extract(&tx).unwrap());
    }

    #[test]
    fn test_missing_amount() {
        let extractor = FeatureExtractor::default();
        let mut tx = sample();
        tx.amount = None;

        assert_eq!(extractor.extract(&tx), Err(FeatureExtractionError::MissingAmount));
    }

    #[test]
    fn test_invalid_amount() {
        let extractor = FeatureExtractor::default();
        for bad in [-1.0, f64::NAN, f64::INFINITY] {
            let mut tx = sample();
            tx.amount = Some(bad);
            assert!(matches!(
                extractor.extract(&tx),
                Err(FeatureExtractionError::InvalidAmount(_))
            ));
        }
    }

    #[test]
    fn test_invalid_timestamp() {
        let extractor = FeatureExtractor::default();
        let mut tx = sample();
        tx.timestamp = "yesterday".to_string();

        assert_eq!(
            extractor.extract(&tx),
            Err(FeatureExtractionError::InvalidTimestamp("yesterday".to_string()))
        );
    }

    #[test]
    fn test_timestamp_formats() {
        let expected = parse_timestamp("2024-03-09T14:30:00").unwrap();
        assert_eq!(parse_timestamp("2024-03-09T14:30:00Z").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-03-09 14:30:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-03-09T16:30:00+02:00").unwrap(), expected);
        assert!(parse_timestamp("2024-03-09T14:30:00.250").is_ok());
    }

    #[test]
    fn test_unknown_type_and_configured_attributes() {
        let config = FeatureConfig {
            high_risk_merchants: vec!["M1".to_string()],
            numeric_attributes: vec!["attempts".to_string(), "vpn".to_string(), "score".to_string()],
            ..FeatureConfig::default()
        };
        let extractor = FeatureExtractor::new(&config);
        let mut tx = sample()
            .with_attribute("attempts", AttributeValue::Number(3.0))
            .with_attribute("vpn", AttributeValue::Bool(true))
            .with_attribute("score", AttributeValue::Text("n/a".to_string()));
        tx.transaction_type = "Crypto".to_string();
        tx.timestamp = "2024-01-06T12:00:00".to_string(); // Saturday noon

        let features = extractor.extract(&tx).unwrap();
        let names = extractor.feature_names();
        let value = |name: &str| features[names.iter().position(|n| n == name).unwrap()];

        assert_eq!(features.len(), 17);
        assert_eq!(value("high_risk_merchant"), 1.0);
        assert_eq!(value("type_other"), 1.0);
        assert_eq!(value("type_online"), 0.0);
        assert_eq!(value("is_weekend"), 1.0);
        assert_eq!(value("is_night"), 0.0);
        assert_eq!(value("attribute_count"), 3.0);
        assert_eq!(value("attr_attempts"), 3.0);
        assert_eq!(value("attr_vpn"), 1.0);
        assert_eq!(value("attr_score"), 0.0);
    }

    #[test]
    fn test_nested_attribute_counts_but_reads_as_zero() {
        let config = FeatureConfig {
            numeric_attributes: vec!["device".to_string()],
            ..FeatureConfig::default()
        };
        let extractor = FeatureExtractor::new(&config);
        let tx = sample()
            .with_attribute("device", AttributeValue::Nested)
            .with_attribute("vpn", AttributeValue::Bool(false));

        let features = extractor.extract(&tx).unwrap();
        let names = extractor.feature_names();
        let value = |name: &str| features[names.iter().position(|n| n == name).unwrap()];

        assert_eq!(value("attribute_count"), 2.0);
        assert_eq!(value("attr_device"), 0.0);
    }
}
