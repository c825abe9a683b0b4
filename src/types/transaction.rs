//! Transaction data structures for card fraud scoring

use serde::de::{self, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Card number as supplied by the upstream API.
///
/// Never printed: `Debug` and `Display` only show the last four digits.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardNumber(String);

impl CardNumber {
    pub fn new(number: impl Into<String>) -> Self {
        Self(number.into())
    }

    /// Last four characters, for display in masked form.
    pub fn last4(&self) -> &str {
        let start = self
            .0
            .char_indices()
            .rev()
            .nth(3)
            .map(|(i, _)| i)
            .unwrap_or(0);
        &self.0[start..]
    }
}

impl fmt::Debug for CardNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CardNumber(****{})", self.last4())
    }
}

impl fmt::Display for CardNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "****{}", self.last4())
    }
}

/// Value of a free-form transaction attribute.
///
/// Objects and arrays are accepted as [`AttributeValue::Nested`]; their
/// contents are discarded and serialize back as `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    Nested,
}

struct AttributeValueVisitor;

impl<'de> Visitor<'de> for AttributeValueVisitor {
    type Value = AttributeValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an attribute value")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(AttributeValue::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(AttributeValue::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_any(self)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
        Ok(AttributeValue::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Ok(AttributeValue::Number(v as f64))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(AttributeValue::Number(v as f64))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        Ok(AttributeValue::Number(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Ok(AttributeValue::Text(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
        Ok(AttributeValue::Text(v))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        while seq.next_element::<IgnoredAny>()?.is_some() {}
        Ok(AttributeValue::Nested)
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        while map.next_entry::<IgnoredAny, IgnoredAny>()?.is_some() {}
        Ok(AttributeValue::Nested)
    }
}

impl<'de> Deserialize<'de> for AttributeValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(AttributeValueVisitor)
    }
}

impl AttributeValue {
    /// Numeric reading of the attribute; `None` when it has no numeric meaning.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Null | AttributeValue::Nested => None,
            AttributeValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            AttributeValue::Number(n) if n.is_finite() => Some(*n),
            AttributeValue::Number(_) => None,
            AttributeValue::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        }
    }
}

/// A card transaction submitted for fraud scoring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Upstream-assigned identifier, passed through untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,

    /// Transaction amount; required for scoring
    #[serde(default)]
    pub amount: Option<f64>,

    /// Point in time of the transaction (RFC 3339 or naive ISO-8601, UTC)
    pub timestamp: String,

    /// Merchant identifier
    pub merchant_id: String,

    /// Card number (sensitive)
    pub card_number: CardNumber,

    /// Transaction channel, e.g. "online", "in_store", "atm"
    pub transaction_type: String,

    /// Free-form location
    #[serde(default)]
    pub location: Option<String>,

    /// Additional attributes supplied by the upstream API
    #[serde(default)]
    pub additional_data: Option<BTreeMap<String, AttributeValue>>,
}

impl Transaction {
    /// Create a new transaction with required fields
    pub fn new(
        amount: f64,
        timestamp: impl Into<String>,
        merchant_id: impl Into<String>,
        card_number: impl Into<String>,
        transaction_type: impl Into<String>,
    ) -> Self {
        Self {
            transaction_id: None,
            amount: Some(amount),
            timestamp: timestamp.into(),
            merchant_id: merchant_id.into(),
            card_number: CardNumber::new(card_number),
            transaction_type: transaction_type.into(),
            location: None,
            additional_data: None,
        }
    }

    pub fn with_id(mut self, transaction_id: impl Into<String>) -> Self {
        self.transaction_id = Some(transaction_id.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: AttributeValue) -> Self {
        self.additional_data
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value);
        self
    }
}
