//! Usage-count metafield value with its two coexisting wire encodings.
//!
//! Older customers carry a bare stringified integer ("3"); newer ones carry a
//! JSON object with a `total` field. Both normalize to a plain integer, and
//! writes preserve whichever encoding was already present for a customer.

use serde::{Deserialize, Serialize};

/// Wire encoding of the usage-count field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaEncoding {
    /// Bare integer-as-string, e.g. `"3"`
    Legacy,
    /// JSON object with a `total` field, e.g. `{"total": 3}`
    Structured,
}

/// Structured payload variant of the usage-count field
#[derive(Debug, Serialize, Deserialize)]
struct StructuredQuota {
    total: i64,
}

/// A decoded usage-count field value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaValue {
    pub total: i64,
    pub encoding: QuotaEncoding,
}

/// Error decoding a usage-count field
#[derive(Debug, thiserror::Error)]
#[error("unrecognized usage-count value: {0}")]
pub struct QuotaParseError(String);

impl QuotaValue {
    /// A fresh quota in the legacy encoding, used when a customer has no field yet
    pub fn fresh() -> Self {
        Self {
            total: 0,
            encoding: QuotaEncoding::Legacy,
        }
    }

    /// Decodes a raw metafield value in either encoding
    pub fn parse(raw: &str) -> Result<Self, QuotaParseError> {
        let trimmed = raw.trim();

        if let Ok(total) = trimmed.parse::<i64>() {
            return Ok(Self {
                total,
                encoding: QuotaEncoding::Legacy,
            });
        }

        if let Ok(structured) = serde_json::from_str::<StructuredQuota>(trimmed) {
            return Ok(Self {
                total: structured.total,
                encoding: QuotaEncoding::Structured,
            });
        }

        Err(QuotaParseError(raw.to_string()))
    }

    /// Decodes an optional raw value; an absent field reads as a fresh quota
    pub fn parse_opt(raw: Option<&str>) -> Result<Self, QuotaParseError> {
        match raw {
            Some(raw) => Self::parse(raw),
            None => Ok(Self::fresh()),
        }
    }

    /// Returns the same value with a new total, keeping the encoding
    pub fn with_total(&self, total: i64) -> Self {
        Self {
            total,
            encoding: self.encoding,
        }
    }

    /// Encodes back to the wire format this value was read in
    pub fn to_wire(&self) -> String {
        match self.encoding {
            QuotaEncoding::Legacy => self.total.to_string(),
            QuotaEncoding::Structured => {
                serde_json::to_string(&StructuredQuota { total: self.total })
                    .expect("structured quota serialization should not fail")
            }
        }
    }
}

/// Whether one more generation is allowed at this usage level
pub fn is_allowed(count: i64, limit: i64) -> bool {
    count < limit
}
