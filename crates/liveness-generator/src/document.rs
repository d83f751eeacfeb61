//! Synthetic document model.
//!
//! Union-typed fields (`contact`, `rating`, `lastSeen`, `attrs.a`) are
//! explicit enums serialized untagged, so the stored value takes the shape of
//! whichever variant was chosen at synthesis time.

use bson::{Binary, DateTime, Document};
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use std::str::FromStr;

/// A generated document.
///
/// The mandatory fields are always present; `body` carries either the
/// enriched nested fields or the minimal fallback field.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticDocument {
    /// Dense integer key in `[0, total_docs)`.
    pub k: i64,
    /// Synthesis time.
    pub ts: DateTime,
    /// Counter incremented by upserts; always 0 at synthesis.
    pub n: i64,
    /// Shard-routing code.
    pub location: String,
    pub body: DocumentBody,
}

/// The variably-shaped part of a document.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentBody {
    Enriched(Box<EnrichedFields>),
    /// Random opaque string stored as `v`.
    Minimal { v: String },
}

impl SyntheticDocument {
    /// Returns true if the document carries the enriched body.
    pub fn is_enriched(&self) -> bool {
        matches!(self.body, DocumentBody::Enriched(_))
    }

    pub fn enriched(&self) -> Option<&EnrichedFields> {
        match &self.body {
            DocumentBody::Enriched(fields) => Some(fields),
            DocumentBody::Minimal { .. } => None,
        }
    }

    /// Convert to a BSON document ready for insertion.
    pub fn to_document(&self) -> Result<Document, bson::ser::Error> {
        let mut doc = Document::new();
        doc.insert("k", self.k);
        doc.insert("ts", self.ts);
        doc.insert("n", self.n);
        doc.insert("location", self.location.clone());

        match &self.body {
            DocumentBody::Enriched(fields) => {
                for (key, value) in bson::to_document(fields.as_ref())? {
                    doc.insert(key, value);
                }
            }
            DocumentBody::Minimal { v } => {
                doc.insert("v", v.clone());
            }
        }

        Ok(doc)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedFields {
    pub profile: Profile,
    pub phones: Vec<String>,
    pub tags: Vec<String>,
    pub orders: Vec<Order>,
    pub preferences: Preferences,
    pub metadata: Metadata,
    pub contact: Contact,
    pub rating: Rating,
    pub last_seen: LastSeen,
    /// Present as `null` when no payload was generated.
    pub avatar: Option<Binary>,
    pub attrs: Attrs,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub name: String,
    pub email: String,
    pub company: String,
    pub address: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job: Option<Job>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birthdate: Option<DateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub street: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country_code: String,
    pub country: String,
    pub geo: Geo,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Geo {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Job {
    pub title: String,
    pub seniority: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    #[serde(serialize_with = "as_decimal128")]
    pub total: Decimal,
    pub items: Vec<LineItem>,
    pub placed_at: DateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineItem {
    pub sku: String,
    pub qty: i32,
    #[serde(serialize_with = "as_decimal128")]
    pub price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Preferences {
    pub newsletter: bool,
    pub categories: Vec<String>,
    pub timezone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub source: String,
    pub created_at: DateTime,
    pub updated_at: DateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Either a bare email address or an object with email and phone.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Contact {
    Email(String),
    Detailed { email: String, phone: String },
}

/// Either an integer 1-5 or a float 1.0-5.0 rounded to two places.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Rating {
    Stars(i32),
    Score(f64),
}

/// Either a datetime or integer epoch seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LastSeen {
    At(DateTime),
    EpochSeconds(i64),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attrs {
    pub a: MixedValue,
    pub b: (i32, String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MixedValue {
    Bool(bool),
    Null,
    Word(String),
    Int(i32),
}

/// Serialize a decimal as a BSON Decimal128 so amounts keep exact cents.
fn as_decimal128<S: Serializer>(value: &Decimal, serializer: S) -> Result<S::Ok, S::Error> {
    let decimal = bson::Decimal128::from_str(&value.to_string())
        .map_err(|e| serde::ser::Error::custom(format!("invalid decimal {value}: {e}")))?;
    decimal.serialize(serializer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::Bson;

    fn minimal_doc() -> SyntheticDocument {
        SyntheticDocument {
            k: 3,
            ts: DateTime::now(),
            n: 0,
            location: "US".to_string(),
            body: DocumentBody::Minimal {
                v: "abcdEFGH12345678".to_string(),
            },
        }
    }

    #[test]
    fn test_minimal_to_document() {
        let doc = minimal_doc().to_document().unwrap();

        assert_eq!(doc.get_i64("k").unwrap(), 3);
        assert_eq!(doc.get_i64("n").unwrap(), 0);
        assert_eq!(doc.get_str("location").unwrap(), "US");
        assert_eq!(doc.get_str("v").unwrap(), "abcdEFGH12345678");
        assert!(doc.get_datetime("ts").is_ok());
        assert!(!doc.contains_key("profile"));
    }

    #[test]
    fn test_union_shapes() {
        let email = bson::to_bson(&Contact::Email("a@example.com".to_string())).unwrap();
        assert_eq!(email, Bson::String("a@example.com".to_string()));

        let detailed = bson::to_bson(&Contact::Detailed {
            email: "a@example.com".to_string(),
            phone: "555-0100".to_string(),
        })
        .unwrap();
        let detailed = detailed.as_document().unwrap();
        assert_eq!(detailed.get_str("phone").unwrap(), "555-0100");

        assert_eq!(bson::to_bson(&Rating::Stars(4)).unwrap(), Bson::Int32(4));
        assert_eq!(bson::to_bson(&Rating::Score(3.25)).unwrap(), Bson::Double(3.25));
        assert_eq!(
            bson::to_bson(&LastSeen::EpochSeconds(1_700_000_000)).unwrap(),
            Bson::Int64(1_700_000_000)
        );
        assert_eq!(bson::to_bson(&MixedValue::Null).unwrap(), Bson::Null);
    }

    #[test]
    fn test_decimal_serializes_as_decimal128() {
        let item = LineItem {
            sku: "SKU-abcd-12345".to_string(),
            qty: 2,
            price: Decimal::new(1999, 2),
        };
        let doc = bson::to_document(&item).unwrap();
        match doc.get("price") {
            Some(Bson::Decimal128(d)) => assert_eq!(d.to_string(), "19.99"),
            other => panic!("Expected Decimal128 price, got {other:?}"),
        }
    }
}
