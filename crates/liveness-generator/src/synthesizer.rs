//! Document synthesis with enriched and minimal modes.

use crate::document::{
    Address, Attrs, Contact, DocumentBody, EnrichedFields, Geo, Job, LastSeen, LineItem, Metadata,
    MixedValue, Order, Preferences, Profile, Rating, SyntheticDocument,
};
use crate::enrichment::{Enrichment, EnrichmentError, NoEnrichment};
use crate::money::{order_total, random_price};
use bson::spec::BinarySubtype;
use bson::{Binary, DateTime};
use chrono::{NaiveTime, Utc};
use rand::distr::Alphanumeric;
use rand::seq::IndexedRandom;
use rand::{Rng, RngCore};
use std::sync::Arc;
use tracing::debug;

/// Location codes used when the enrichment capability cannot supply one.
pub const FALLBACK_LOCATIONS: &[&str] = &[
    "US", "CA", "GB", "DE", "FR", "IN", "JP", "CN", "BR", "AU", "SG", "NL", "SE", "CH", "IT", "ES",
    "MX", "KR", "ZA", "AE",
];

const CATEGORIES: &[&str] = &["tech", "finance", "health", "travel", "food", "sports"];
const SOURCES: &[&str] = &["web", "mobile", "partner", "import"];
const SENIORITY: &[&str] = &["jr", "mid", "sr"];

/// Probability of each optional enriched field being present.
const JOB_PROBABILITY: f64 = 0.5;
const WEBSITE_PROBABILITY: f64 = 0.3;
const BIRTHDATE_PROBABILITY: f64 = 0.3;
const NOTE_PROBABILITY: f64 = 0.2;
const AVATAR_PROBABILITY: f64 = 0.3;

const MAX_TAGS: usize = 6;
const MAX_PHONES: usize = 3;
const MAX_ORDERS: usize = 3;
const MAX_ITEMS: usize = 3;
const MAX_AVATAR_BYTES: usize = 512;
const MINIMAL_VALUE_LEN: usize = 16;

/// Produces synthetic documents.
///
/// Synthesis never fails: any enrichment error degrades the document to
/// minimal mode, keeping the mandatory fields.
#[derive(Clone)]
pub struct DocumentSynthesizer {
    enrichment: Arc<dyn Enrichment>,
}

impl DocumentSynthesizer {
    pub fn new(enrichment: Arc<dyn Enrichment>) -> Self {
        Self { enrichment }
    }

    /// A synthesizer that only produces minimal documents.
    pub fn minimal() -> Self {
        Self::new(Arc::new(NoEnrichment))
    }

    /// Whether documents will carry the enriched body.
    pub fn is_enriched(&self) -> bool {
        self.enrichment.is_available()
    }

    /// Draw a shard-routing location code.
    ///
    /// Uses the enrichment country-code generator when available, otherwise
    /// (or if it fails or yields an empty code) the fallback list.
    pub fn location(&self, rng: &mut dyn RngCore) -> String {
        if self.enrichment.is_available() {
            match self.enrichment.country_code(rng) {
                Ok(code) if !code.is_empty() => return code,
                Ok(_) => debug!("Enrichment returned an empty country code; using fallback"),
                Err(e) => debug!("Country code generation failed, using fallback: {e}"),
            }
        }
        fallback_location(rng)
    }

    /// Synthesize the document for key `k`.
    pub fn synthesize(&self, k: i64, rng: &mut dyn RngCore) -> SyntheticDocument {
        let location = self.location(rng);

        let body = if self.enrichment.is_available() {
            match self.enriched_fields(&location, rng) {
                Ok(fields) => DocumentBody::Enriched(Box::new(fields)),
                Err(e) => {
                    debug!(k, "Enrichment failed mid-synthesis, using minimal document: {e}");
                    minimal_body(rng)
                }
            }
        } else {
            minimal_body(rng)
        };

        SyntheticDocument {
            k,
            ts: DateTime::now(),
            n: 0,
            location,
            body,
        }
    }

    fn enriched_fields(
        &self,
        location: &str,
        rng: &mut dyn RngCore,
    ) -> Result<EnrichedFields, EnrichmentError> {
        let fk = self.enrichment.as_ref();

        let mut profile = Profile {
            name: fk.name(rng)?,
            email: fk.free_email(rng)?,
            company: fk.company(rng)?,
            address: Address {
                street: fk.street_address(rng)?,
                city: fk.city(rng)?,
                state: fk.state_abbr(rng)?,
                postal_code: fk.postcode(rng)?,
                country_code: location.to_string(),
                country: fk.country(location, rng)?,
                geo: Geo {
                    lat: fk.latitude(rng)?,
                    lng: fk.longitude(rng)?,
                },
            },
            job: None,
            website: None,
            birthdate: None,
        };

        let tag_count = rng.random_range(0..=MAX_TAGS);
        let tags = fk.words(tag_count, rng)?;

        let phone_count = rng.random_range(0..=MAX_PHONES);
        let phones = (0..phone_count)
            .map(|_| fk.phone_number(rng))
            .collect::<Result<Vec<_>, _>>()?;

        let order_count = rng.random_range(0..=MAX_ORDERS);
        let mut orders = Vec::with_capacity(order_count);
        for _ in 0..order_count {
            orders.push(self.order(rng)?);
        }

        if rng.random_bool(JOB_PROBABILITY) {
            profile.job = Some(Job {
                title: fk.job(rng)?,
                seniority: choose(SENIORITY, rng),
            });
        }
        if rng.random_bool(WEBSITE_PROBABILITY) {
            profile.website = Some(fk.url(rng)?);
        }
        if rng.random_bool(BIRTHDATE_PROBABILITY) {
            let date = fk.date_of_birth(18, 90, rng)?;
            let midnight = date.and_time(NaiveTime::MIN).and_utc();
            profile.birthdate = Some(DateTime::from_chrono(midnight));
        }

        let category_count = rng.random_range(0..=4);
        let preferences = Preferences {
            newsletter: fk.boolean(rng)?,
            categories: CATEGORIES
                .choose_multiple(rng, category_count)
                .map(|c| (*c).to_string())
                .collect(),
            timezone: fk.timezone(rng)?,
        };

        let now = DateTime::now();
        let mut metadata = Metadata {
            source: choose(SOURCES, rng),
            created_at: now,
            updated_at: now,
            note: None,
        };
        if rng.random_bool(NOTE_PROBABILITY) {
            metadata.note = Some(fk.sentence(8, rng)?);
        }

        let contact = if rng.random_bool(0.5) {
            Contact::Email(fk.free_email(rng)?)
        } else {
            Contact::Detailed {
                email: fk.free_email(rng)?,
                phone: fk.phone_number(rng)?,
            }
        };

        let rating = if rng.random_bool(0.5) {
            Rating::Stars(rng.random_range(1..=5))
        } else {
            let score: f64 = rng.random_range(1.0..=5.0);
            Rating::Score((score * 100.0).round() / 100.0)
        };

        let last_seen = if rng.random_bool(0.5) {
            LastSeen::At(DateTime::now())
        } else {
            LastSeen::EpochSeconds(Utc::now().timestamp())
        };

        let avatar = if rng.random_bool(AVATAR_PROBABILITY) {
            let mut bytes = vec![0u8; rng.random_range(0..=MAX_AVATAR_BYTES)];
            rng.fill_bytes(&mut bytes);
            Some(Binary {
                subtype: BinarySubtype::Generic,
                bytes,
            })
        } else {
            None
        };

        let a = match rng.random_range(0..5) {
            0 => MixedValue::Bool(true),
            1 => MixedValue::Bool(false),
            2 => MixedValue::Null,
            3 => MixedValue::Word(fk.word(rng)?),
            _ => MixedValue::Int(rng.random_range(0..=100)),
        };
        let attrs = Attrs {
            a,
            b: (rng.random_range(0..=5), fk.word(rng)?),
        };

        Ok(EnrichedFields {
            profile,
            phones,
            tags,
            orders,
            preferences,
            metadata,
            contact,
            rating,
            last_seen,
            avatar,
            attrs,
        })
    }

    fn order(&self, rng: &mut dyn RngCore) -> Result<Order, EnrichmentError> {
        let item_count = rng.random_range(1..=MAX_ITEMS);
        let mut items = Vec::with_capacity(item_count);
        for _ in 0..item_count {
            items.push(LineItem {
                sku: self.enrichment.bothify("SKU-????-#####", rng)?,
                qty: rng.random_range(1..=5),
                price: random_price(rng),
            });
        }

        let mut id_bytes = [0u8; 16];
        rng.fill_bytes(&mut id_bytes);
        let id = uuid::Builder::from_random_bytes(id_bytes).into_uuid();

        Ok(Order {
            id: id.to_string(),
            total: order_total(&items),
            items,
            placed_at: DateTime::now(),
        })
    }
}

impl Default for DocumentSynthesizer {
    fn default() -> Self {
        Self::minimal()
    }
}

/// Draw a location code from [`FALLBACK_LOCATIONS`].
pub fn fallback_location(rng: &mut dyn RngCore) -> String {
    choose(FALLBACK_LOCATIONS, rng)
}

fn choose(pool: &[&str], rng: &mut dyn RngCore) -> String {
    pool.choose(rng).copied().unwrap_or_default().to_string()
}

fn minimal_body(rng: &mut dyn RngCore) -> DocumentBody {
    let v: String = (0..MINIMAL_VALUE_LEN)
        .map(|_| char::from(rng.sample(Alphanumeric)))
        .collect();
    DocumentBody::Minimal { v }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::{Locale, FakerEnrichment};
    use bson::Bson;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rust_decimal::{Decimal, RoundingStrategy};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Succeeds for a fixed number of calls, then fails every call.
    struct FlakyEnrichment {
        inner: FakerEnrichment,
        remaining: AtomicUsize,
    }

    impl FlakyEnrichment {
        fn new(successes: usize) -> Self {
            Self {
                inner: FakerEnrichment::new(Locale::EnUs),
                remaining: AtomicUsize::new(successes),
            }
        }

        fn tick(&self) -> Result<(), EnrichmentError> {
            let ok = self
                .remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if ok {
                Ok(())
            } else {
                Err(EnrichmentError::Generator {
                    generator: "flaky",
                    reason: "budget exhausted".to_string(),
                })
            }
        }
    }

    impl Enrichment for FlakyEnrichment {
        fn country_code(&self, rng: &mut dyn RngCore) -> Result<String, EnrichmentError> {
            self.tick()?;
            self.inner.country_code(rng)
        }
        fn country(&self, code: &str, rng: &mut dyn RngCore) -> Result<String, EnrichmentError> {
            self.tick()?;
            self.inner.country(code, rng)
        }
        fn name(&self, rng: &mut dyn RngCore) -> Result<String, EnrichmentError> {
            self.tick()?;
            self.inner.name(rng)
        }
        fn free_email(&self, rng: &mut dyn RngCore) -> Result<String, EnrichmentError> {
            self.tick()?;
            self.inner.free_email(rng)
        }
        fn company(&self, rng: &mut dyn RngCore) -> Result<String, EnrichmentError> {
            self.tick()?;
            self.inner.company(rng)
        }
        fn street_address(&self, rng: &mut dyn RngCore) -> Result<String, EnrichmentError> {
            self.tick()?;
            self.inner.street_address(rng)
        }
        // Remaining generators fall through to the unavailable defaults.
    }

    fn enriched() -> DocumentSynthesizer {
        DocumentSynthesizer::new(Arc::new(FakerEnrichment::new(Locale::EnUs)))
    }

    fn assert_mandatory(doc: &SyntheticDocument, k: i64) {
        assert_eq!(doc.k, k);
        assert_eq!(doc.n, 0);
        assert!(!doc.location.is_empty());
        let bson = doc.to_document().unwrap();
        assert_eq!(bson.get_i64("k").unwrap(), k);
        assert_eq!(bson.get_i64("n").unwrap(), 0);
        assert!(bson.get_datetime("ts").is_ok());
        assert!(!bson.get_str("location").unwrap().is_empty());
    }

    #[test]
    fn test_minimal_mode() {
        let synthesizer = DocumentSynthesizer::minimal();
        let mut rng = StdRng::seed_from_u64(42);

        assert!(!synthesizer.is_enriched());
        for k in 0..50 {
            let doc = synthesizer.synthesize(k, &mut rng);
            assert_mandatory(&doc, k);
            assert!(FALLBACK_LOCATIONS.contains(&doc.location.as_str()));
            match &doc.body {
                DocumentBody::Minimal { v } => {
                    assert_eq!(v.len(), MINIMAL_VALUE_LEN);
                    assert!(v.chars().all(|c| c.is_ascii_alphanumeric()));
                }
                DocumentBody::Enriched(_) => panic!("Expected minimal body"),
            }
        }
    }

    #[test]
    fn test_enriched_mode_shapes() {
        let synthesizer = enriched();
        let mut rng = StdRng::seed_from_u64(42);

        for k in 0..200 {
            let doc = synthesizer.synthesize(k, &mut rng);
            assert_mandatory(&doc, k);
            let fields = doc.enriched().expect("enriched body");

            assert!(fields.tags.len() <= MAX_TAGS);
            assert!(fields.phones.len() <= MAX_PHONES);
            assert!(fields.orders.len() <= MAX_ORDERS);
            assert_eq!(fields.profile.address.country_code, doc.location);
            assert!(fields.preferences.categories.len() <= 4);
            if let Some(avatar) = &fields.avatar {
                assert!(avatar.bytes.len() <= MAX_AVATAR_BYTES);
            }
            match fields.rating {
                Rating::Stars(s) => assert!((1..=5).contains(&s)),
                Rating::Score(s) => assert!((1.0..=5.0).contains(&s)),
            }
            for order in &fields.orders {
                assert!((1..=MAX_ITEMS).contains(&order.items.len()));
                for item in &order.items {
                    assert!((1..=5).contains(&item.qty));
                    assert!(item.sku.starts_with("SKU-"));
                }
            }

            let bson = doc.to_document().unwrap();
            assert!(bson.contains_key("profile"));
            assert!(bson.contains_key("lastSeen"));
            assert!(bson.contains_key("avatar"));
            assert!(!bson.contains_key("v"));
        }
    }

    #[test]
    fn test_order_totals_match_items() {
        let synthesizer = enriched();
        let mut rng = StdRng::seed_from_u64(7);
        let mut orders_seen = 0;

        for k in 0..300 {
            let doc = synthesizer.synthesize(k, &mut rng);
            for order in &doc.enriched().unwrap().orders {
                let sum: Decimal = order
                    .items
                    .iter()
                    .map(|i| Decimal::from(i.qty) * i.price)
                    .sum();
                let expected =
                    sum.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
                assert_eq!(order.total, expected);
                orders_seen += 1;
            }
        }
        assert!(orders_seen > 0);
    }

    #[test]
    fn test_order_total_stored_as_decimal128() {
        let synthesizer = enriched();
        let mut rng = StdRng::seed_from_u64(13);

        let doc = (0..100)
            .map(|k| synthesizer.synthesize(k, &mut rng))
            .find(|d| d.enriched().is_some_and(|f| !f.orders.is_empty()))
            .expect("some document with orders");
        let bson = doc.to_document().unwrap();
        let orders = bson.get_array("orders").unwrap();
        let first = orders[0].as_document().unwrap();
        assert!(matches!(first.get("total"), Some(Bson::Decimal128(_))));
    }

    #[test]
    fn test_optional_field_frequencies() {
        let synthesizer = enriched();
        let mut rng = StdRng::seed_from_u64(99);
        let n = 2000;
        let mut jobs = 0;
        let mut avatars = 0;
        let mut emails = 0;

        for k in 0..n {
            let doc = synthesizer.synthesize(k, &mut rng);
            let fields = doc.enriched().unwrap();
            jobs += usize::from(fields.profile.job.is_some());
            avatars += usize::from(fields.avatar.is_some());
            emails += usize::from(matches!(fields.contact, Contact::Email(_)));
        }

        let ratio = |count: usize| count as f64 / n as f64;
        assert!((ratio(jobs) - JOB_PROBABILITY).abs() < 0.05);
        assert!((ratio(avatars) - AVATAR_PROBABILITY).abs() < 0.05);
        assert!((ratio(emails) - 0.5).abs() < 0.05);
    }

    #[test]
    fn test_enrichment_failure_degrades_to_minimal() {
        // Enough budget for the location and a few profile fields.
        let synthesizer = DocumentSynthesizer::new(Arc::new(FlakyEnrichment::new(3)));
        let mut rng = StdRng::seed_from_u64(42);

        let doc = synthesizer.synthesize(5, &mut rng);
        assert_mandatory(&doc, 5);
        assert!(!doc.is_enriched());

        // Budget exhausted: even the location comes from the fallback list.
        let doc = synthesizer.synthesize(6, &mut rng);
        assert_mandatory(&doc, 6);
        assert!(FALLBACK_LOCATIONS.contains(&doc.location.as_str()));
        assert!(!doc.is_enriched());
    }

    #[test]
    fn test_deterministic_with_seed() {
        let synthesizer = enriched();
        let mut rng1 = StdRng::seed_from_u64(42);
        let mut rng2 = StdRng::seed_from_u64(42);

        let doc1 = synthesizer.synthesize(1, &mut rng1);
        let doc2 = synthesizer.synthesize(1, &mut rng2);

        assert_eq!(doc1.location, doc2.location);
        assert_eq!(
            doc1.enriched().unwrap().profile.name,
            doc2.enriched().unwrap().profile.name
        );
    }
}
