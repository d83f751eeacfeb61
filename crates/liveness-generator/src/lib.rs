//! Synthetic document generator for the MongoDB liveness workload.
//!
//! This crate provides the `DocumentSynthesizer`, which produces documents
//! with a fixed set of mandatory fields (`k`, `ts`, `n`, `location`) and a
//! heterogeneous, partially optional body. The body is produced by an
//! [`Enrichment`] capability; when none is available, or when it fails part
//! way through a document, the synthesizer falls back to a minimal body.
//!
//! # Architecture
//!
//! ```text
//!   Arc<dyn Enrichment>          per-worker RNG (&mut dyn RngCore)
//!          │                               │
//!          ▼                               ▼
//! ┌──────────────────────────────────────────────┐
//! │              DocumentSynthesizer             │
//! │                                              │
//! │  enriched body ──(error)──► minimal body     │
//! └──────────────────────┬───────────────────────┘
//!                        │
//!                        ▼
//!   SyntheticDocument { k, ts, n: 0, location, body }
//! ```
//!
//! The synthesizer is shared between workers; random state never is. Every
//! call takes the caller's RNG, so workers do not contend on generation.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use liveness_generator::{DocumentSynthesizer, Locale, FakerEnrichment};
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//!
//! let synthesizer = DocumentSynthesizer::new(Arc::new(FakerEnrichment::new(Locale::EnUs)));
//! let mut rng = StdRng::seed_from_u64(42);
//! let doc = synthesizer.synthesize(7, &mut rng);
//! assert_eq!(doc.k, 7);
//! assert_eq!(doc.n, 0);
//! let bson = doc.to_document().unwrap();
//! assert!(bson.contains_key("location"));
//! ```

pub mod document;
pub mod enrichment;
pub mod money;
pub mod synthesizer;

// Re-exports for convenience
pub use document::{
    Address, Attrs, Contact, DocumentBody, EnrichedFields, Geo, Job, LastSeen, LineItem, Metadata,
    MixedValue, Order, Preferences, Profile, Rating, SyntheticDocument,
};
pub use enrichment::{Enrichment, EnrichmentError, Locale, NoEnrichment, FakerEnrichment};
pub use synthesizer::{DocumentSynthesizer, FALLBACK_LOCATIONS};
