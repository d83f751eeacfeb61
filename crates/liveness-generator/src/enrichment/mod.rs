//! Data-enrichment capability.
//!
//! An [`Enrichment`] produces realistic-looking values for the enriched
//! document body. Every method may fail; the synthesizer treats any failure
//! as a signal to fall back to a minimal document. The default method bodies
//! report the capability as unavailable, which is all [`NoEnrichment`] needs.

pub mod faker;
pub mod pattern;

pub use faker::FakerEnrichment;

use chrono::NaiveDate;
use rand::RngCore;
use std::fmt;
use std::str::FromStr;

/// Errors raised by an enrichment capability.
#[derive(Debug, thiserror::Error)]
pub enum EnrichmentError {
    /// The capability is not installed.
    #[error("enrichment capability unavailable")]
    Unavailable,

    /// A generator failed to produce a value.
    #[error("enrichment generator '{generator}' failed: {reason}")]
    Generator {
        generator: &'static str,
        reason: String,
    },
}

/// Locale-aware fake-data generation.
///
/// Methods take the caller's RNG so that one instance can serve every worker.
pub trait Enrichment: Send + Sync {
    /// Whether this capability can produce values at all.
    fn is_available(&self) -> bool {
        true
    }

    fn country_code(&self, _rng: &mut dyn RngCore) -> Result<String, EnrichmentError> {
        Err(EnrichmentError::Unavailable)
    }

    /// Full country name for an ISO alpha-2 code.
    fn country(&self, _code: &str, _rng: &mut dyn RngCore) -> Result<String, EnrichmentError> {
        Err(EnrichmentError::Unavailable)
    }

    fn name(&self, _rng: &mut dyn RngCore) -> Result<String, EnrichmentError> {
        Err(EnrichmentError::Unavailable)
    }

    fn free_email(&self, _rng: &mut dyn RngCore) -> Result<String, EnrichmentError> {
        Err(EnrichmentError::Unavailable)
    }

    fn company(&self, _rng: &mut dyn RngCore) -> Result<String, EnrichmentError> {
        Err(EnrichmentError::Unavailable)
    }

    fn street_address(&self, _rng: &mut dyn RngCore) -> Result<String, EnrichmentError> {
        Err(EnrichmentError::Unavailable)
    }

    fn city(&self, _rng: &mut dyn RngCore) -> Result<String, EnrichmentError> {
        Err(EnrichmentError::Unavailable)
    }

    fn state_abbr(&self, _rng: &mut dyn RngCore) -> Result<String, EnrichmentError> {
        Err(EnrichmentError::Unavailable)
    }

    fn postcode(&self, _rng: &mut dyn RngCore) -> Result<String, EnrichmentError> {
        Err(EnrichmentError::Unavailable)
    }

    fn latitude(&self, _rng: &mut dyn RngCore) -> Result<f64, EnrichmentError> {
        Err(EnrichmentError::Unavailable)
    }

    fn longitude(&self, _rng: &mut dyn RngCore) -> Result<f64, EnrichmentError> {
        Err(EnrichmentError::Unavailable)
    }

    fn word(&self, _rng: &mut dyn RngCore) -> Result<String, EnrichmentError> {
        Err(EnrichmentError::Unavailable)
    }

    /// `count` words, duplicates allowed.
    fn words(&self, count: usize, rng: &mut dyn RngCore) -> Result<Vec<String>, EnrichmentError> {
        (0..count).map(|_| self.word(rng)).collect()
    }

    fn phone_number(&self, _rng: &mut dyn RngCore) -> Result<String, EnrichmentError> {
        Err(EnrichmentError::Unavailable)
    }

    fn job(&self, _rng: &mut dyn RngCore) -> Result<String, EnrichmentError> {
        Err(EnrichmentError::Unavailable)
    }

    fn url(&self, _rng: &mut dyn RngCore) -> Result<String, EnrichmentError> {
        Err(EnrichmentError::Unavailable)
    }

    /// A birth date for someone aged between `min_age` and `max_age`.
    fn date_of_birth(
        &self,
        _min_age: u32,
        _max_age: u32,
        _rng: &mut dyn RngCore,
    ) -> Result<NaiveDate, EnrichmentError> {
        Err(EnrichmentError::Unavailable)
    }

    fn sentence(&self, _words: usize, _rng: &mut dyn RngCore) -> Result<String, EnrichmentError> {
        Err(EnrichmentError::Unavailable)
    }

    fn timezone(&self, _rng: &mut dyn RngCore) -> Result<String, EnrichmentError> {
        Err(EnrichmentError::Unavailable)
    }

    fn boolean(&self, _rng: &mut dyn RngCore) -> Result<bool, EnrichmentError> {
        Err(EnrichmentError::Unavailable)
    }

    /// Fill a template: `?` becomes a letter, `#` a digit.
    fn bothify(&self, _template: &str, _rng: &mut dyn RngCore) -> Result<String, EnrichmentError> {
        Err(EnrichmentError::Unavailable)
    }
}

/// No enrichment installed; documents are synthesized in minimal mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEnrichment;

impl Enrichment for NoEnrichment {
    fn is_available(&self) -> bool {
        false
    }
}

/// Locale used by [`FakerEnrichment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    EnUs,
    DeDe,
    FrFr,
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Locale::EnUs => "en-us",
            Locale::DeDe => "de-de",
            Locale::FrFr => "fr-fr",
        };
        f.write_str(name)
    }
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "en-us" | "en" => Ok(Locale::EnUs),
            "de-de" | "de" => Ok(Locale::DeDe),
            "fr-fr" | "fr" => Ok(Locale::FrFr),
            other => Err(format!("unsupported locale: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_no_enrichment_is_unavailable() {
        let mut rng = StdRng::seed_from_u64(1);
        let enrichment = NoEnrichment;

        assert!(!enrichment.is_available());
        assert!(matches!(
            enrichment.country_code(&mut rng),
            Err(EnrichmentError::Unavailable)
        ));
        assert!(enrichment.words(3, &mut rng).is_err());
        // Zero words never touches a generator.
        assert_eq!(enrichment.words(0, &mut rng).unwrap(), Vec::<String>::new());
    }

    #[test]
    fn test_locale_parse() {
        assert_eq!("en-US".parse::<Locale>().unwrap(), Locale::EnUs);
        assert_eq!("de_DE".parse::<Locale>().unwrap(), Locale::DeDe);
        assert_eq!("fr".parse::<Locale>().unwrap(), Locale::FrFr);
        assert!("xx".parse::<Locale>().is_err());
        assert_eq!(Locale::DeDe.to_string(), "de-de");
    }
}
