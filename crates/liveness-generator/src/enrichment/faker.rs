//! Built-in enrichment backed by the `fake` crate's locale fakers.

use super::pattern::bothify;
use super::{Enrichment, EnrichmentError, Locale};
use chrono::{Days, NaiveDate, Utc};
use fake::faker::address::raw::{
    BuildingNumber, CityName, PostCode, StateAbbr, StreetName, TimeZone,
};
use fake::faker::company::raw::CompanyName;
use fake::faker::internet::raw::{DomainSuffix, FreeEmail};
use fake::faker::job::raw::Title;
use fake::faker::lorem::raw::Word;
use fake::faker::name::raw::Name;
use fake::faker::phone_number::raw::PhoneNumber;
use fake::locales::{DE_DE, EN, FR_FR};
use fake::Fake;
use rand::seq::IndexedRandom;
use rand::{Rng, RngCore};

/// ISO alpha-2 codes and names this enrichment draws countries from.
///
/// `country` must be able to name every code `country_code` returns, so both
/// come from this table rather than from independent fakers.
const COUNTRIES: &[(&str, &str)] = &[
    ("US", "United States"),
    ("CA", "Canada"),
    ("GB", "United Kingdom"),
    ("DE", "Germany"),
    ("FR", "France"),
    ("IN", "India"),
    ("JP", "Japan"),
    ("CN", "China"),
    ("BR", "Brazil"),
    ("AU", "Australia"),
    ("SG", "Singapore"),
    ("NL", "Netherlands"),
    ("SE", "Sweden"),
    ("CH", "Switzerland"),
    ("IT", "Italy"),
    ("ES", "Spain"),
    ("MX", "Mexico"),
    ("KR", "South Korea"),
    ("ZA", "South Africa"),
    ("AE", "United Arab Emirates"),
];

/// Run a raw faker in the enrichment's locale, producing a `String`.
macro_rules! localized {
    ($locale:expr, $faker:ident, $rng:expr) => {{
        let mut rng = &mut *$rng;
        let value: String = match $locale {
            Locale::EnUs => $faker(EN).fake_with_rng(&mut rng),
            Locale::DeDe => $faker(DE_DE).fake_with_rng(&mut rng),
            Locale::FrFr => $faker(FR_FR).fake_with_rng(&mut rng),
        };
        value
    }};
}

/// Enrichment generating locale-aware values with `fake`.
#[derive(Debug, Clone, Copy)]
pub struct FakerEnrichment {
    locale: Locale,
}

impl FakerEnrichment {
    pub fn new(locale: Locale) -> Self {
        Self { locale }
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }
}

impl Default for FakerEnrichment {
    fn default() -> Self {
        Self::new(Locale::default())
    }
}

impl Enrichment for FakerEnrichment {
    fn country_code(&self, rng: &mut dyn RngCore) -> Result<String, EnrichmentError> {
        let (code, _) = COUNTRIES
            .choose(rng)
            .ok_or(EnrichmentError::Generator {
                generator: "country_code",
                reason: "no countries configured".to_string(),
            })?;
        Ok((*code).to_string())
    }

    fn country(&self, code: &str, _rng: &mut dyn RngCore) -> Result<String, EnrichmentError> {
        COUNTRIES
            .iter()
            .find(|(c, _)| c.eq_ignore_ascii_case(code))
            .map(|(_, name)| (*name).to_string())
            .ok_or_else(|| EnrichmentError::Generator {
                generator: "country",
                reason: format!("unknown country code {code}"),
            })
    }

    fn name(&self, rng: &mut dyn RngCore) -> Result<String, EnrichmentError> {
        Ok(localized!(self.locale, Name, rng))
    }

    fn free_email(&self, rng: &mut dyn RngCore) -> Result<String, EnrichmentError> {
        Ok(localized!(self.locale, FreeEmail, rng))
    }

    fn company(&self, rng: &mut dyn RngCore) -> Result<String, EnrichmentError> {
        Ok(localized!(self.locale, CompanyName, rng))
    }

    fn street_address(&self, rng: &mut dyn RngCore) -> Result<String, EnrichmentError> {
        let number = localized!(self.locale, BuildingNumber, rng);
        let street = localized!(self.locale, StreetName, rng);
        Ok(match self.locale {
            Locale::DeDe => format!("{street} {number}"),
            Locale::EnUs | Locale::FrFr => format!("{number} {street}"),
        })
    }

    fn city(&self, rng: &mut dyn RngCore) -> Result<String, EnrichmentError> {
        Ok(localized!(self.locale, CityName, rng))
    }

    fn state_abbr(&self, rng: &mut dyn RngCore) -> Result<String, EnrichmentError> {
        Ok(localized!(self.locale, StateAbbr, rng))
    }

    fn postcode(&self, rng: &mut dyn RngCore) -> Result<String, EnrichmentError> {
        Ok(localized!(self.locale, PostCode, rng))
    }

    fn latitude(&self, rng: &mut dyn RngCore) -> Result<f64, EnrichmentError> {
        Ok(round6(rng.random_range(-90.0..=90.0)))
    }

    fn longitude(&self, rng: &mut dyn RngCore) -> Result<f64, EnrichmentError> {
        Ok(round6(rng.random_range(-180.0..=180.0)))
    }

    fn word(&self, rng: &mut dyn RngCore) -> Result<String, EnrichmentError> {
        Ok(localized!(self.locale, Word, rng))
    }

    fn phone_number(&self, rng: &mut dyn RngCore) -> Result<String, EnrichmentError> {
        Ok(localized!(self.locale, PhoneNumber, rng))
    }

    fn job(&self, rng: &mut dyn RngCore) -> Result<String, EnrichmentError> {
        Ok(localized!(self.locale, Title, rng))
    }

    fn url(&self, rng: &mut dyn RngCore) -> Result<String, EnrichmentError> {
        let first = self.word(rng)?;
        let second = self.word(rng)?;
        let suffix = localized!(self.locale, DomainSuffix, rng);
        Ok(format!("https://www.{first}{second}.{suffix}/"))
    }

    fn date_of_birth(
        &self,
        min_age: u32,
        max_age: u32,
        rng: &mut dyn RngCore,
    ) -> Result<NaiveDate, EnrichmentError> {
        let (low, high) = (min_age.min(max_age), min_age.max(max_age));
        let min_days = u64::from(low) * 365;
        let max_days = u64::from(high) * 365 + 364;
        let days = rng.random_range(min_days..=max_days);
        Utc::now()
            .date_naive()
            .checked_sub_days(Days::new(days))
            .ok_or_else(|| EnrichmentError::Generator {
                generator: "date_of_birth",
                reason: format!("date {days} days ago is out of range"),
            })
    }

    fn sentence(&self, words: usize, rng: &mut dyn RngCore) -> Result<String, EnrichmentError> {
        let words = self.words(words.max(1), rng)?;
        let mut sentence = words.join(" ");
        if let Some(first) = sentence.get_mut(0..1) {
            first.make_ascii_uppercase();
        }
        sentence.push('.');
        Ok(sentence)
    }

    fn timezone(&self, rng: &mut dyn RngCore) -> Result<String, EnrichmentError> {
        Ok(localized!(self.locale, TimeZone, rng))
    }

    fn boolean(&self, rng: &mut dyn RngCore) -> Result<bool, EnrichmentError> {
        Ok(rng.random_bool(0.5))
    }

    fn bothify(&self, template: &str, rng: &mut dyn RngCore) -> Result<String, EnrichmentError> {
        Ok(bothify(template, rng))
    }
}

fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const ALL_LOCALES: [Locale; 3] = [Locale::EnUs, Locale::DeDe, Locale::FrFr];

    #[test]
    fn test_country_code_round_trip_name() {
        let enrichment = FakerEnrichment::new(Locale::EnUs);
        let mut rng = StdRng::seed_from_u64(42);

        for _ in 0..50 {
            let code = enrichment.country_code(&mut rng).unwrap();
            assert_eq!(code.len(), 2);
            assert!(!enrichment.country(&code, &mut rng).unwrap().is_empty());
        }
        assert!(enrichment.country("ZZ", &mut rng).is_err());
    }

    #[test]
    fn test_every_locale_produces_values() {
        let mut rng = StdRng::seed_from_u64(7);

        for locale in ALL_LOCALES {
            let enrichment = FakerEnrichment::new(locale);
            assert!(!enrichment.name(&mut rng).unwrap().is_empty());
            assert!(!enrichment.company(&mut rng).unwrap().is_empty());
            assert!(!enrichment.street_address(&mut rng).unwrap().is_empty());
            assert!(!enrichment.city(&mut rng).unwrap().is_empty());
            assert!(!enrichment.state_abbr(&mut rng).unwrap().is_empty());
            assert!(!enrichment.postcode(&mut rng).unwrap().is_empty());
            assert!(!enrichment.phone_number(&mut rng).unwrap().is_empty());
            assert!(!enrichment.job(&mut rng).unwrap().is_empty());
            assert!(!enrichment.timezone(&mut rng).unwrap().is_empty());
        }
    }

    #[test]
    fn test_same_seed_same_values() {
        let enrichment = FakerEnrichment::new(Locale::DeDe);
        let draw = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            (
                enrichment.name(&mut rng).unwrap(),
                enrichment.street_address(&mut rng).unwrap(),
            )
        };

        assert_eq!(draw(5), draw(5));
    }

    #[test]
    fn test_free_email_and_url_shape() {
        let mut rng = StdRng::seed_from_u64(3);

        for locale in ALL_LOCALES {
            let enrichment = FakerEnrichment::new(locale);
            let email = enrichment.free_email(&mut rng).unwrap();
            let (local, domain) = email.split_once('@').unwrap();
            assert!(!local.is_empty());
            assert!(domain.contains('.'));

            let url = enrichment.url(&mut rng).unwrap();
            assert!(url.starts_with("https://www."));
            assert!(url.ends_with('/'));
        }
    }

    #[test]
    fn test_date_of_birth_age_bounds() {
        let enrichment = FakerEnrichment::default();
        let mut rng = StdRng::seed_from_u64(9);
        let this_year = Utc::now().year();

        for _ in 0..100 {
            let dob = enrichment.date_of_birth(18, 90, &mut rng).unwrap();
            let age = this_year - dob.year();
            assert!((17..=92).contains(&age), "age {age} out of bounds");
        }
    }

    #[test]
    fn test_sentence() {
        let enrichment = FakerEnrichment::default();
        let mut rng = StdRng::seed_from_u64(11);

        let sentence = enrichment.sentence(8, &mut rng).unwrap();
        assert!(sentence.ends_with('.'));
        assert_eq!(sentence.split_whitespace().count(), 8);
        assert!(sentence.chars().next().unwrap().is_ascii_uppercase());
    }

    #[test]
    fn test_geo_ranges() {
        let enrichment = FakerEnrichment::default();
        let mut rng = StdRng::seed_from_u64(5);

        for _ in 0..100 {
            assert!((-90.0..=90.0).contains(&enrichment.latitude(&mut rng).unwrap()));
            assert!((-180.0..=180.0).contains(&enrichment.longitude(&mut rng).unwrap()));
        }
    }
}
