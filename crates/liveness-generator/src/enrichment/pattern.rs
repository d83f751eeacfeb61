//! Template filling for codes such as SKUs.
//!
//! Supports placeholders:
//! - `?` - random ASCII letter
//! - `#` - random digit
//! - `%` - random non-zero digit

use rand::{Rng, RngCore};

const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Replace every placeholder in `template`; other characters are copied.
pub fn bothify(template: &str, rng: &mut dyn RngCore) -> String {
    template
        .chars()
        .map(|c| match c {
            '?' => LETTERS[rng.random_range(0..LETTERS.len())] as char,
            '#' => char::from(b'0' + rng.random_range(0..10u8)),
            '%' => char::from(b'0' + rng.random_range(1..10u8)),
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_bothify_sku() {
        let mut rng = StdRng::seed_from_u64(42);
        let sku = bothify("SKU-????-#####", &mut rng);

        assert_eq!(sku.len(), 14);
        assert!(sku.starts_with("SKU-"));
        assert!(sku[4..8].chars().all(|c| c.is_ascii_alphabetic()));
        assert_eq!(&sku[8..9], "-");
        assert!(sku[9..].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_bothify_non_zero_digit() {
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..100 {
            let code = bothify("%", &mut rng);
            assert_ne!(code, "0");
        }
    }

    #[test]
    fn test_bothify_deterministic() {
        let mut rng1 = StdRng::seed_from_u64(42);
        let mut rng2 = StdRng::seed_from_u64(42);

        assert_eq!(
            bothify("??-##", &mut rng1),
            bothify("??-##", &mut rng2)
        );
    }
}
