//! Normalizer
//!
//! Place-name normalization: trim, look up a curated transliteration
//! table, else Unicode-decompose, drop non-ASCII, lowercase, strip
//! non-alphanumerics, collapse whitespace.

use std::collections::HashMap;
use std::sync::OnceLock;
use unicode_normalization::UnicodeNormalization;

fn translations() -> &'static HashMap<&'static str, &'static str> {
    static TRANSLATIONS: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    TRANSLATIONS.get_or_init(|| {
        HashMap::from([
        ("تهران", "tehran"),
        ("مشهد", "mashhad"),
        ("اصفهان", "isfahan"),
        ("شیراز", "shiraz"),
        ("تبریز", "tabriz"),
        ("کرج", "karaj"),
        ("قم", "qom"),
        ("اهواز", "ahvaz"),
        ("ساری", "sari"),
        ("رشت", "rasht"),
        ("یزد", "yazd"),
        ("کرمان", "kerman"),
        ("بندرعباس", "bandar abbas"),
        ("زاهدان", "zahedan"),
        ("همدان", "hamedan"),
        ("ارومیه", "urmia"),
        ("اراک", "arak"),
        ("قزوین", "qazvin"),
        ("بابل", "babol"),
        ("گرگان", "gorgan"),
        ("سنندج", "sanandaj"),
        ("خرم‌آباد", "khorramabad"),
        ("بوشهر", "bushehr"),
        ("بیرجند", "birjand"),
        ("سمنان", "semnan"),
        ("ایلام", "ilam"),
        ("یاسوج", "yasuj"),
        ("شهرکرد", "shahrekord"),
        ])
    })
}

/// Canonical form of a place name. Idempotent: `normalize(normalize(x))
/// == normalize(x)`.
pub fn normalize(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    if let Some(&translated) = translations().get(trimmed) {
        return translated.to_string();
    }
    let lowered_key = trimmed.to_lowercase();
    if let Some(&translated) = translations().get(lowered_key.as_str()) {
        return translated.to_string();
    }

    let decomposed: String = trimmed.nfkd().collect();
    let ascii_folded: String = decomposed.chars().filter(|c| c.is_ascii()).collect();
    let lowered = ascii_folded.to_lowercase();

    let alnum_and_space: String = lowered
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
        .collect();

    alnum_and_space.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_is_idempotent() {
        let x = "  Tehrán-City!! ";
        assert_eq!(normalize(&normalize(x)), normalize(x));
    }

    #[test]
    fn strips_accents_and_punctuation() {
        assert_eq!(normalize("São Paulo!"), "sao paulo");
    }

    #[test]
    fn translates_known_persian_names() {
        assert_eq!(normalize("تهران"), "tehran");
        assert_eq!(normalize("مشهد"), "mashhad");
    }

    #[test]
    fn collapses_internal_whitespace() {
        assert_eq!(normalize("New    York"), "new york");
    }

    #[test]
    fn empty_and_whitespace_only_normalize_to_empty() {
        assert_eq!(normalize("   "), "");
        assert_eq!(normalize(""), "");
    }
}
