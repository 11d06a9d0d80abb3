// src/detector.rs

//! Availability classification and content fingerprinting.
//!
//! The detector pulls the purchase-relevant section out of a noisy
//! product page, classifies it against phrase lists, and hashes the
//! normalized section text. Fingerprinting the section rather than the
//! full page avoids churn from ads and timestamps; any change to the
//! section text changes the fingerprint even when availability does
//! not, so this is a content-change detector by design.

use scraper::{Html, Selector};
use sha2::{Digest, Sha256};

use crate::error::{AppError, Result};
use crate::models::{DetectorConfig, Signal};

/// Detector with compiled selectors and lowercased phrase lists.
pub struct ChangeDetector {
    selectors: Vec<Selector>,
    negative_phrases: Vec<String>,
    positive_phrases: Vec<String>,
}

impl ChangeDetector {
    /// Compile the configured selectors and phrase lists.
    pub fn new(config: &DetectorConfig) -> Result<Self> {
        let selectors = config
            .section_selectors
            .iter()
            .map(|s| parse_selector(s))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            selectors,
            negative_phrases: lowercase_all(&config.negative_phrases),
            positive_phrases: lowercase_all(&config.positive_phrases),
        })
    }

    /// Extract the availability signal from page HTML.
    ///
    /// Pure function of the input: identical HTML always yields an
    /// identical signal.
    pub fn extract_signal(&self, html: &str) -> Signal {
        let text = self.section_text(html);
        Signal {
            available: self.classify(&text),
            fingerprint: fingerprint(&text),
        }
    }

    /// Classify normalized page text: negative phrases take precedence,
    /// then positive phrases, and neither defaults to unavailable.
    pub fn classify(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        if self.negative_phrases.iter().any(|p| text.contains(p)) {
            return false;
        }
        self.positive_phrases.iter().any(|p| text.contains(p))
    }

    /// Normalized text of the highest-priority matching section, or of
    /// the whole page when no selector matches.
    fn section_text(&self, html: &str) -> String {
        let document = Html::parse_document(html);

        for selector in &self.selectors {
            if let Some(element) = document.select(selector).next() {
                let text = normalize(element.text());
                if !text.is_empty() {
                    return text;
                }
            }
        }

        normalize(document.root_element().text())
    }
}

/// Hex-encoded SHA-256 digest of the given text.
pub fn fingerprint(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Collapse whitespace across text nodes and lowercase the result.
fn normalize<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn lowercase_all(phrases: &[String]) -> Vec<String> {
    phrases.iter().map(|p| p.to_lowercase()).collect()
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> ChangeDetector {
        ChangeDetector::new(&DetectorConfig::default()).unwrap()
    }

    #[test]
    fn negative_phrase_takes_precedence() {
        let d = detector();
        assert!(!d.classify("uitverkocht, maar binnenkort op voorraad"));
        assert!(!d.classify("Sold out, was in stock yesterday"));
    }

    #[test]
    fn positive_phrase_means_available() {
        let d = detector();
        assert!(d.classify("product is op voorraad, bestel nu"));
        assert!(d.classify("Add to cart"));
    }

    #[test]
    fn neutral_text_defaults_to_unavailable() {
        let d = detector();
        assert!(!d.classify("welkom bij onze winkel"));
        assert!(!d.classify(""));
    }

    #[test]
    fn fingerprint_is_deterministic() {
        assert_eq!(fingerprint("op voorraad"), fingerprint("op voorraad"));
        assert_eq!(fingerprint("").len(), 64);
    }

    #[test]
    fn fingerprint_is_sensitive_to_any_change() {
        assert_ne!(fingerprint("op voorraad"), fingerprint("op voorraad."));
        assert_ne!(fingerprint("a"), fingerprint("b"));
    }

    #[test]
    fn buy_block_section_is_preferred() {
        let d = detector();
        let html = r#"
            <html><body>
                <div class="ads">uitverkocht elders, niet relevant</div>
                <div data-test="buy-block">Op voorraad. In winkelwagen</div>
            </body></html>
        "#;
        let signal = d.extract_signal(html);
        assert!(signal.available);
    }

    #[test]
    fn unrelated_page_changes_keep_fingerprint_stable() {
        let d = detector();
        let page = |footer: &str| {
            format!(
                r#"<html><body>
                    <div data-test="buy-block">Tijdelijk niet leverbaar</div>
                    <footer>{footer}</footer>
                </body></html>"#
            )
        };

        let first = d.extract_signal(&page("bezoek 1024 - 12:00:01"));
        let second = d.extract_signal(&page("bezoek 2048 - 12:05:33"));
        assert_eq!(first.fingerprint, second.fingerprint);
        assert!(!first.available);
    }

    #[test]
    fn section_change_changes_fingerprint() {
        let d = detector();
        let sold_out =
            d.extract_signal(r#"<div data-test="buy-block">Uitverkocht</div>"#);
        let in_stock =
            d.extract_signal(r#"<div data-test="buy-block">Op voorraad</div>"#);
        assert_ne!(sold_out.fingerprint, in_stock.fingerprint);
        assert!(!sold_out.available);
        assert!(in_stock.available);
    }

    #[test]
    fn falls_back_to_full_page_text() {
        let d = detector();
        let html = "<html><body><p>Dit product is uitverkocht</p></body></html>";
        let signal = d.extract_signal(html);
        assert!(!signal.available);
        assert_eq!(signal.fingerprint.len(), 64);
    }

    #[test]
    fn whitespace_is_normalized_before_hashing() {
        let d = detector();
        let compact = d.extract_signal(r#"<div data-test="buy-block">Op voorraad</div>"#);
        let spaced =
            d.extract_signal("<div data-test=\"buy-block\">  Op\n   voorraad </div>");
        assert_eq!(compact.fingerprint, spaced.fingerprint);
    }

    #[test]
    fn rejects_invalid_selector() {
        let mut config = DetectorConfig::default();
        config.section_selectors.push("[[invalid".to_string());
        assert!(ChangeDetector::new(&config).is_err());
    }
}
