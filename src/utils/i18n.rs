//! Translated user-facing strings.
//!
//! Every `*.json` file in the locales directory is a flat `key -> template` map; the file stem
//! is the language code. Templates use `{name}` placeholders.

use std::collections::HashMap;
use std::fmt::Display;
use std::path::Path;
use tracing::{info, warn};

pub const DEFAULT_LOCALE: &str = "en";

#[derive(Debug, Default, Clone)]
pub struct Locales {
    strings: HashMap<String, HashMap<String, String>>,
}

impl Locales {
    /// Load every locale file in `dir`. A missing directory yields no locales,
    /// in which case [`Locales::t`] returns keys unchanged.
    pub fn load(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let mut strings = HashMap::new();

        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Locales directory {} not readable: {}", dir.display(), e);
                return Self { strings };
            }
        };

        for path in entries.filter_map(Result::ok).map(|e| e.path()) {
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(lang) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };
            let parsed = std::fs::read_to_string(&path)
                .map_err(|e| e.to_string())
                .and_then(|text| {
                    serde_json::from_str::<HashMap<String, String>>(&text).map_err(|e| e.to_string())
                });
            match parsed {
                Ok(map) => {
                    info!("Loaded locale: {} ({} keys)", lang, map.len());
                    strings.insert(lang, map);
                }
                Err(e) => warn!("Failed to load locale {}: {}", lang, e),
            }
        }

        Self { strings }
    }

    pub fn from_maps(strings: HashMap<String, HashMap<String, String>>) -> Self {
        Self { strings }
    }

    /// Loaded language codes, sorted.
    pub fn available(&self) -> Vec<String> {
        let mut codes: Vec<String> = self.strings.keys().cloned().collect();
        codes.sort();
        codes
    }

    pub fn has(&self, locale: &str) -> bool {
        self.strings.contains_key(locale)
    }

    /// Translate `key`, falling back to English and then to the key itself.
    pub fn t(&self, key: &str, locale: &str, vars: &[(&str, &(dyn Display + Sync))]) -> String {
        let template = self
            .strings
            .get(locale)
            .and_then(|m| m.get(key))
            .or_else(|| self.strings.get(DEFAULT_LOCALE).and_then(|m| m.get(key)))
            .map(String::as_str)
            .unwrap_or(key);

        vars.iter().fold(template.to_string(), |text, (name, value)| {
            text.replace(&format!("{{{}}}", name), &value.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn locales() -> Locales {
        let en = HashMap::from([
            ("greet".to_string(), "Hello {name}, you are #{pos}".to_string()),
            ("only_en".to_string(), "English only".to_string()),
        ]);
        let tr = HashMap::from([("greet".to_string(), "Merhaba {name}, sıra #{pos}".to_string())]);
        Locales::from_maps(HashMap::from([("en".to_string(), en), ("tr".to_string(), tr)]))
    }

    #[test]
    fn test_substitution() {
        let l = locales();
        assert_eq!(l.t("greet", "tr", &[("name", &"Ayşe"), ("pos", &3)]), "Merhaba Ayşe, sıra #3");
    }

    /// Missing keys fall back to English, then to the key.
    #[test]
    fn test_fallbacks() {
        let l = locales();
        assert_eq!(l.t("only_en", "tr", &[]), "English only");
        assert_eq!(l.t("only_en", "xx", &[]), "English only");
        assert_eq!(l.t("missing_key", "tr", &[]), "missing_key");
    }

    #[test]
    fn test_available_sorted() {
        assert_eq!(locales().available(), vec!["en".to_string(), "tr".to_string()]);
        assert!(locales().has("tr"));
        assert!(!locales().has("de"));
    }

    /// The shipped locale files parse and cover the same keys as English.
    #[test]
    fn test_shipped_locales() {
        let l = Locales::load(concat!(env!("CARGO_MANIFEST_DIR"), "/locales"));
        assert!(l.has("en"));
        let en_keys: Vec<&String> = {
            let mut keys: Vec<&String> = l.strings["en"].keys().collect();
            keys.sort();
            keys
        };
        for code in l.available() {
            let mut keys: Vec<&String> = l.strings[&code].keys().collect();
            keys.sort();
            assert_eq!(keys, en_keys, "locale {} is out of sync", code);
        }
    }

    #[test]
    fn test_missing_dir() {
        let l = Locales::load("/nonexistent/locales");
        assert!(l.available().is_empty());
        assert_eq!(l.t("anything", "en", &[]), "anything");
    }
}
