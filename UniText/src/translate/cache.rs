//! Persistent translation cache
//!
//! Keys are the hex MD5 of `context + '\u{1f}' + text`, so the same line
//! translated under two contexts (or two target languages) gets two entries.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

const KEY_SEPARATOR: char = '\u{1f}';

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    #[serde(default)]
    translations: BTreeMap<String, String>,
}

/// Cache of finished translations, optionally backed by a JSON file
#[derive(Debug, Default)]
pub struct TranslationCache {
    path: Option<PathBuf>,
    entries: BTreeMap<String, String>,
    dirty: bool,
}

impl TranslationCache {
    /// A cache that is never written to disk
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open the cache file at `path`; a missing file gives an empty cache
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let path = path.into();
        let entries = if path.is_file() {
            let file: CacheFile = serde_json::from_str(&fs::read_to_string(&path)?)?;
            tracing::debug!("Loaded {} cached translations from {}", file.translations.len(), path.display());
            file.translations
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path: Some(path),
            entries,
            dirty: false,
        })
    }

    /// Cache key for `text` under `context`
    #[must_use]
    pub fn key(context: &str, text: &str) -> String {
        format!("{:x}", md5::compute(format!("{context}{KEY_SEPARATOR}{text}")))
    }

    #[must_use]
    pub fn get(&self, context: &str, text: &str) -> Option<&str> {
        self.entries.get(&Self::key(context, text)).map(String::as_str)
    }

    pub fn insert(&mut self, context: &str, text: &str, translation: String) {
        self.entries.insert(Self::key(context, text), translation);
        self.dirty = true;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.dirty |= !self.entries.is_empty();
        self.entries.clear();
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Write the cache if it changed since the last save
    ///
    /// The JSON goes to a temporary sibling that is renamed over the cache
    /// file. In-memory caches are never written.
    ///
    /// # Errors
    /// Returns an error if serialization or the write fails.
    pub fn save(&mut self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if !self.dirty {
            return Ok(());
        }
        let json = serde_json::to_string_pretty(&CacheFile {
            translations: self.entries.clone(),
        })?;
        let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
        fs::create_dir_all(dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.flush()?;
        tmp.persist(path).map_err(|e| e.error)?;
        self.dirty = false;
        tracing::debug!("Saved {} cached translations", self.entries.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_depends_on_context() {
        assert_eq!(TranslationCache::key("fr", "Hello"), TranslationCache::key("fr", "Hello"));
        assert_ne!(TranslationCache::key("fr", "Hello"), TranslationCache::key("de", "Hello"));
        // The separator keeps "a" + "bc" apart from "ab" + "c"
        assert_ne!(TranslationCache::key("a", "bc"), TranslationCache::key("ab", "c"));
        assert_eq!(TranslationCache::key("", "x").len(), 32);
    }

    #[test]
    fn test_save_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache").join("translations.json");

        let mut cache = TranslationCache::open(&path).unwrap();
        assert!(cache.is_empty());
        cache.insert("fr", "Hello", "Bonjour".to_string());
        cache.save().unwrap();

        let reopened = TranslationCache::open(&path).unwrap();
        assert_eq!(reopened.get("fr", "Hello"), Some("Bonjour"));
        assert_eq!(reopened.get("de", "Hello"), None);
    }

    #[test]
    fn test_in_memory_cache_never_writes() {
        let mut cache = TranslationCache::in_memory();
        cache.insert("fr", "Yes", "Oui".to_string());
        cache.save().unwrap();
        assert!(cache.path().is_none());
        assert_eq!(cache.len(), 1);
    }
}
