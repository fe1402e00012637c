//! The translation boundary
//!
//! The engine does not talk to any translation service itself. A caller
//! supplies a [`Translator`]; [`batch_translate`] drives it over an
//! inventory with caching, pacing, retries and cooperative cancellation.
//! Credentials, if the backend needs any, belong to that implementation.

mod cache;

use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::inventory::TextRecord;
use crate::progress::{percent, ProgressCallback};

pub use cache::TranslationCache;

/// A translation backend
pub trait Translator {
    /// Translate a single line of text into `target_lang`
    ///
    /// # Errors
    /// Return [`Error::Translation`] with `transient: true` for failures
    /// worth retrying (timeouts, rate limits).
    fn translate(&self, text: &str, target_lang: &str, context: &str) -> Result<String>;
}

impl<F> Translator for F
where
    F: Fn(&str, &str, &str) -> Result<String>,
{
    fn translate(&self, text: &str, target_lang: &str, context: &str) -> Result<String> {
        self(text, target_lang, context)
    }
}

/// Batch driver settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslateOptions {
    pub target_lang: String,
    /// Free-form hint passed to the backend and mixed into cache keys
    pub context: String,
    /// Pause after each backend call
    pub delay_ms: u64,
    pub max_retries: u32,
    /// First retry delay after a transient failure, doubled per attempt
    pub retry_backoff_ms: u64,
    /// Save the cache after this many new translations
    pub save_every: usize,
    /// Optional cache file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_file: Option<std::path::PathBuf>,
}

impl Default for TranslateOptions {
    fn default() -> Self {
        Self {
            target_lang: "fr".to_string(),
            context: String::new(),
            delay_ms: 100,
            max_retries: 3,
            retry_backoff_ms: 1000,
            save_every: 10,
            cache_file: None,
        }
    }
}

impl TranslateOptions {
    fn cache_context(&self) -> String {
        format!("{}|{}", self.target_lang, self.context)
    }
}

/// Whether a backend answer is usable for `original`
///
/// Empty answers, answers with no letters, and answers more than three
/// times longer than the source are rejected.
#[must_use]
pub fn is_plausible_translation(original: &str, translated: &str) -> bool {
    let translated = translated.trim();
    !translated.is_empty()
        && translated.chars().any(char::is_alphabetic)
        && translated.chars().count() <= original.chars().count().max(1) * 3
}

/// Translate the untranslated records in place
///
/// Records already marked translated are left alone. Multi-line text is
/// translated line by line, keeping blank lines and each line's leading
/// and trailing whitespace. Trailing line breaks are kept as they were,
/// and lines are rejoined with `\r\n` when the text uses it anywhere and
/// `\n` otherwise, so mixed line endings come out uniform. A record whose
/// translation fails is logged and skipped. `should_stop` is polled before every record.
///
/// Returns the number of records newly translated.
pub fn batch_translate(
    records: &mut [TextRecord],
    translator: &dyn Translator,
    cache: &mut TranslationCache,
    options: &TranslateOptions,
    progress: ProgressCallback,
    should_stop: &dyn Fn() -> bool,
) -> usize {
    let mut driver = Driver {
        translator,
        cache,
        options,
        context: options.cache_context(),
    };
    let pending: Vec<usize> = (0..records.len()).filter(|&i| !records[i].is_translated).collect();
    let total = pending.len();
    tracing::info!("Translating {} records into {}", total, options.target_lang);

    let mut translated_count = 0;
    for (n, index) in pending.into_iter().enumerate() {
        if should_stop() {
            tracing::info!("Translation stopped after {} of {} records", n, total);
            break;
        }
        let record = &mut records[index];
        let label = record.asset_name.clone().unwrap_or_else(|| record.id.clone());
        progress(percent(n, total), &format!("{}/{} Translating {}", n + 1, total, label));

        match driver.translate_text(&record.original_text) {
            Ok(translated) if translated != record.original_text => {
                record.translated_text = translated;
                record.is_translated = true;
                translated_count += 1;
                if options.save_every > 0 && translated_count % options.save_every == 0 {
                    if let Err(e) = driver.cache.save() {
                        tracing::warn!("Failed to save translation cache: {}", e);
                    }
                }
            }
            Ok(_) => tracing::debug!("{} left unchanged", record.id),
            Err(e) => tracing::warn!("Failed to translate {}: {}", record.id, e),
        }
    }

    if let Err(e) = driver.cache.save() {
        tracing::warn!("Failed to save translation cache: {}", e);
    }
    progress(100.0, &format!("Translated {translated_count} of {total} records"));
    translated_count
}

struct Driver<'a> {
    translator: &'a dyn Translator,
    cache: &'a mut TranslationCache,
    options: &'a TranslateOptions,
    context: String,
}

impl Driver<'_> {
    fn translate_text(&mut self, text: &str) -> Result<String> {
        let body = text.trim_end_matches(['\r', '\n']);
        if body.trim().is_empty() {
            return Ok(text.to_string());
        }
        let ending = &text[body.len()..];
        if !body.contains('\n') {
            return Ok(self.translate_line(body)? + ending);
        }

        let mut lines = Vec::new();
        for line in body.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                lines.push(line.to_string());
                continue;
            }
            let lead = &line[..line.len() - line.trim_start().len()];
            let tail = &line[line.trim_end().len()..];
            lines.push(format!("{lead}{}{tail}", self.translate_line(trimmed)?));
        }
        let newline = if body.contains("\r\n") { "\r\n" } else { "\n" };
        Ok(lines.join(newline) + ending)
    }

    fn translate_line(&mut self, line: &str) -> Result<String> {
        if let Some(hit) = self.cache.get(&self.context, line) {
            return Ok(hit.to_string());
        }

        let attempts = self.options.max_retries.max(1);
        let mut backoff = Duration::from_millis(self.options.retry_backoff_ms);
        let mut last_error = String::new();
        for attempt in 1..=attempts {
            let result = self
                .translator
                .translate(line, &self.options.target_lang, &self.options.context);
            thread::sleep(Duration::from_millis(self.options.delay_ms));
            match result {
                Ok(translated) if is_plausible_translation(line, &translated) => {
                    let translated = translated.trim().to_string();
                    self.cache.insert(&self.context, line, translated.clone());
                    return Ok(translated);
                }
                Ok(translated) => {
                    tracing::debug!("Implausible translation on attempt {}: {:?}", attempt, translated);
                    last_error = format!("implausible translation {translated:?}");
                }
                Err(e) if e.is_transient() => {
                    tracing::warn!("Transient translation failure (attempt {}/{}): {}", attempt, attempts, e);
                    last_error = e.to_string();
                    if attempt < attempts {
                        thread::sleep(backoff);
                        backoff *= 2;
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Err(Error::Translation {
            message: format!("gave up after {attempts} attempts: {last_error}"),
            transient: false,
        })
    }
}
