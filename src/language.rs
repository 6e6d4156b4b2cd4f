use std::collections::HashSet;
use std::future::Future;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

const ENGLISH_FUNCTION_WORDS: &[&str] = &[
    "the", "and", "of", "to", "a", "in", "that", "it", "with", "as", "for",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    Russian,
    English,
}

impl Language {
    pub fn code(self) -> &'static str {
        match self {
            Language::Russian => "ru",
            Language::English => "en",
        }
    }

    fn is_script_letter(self, c: char) -> bool {
        match self {
            Language::Russian => matches!(c, '\u{0400}'..='\u{04FF}'),
            Language::English => c.is_ascii_alphabetic() || matches!(c, '\u{00C0}'..='\u{024F}'),
        }
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "ru" | "rus" | "russian" | "русский" => Ok(Language::Russian),
            "en" | "eng" | "english" => Ok(Language::English),
            other => Err(format!("unsupported language '{other}' (expected ru or en)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enforced {
    pub text: String,
    /// How many times `regenerate` was called.
    pub attempts: u32,
    pub ok: bool,
}

#[derive(Debug, Clone)]
pub struct LanguageGuard {
    language: Language,
    min_script_ratio: f32,
}

impl LanguageGuard {
    pub fn new(language: Language) -> Self {
        Self {
            language,
            min_script_ratio: 0.8,
        }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn is_target_language(&self, text: &str) -> bool {
        let mut letters = 0usize;
        let mut in_script = 0usize;
        for c in text.chars().filter(|c| c.is_alphabetic()) {
            letters += 1;
            if self.language.is_script_letter(c) {
                in_script += 1;
            }
        }

        if letters == 0 {
            return false;
        }
        if (in_script as f32 / letters as f32) < self.min_script_ratio {
            return false;
        }

        match self.language {
            Language::Russian => !has_english_fragments(text),
            Language::English => true,
        }
    }

    /// Regenerates until the text passes detection or `max_attempts`
    /// regenerations are spent. Exhaustion is reported through `ok`, only a
    /// failing `regenerate` call is an error.
    pub async fn enforce<F, Fut, E>(
        &self,
        text: String,
        mut regenerate: F,
        max_attempts: u32,
    ) -> Result<Enforced, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<String, E>>,
    {
        let mut text = text;
        let mut attempts = 0;

        loop {
            if self.is_target_language(&text) {
                return Ok(Enforced {
                    text,
                    attempts,
                    ok: true,
                });
            }

            if attempts >= max_attempts {
                tracing::warn!(
                    language = self.language.code(),
                    attempts,
                    "text still not in target language, keeping last attempt"
                );
                return Ok(Enforced {
                    text,
                    attempts,
                    ok: false,
                });
            }

            attempts += 1;
            tracing::debug!(
                language = self.language.code(),
                attempt = attempts,
                max_attempts,
                "language check failed, regenerating"
            );
            text = regenerate().await?;
        }
    }
}

fn has_english_fragments(text: &str) -> bool {
    let words: Vec<String> = text
        .split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .collect();
    if words.len() <= 10 {
        return false;
    }

    let present: HashSet<&str> = words
        .iter()
        .map(String::as_str)
        .filter(|w| ENGLISH_FUNCTION_WORDS.contains(w))
        .collect();
    present.len() > 2
}
