//! Token counting strategies for the chunker.
//!
//! A [`TokenCounter`] is selected once at chunker construction and never
//! switched afterward:
//! - **Heuristic** — estimates `chars / 4`, no dependencies.
//! - **Exact** — a HuggingFace subword tokenizer loaded from a
//!   `tokenizer.json` file (requires the `exact-tokenizer` feature).

/// Approximate chars-per-token ratio used by the heuristic estimator and
/// the character-based overlap fallback.
pub const CHARS_PER_TOKEN: usize = 4;

/// A fixed token-counting strategy.
#[derive(Clone)]
pub enum TokenCounter {
    /// `chars / 4` estimate.
    Heuristic,
    /// Exact subword counting via a loaded tokenizer.
    #[cfg(feature = "exact-tokenizer")]
    Exact(tokenizers::Tokenizer),
}

impl TokenCounter {
    pub fn heuristic() -> Self {
        Self::Heuristic
    }

    /// Load an exact tokenizer from a `tokenizer.json` file.
    #[cfg(feature = "exact-tokenizer")]
    pub fn exact_from_file(path: &std::path::Path) -> anyhow::Result<Self> {
        let tokenizer = tokenizers::Tokenizer::from_file(path)
            .map_err(|e| anyhow::anyhow!("failed to load tokenizer from {}: {}", path.display(), e))?;
        Ok(Self::Exact(tokenizer))
    }

    /// Count tokens in `text` under this strategy.
    pub fn count(&self, text: &str) -> usize {
        match self {
            Self::Heuristic => text.chars().count() / CHARS_PER_TOKEN,
            #[cfg(feature = "exact-tokenizer")]
            Self::Exact(tokenizer) => tokenizer
                .encode(text, false)
                .map(|enc| enc.get_ids().len())
                // Encoding failures degrade to the estimate rather than abort chunking.
                .unwrap_or_else(|_| text.chars().count() / CHARS_PER_TOKEN),
        }
    }

    /// Return the trailing `tokens` tokens of `text` as a string.
    ///
    /// The heuristic strategy approximates with the last `tokens * 4`
    /// characters. Text shorter than the requested tail is returned whole.
    pub fn tail(&self, text: &str, tokens: usize) -> String {
        match self {
            Self::Heuristic => char_tail(text, tokens * CHARS_PER_TOKEN),
            #[cfg(feature = "exact-tokenizer")]
            Self::Exact(tokenizer) => {
                let encoding = match tokenizer.encode(text, false) {
                    Ok(enc) => enc,
                    Err(_) => return char_tail(text, tokens * CHARS_PER_TOKEN),
                };
                let ids = encoding.get_ids();
                if ids.len() <= tokens {
                    return text.to_string();
                }
                tokenizer
                    .decode(&ids[ids.len() - tokens..], true)
                    .unwrap_or_else(|_| char_tail(text, tokens * CHARS_PER_TOKEN))
            }
        }
    }
}

/// Last `n` characters of `text`, respecting UTF-8 boundaries.
fn char_tail(text: &str, n: usize) -> String {
    let total = text.chars().count();
    if total <= n {
        return text.to_string();
    }
    let byte_start = text
        .char_indices()
        .nth(total - n)
        .map(|(i, _)| i)
        .unwrap_or(0);
    text[byte_start..].to_string()
}
