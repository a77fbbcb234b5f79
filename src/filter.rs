//! Banned-phrase filter
//!
//! Immutable after construction, so it is shared as `Arc<Filter>`
//! and read without any coordination.

/// Case-insensitive banned substring checker
#[derive(Debug, Clone, Default)]
pub struct Filter {
    phrases: Vec<String>,
}

impl Filter {
    /// Build a filter from configured phrases
    ///
    /// Phrases are trimmed and lowercased; blank ones are dropped.
    pub fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let phrases = phrases
            .into_iter()
            .map(|p| p.as_ref().trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        Self { phrases }
    }

    /// True if any banned phrase occurs anywhere in `body`
    pub fn contains_banned(&self, body: &str) -> bool {
        if self.phrases.is_empty() {
            return false;
        }
        let body = body.to_lowercase();
        self.phrases.iter().any(|phrase| body.contains(phrase.as_str()))
    }

    /// The configured phrases, in configuration order
    pub fn phrases(&self) -> &[String] {
        &self.phrases
    }
}
