use crate::error::Result;
use tracing::debug;

/// Password source for encrypted items
///
/// Resolves a password once per run, in priority order:
/// 1. Configured password (from [`crate::ExtractionConfig::password`])
/// 2. Answer from the credential prompt, asked at most once
///
/// The prompt's answer is cached, including a declined prompt, so engines
/// that ask for every encrypted item do not re-prompt the user.
#[derive(Debug, Default)]
pub struct PasswordCache {
    configured: Option<String>,
    prompted: Option<Option<String>>,
}

impl PasswordCache {
    /// Create a cache seeded with an optional configured password
    pub fn new(configured: Option<String>) -> Self {
        Self {
            configured,
            prompted: None,
        }
    }

    /// Return the password, querying `prompt` only on the first miss
    pub fn get(
        &mut self,
        prompt: impl FnOnce() -> Result<Option<String>>,
    ) -> Result<Option<String>> {
        if let Some(password) = &self.configured {
            return Ok(Some(password.clone()));
        }

        if let Some(cached) = &self.prompted {
            return Ok(cached.clone());
        }

        let answer = prompt()?;
        debug!(
            provided = answer.is_some(),
            password_length = answer.as_ref().map_or(0, String::len),
            "password prompt answered"
        );
        self.prompted = Some(answer.clone());
        Ok(answer)
    }

    /// Whether the prompt has been asked this run
    pub fn was_prompted(&self) -> bool {
        self.prompted.is_some()
    }
}
