//! The editable prompt sent with every merge.

/// Prompt used until the user edits it.
pub const DEFAULT_PROMPT: &str = "Make a photo taken with a Polaroid camera. The photo shoot should look like an ordinary photograph, without an explicit subject or priority. The photo should have a slight blur and a consistent light source, like a flash from a dark room, scattered throughout the photo. Don’t change the face, Change the background behind those two people with white curtains. With that boy Put his arm on my shoulder.";

/// Prompt text. Replaced verbatim on every edit; empty is allowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt(String);

impl Default for Prompt {
    fn default() -> Self {
        Self(DEFAULT_PROMPT.to_string())
    }
}

impl Prompt {
    /// Creates a prompt with the given text.
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Replaces the whole text.
    pub fn set(&mut self, text: impl Into<String>) {
        self.0 = text.into();
    }

    /// Returns the text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True while the text is still the default.
    pub fn is_default(&self) -> bool {
        self.0 == DEFAULT_PROMPT
    }
}

impl std::fmt::Display for Prompt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prompt() {
        let prompt = Prompt::default();
        assert!(prompt.is_default());
        assert!(prompt.as_str().starts_with("Make a photo taken with a Polaroid camera."));
    }

    #[test]
    fn test_set_replaces_verbatim() {
        let mut prompt = Prompt::default();
        prompt.set("  two friends at the beach  ");
        assert_eq!(prompt.as_str(), "  two friends at the beach  ");
        assert!(!prompt.is_default());

        prompt.set("");
        assert_eq!(prompt.as_str(), "");
    }
}
