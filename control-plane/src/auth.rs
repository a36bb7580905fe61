use std::fmt;

/// Where the bearer credential comes from.
///
/// The value is looked up on every call; a long-running server picks up a
/// token that appears (or disappears) after startup.
#[derive(Clone)]
pub enum TokenSource {
    /// Name of an environment variable.
    Environment(String),
    Fixed(Option<String>),
}

impl TokenSource {
    pub fn current(&self) -> Option<String> {
        let value = match self {
            TokenSource::Environment(var) => std::env::var(var).ok(),
            TokenSource::Fixed(value) => value.clone(),
        };
        value.filter(|token| !token.trim().is_empty())
    }

    /// Value of the `Authorization` header, if a token is available.
    pub fn header_value(&self) -> Option<String> {
        self.current().map(|token| format!("token {token}"))
    }
}

impl fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenSource::Environment(var) => f.debug_tuple("Environment").field(var).finish(),
            TokenSource::Fixed(value) => f
                .debug_tuple("Fixed")
                .field(&value.as_ref().map(|_| "<redacted>"))
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_token_formats_header() {
        let source = TokenSource::Fixed(Some("abc".into()));
        assert_eq!(source.header_value().as_deref(), Some("token abc"));
    }

    #[test]
    fn blank_token_counts_as_missing() {
        assert_eq!(TokenSource::Fixed(Some("  ".into())).current(), None);
        assert_eq!(TokenSource::Fixed(None).header_value(), None);
    }

    #[test]
    fn unset_environment_variable_is_missing() {
        let source = TokenSource::Environment("BATCH_TEST_TOKEN_THAT_IS_NEVER_SET".into());
        assert_eq!(source.current(), None);
    }

    #[test]
    fn debug_output_hides_secret() {
        let rendered = format!("{:?}", TokenSource::Fixed(Some("secret".into())));
        assert!(!rendered.contains("secret"));
    }
}
