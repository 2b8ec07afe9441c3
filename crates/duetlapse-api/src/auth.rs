use secrecy::{ExposeSecret, SecretString};

/// HTTP Basic credentials for the webcam endpoint.
///
/// The password stays wrapped in [`SecretString`] so it never shows up in
/// `Debug` output or logs.
#[derive(Debug, Clone)]
pub struct BasicAuth {
    pub username: String,
    pub password: SecretString,
}

impl BasicAuth {
    pub fn new(username: impl Into<String>, password: SecretString) -> Self {
        Self {
            username: username.into(),
            password,
        }
    }

    /// Parse `user:password`. The password may itself contain colons.
    ///
    /// Returns `None` when there is no `:` separator.
    pub fn parse(pair: &str) -> Option<Self> {
        let (username, password) = pair.split_once(':')?;
        Some(Self::new(username, SecretString::from(password.to_owned())))
    }

    /// Apply these credentials to a request.
    pub fn apply(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.basic_auth(&self.username, Some(self.password.expose_secret()))
    }
}
