use battler_wamp_values::Dictionary;

use crate::core::{
    error::InvalidConfigError,
    options::AuthMethod,
};

/// Configuration for a session on a realm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Authentication methods offered to the router, in order of preference.
    pub auth_methods: Vec<AuthMethod>,
    pub auth_id: Option<String>,
    pub auth_role: Option<String>,
    pub auth_extra: Dictionary,
    /// Secret for ticket, challenge-response, and SCRAM authentication.
    pub secret: Option<String>,
    pub resumable: Option<bool>,
    pub resume_session: Option<u64>,
    pub resume_token: Option<String>,
}

impl SessionConfig {
    /// Creates an anonymous session configuration.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), InvalidConfigError> {
        if self.auth_methods.is_empty() {
            return Err(InvalidConfigError::new(
                "at least one authentication method must be offered",
            ));
        }
        for method in &self.auth_methods {
            match method {
                AuthMethod::Anonymous => (),
                AuthMethod::Undisputed | AuthMethod::Cryptosign => {
                    if self.auth_id.is_none() {
                        return Err(InvalidConfigError::new(format!(
                            "{method} authentication requires an authid"
                        )));
                    }
                }
                AuthMethod::Ticket | AuthMethod::WampCra | AuthMethod::WampScram => {
                    if self.auth_id.is_none() || self.secret.is_none() {
                        return Err(InvalidConfigError::new(format!(
                            "{method} authentication requires an authid and a secret"
                        )));
                    }
                }
            }
        }
        if self.resume_token.is_some() && self.resume_session.is_none() {
            return Err(InvalidConfigError::new(
                "a resume token requires a session to resume",
            ));
        }
        Ok(())
    }

    /// A short description of the offered authentication methods.
    pub fn describe_auth_methods(&self) -> String {
        self.auth_methods
            .iter()
            .map(|method| method.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auth_methods: Vec::from_iter([AuthMethod::Anonymous]),
            auth_id: None,
            auth_role: None,
            auth_extra: Dictionary::default(),
            secret: None,
            resumable: None,
            resume_session: None,
            resume_token: None,
        }
    }
}

#[cfg(test)]
mod config_test {
    use crate::{
        core::options::AuthMethod,
        session::SessionConfig,
    };

    #[test]
    fn anonymous_is_valid() {
        assert_matches::assert_matches!(SessionConfig::anonymous().validate(), Ok(()));
    }

    #[test]
    fn scram_requires_credentials() {
        let mut config = SessionConfig {
            auth_methods: Vec::from_iter([AuthMethod::WampScram]),
            auth_id: Some("user".to_owned()),
            ..Default::default()
        };
        assert_matches::assert_matches!(config.validate(), Err(err) => {
            assert_eq!(err.to_string(), "wamp-scram authentication requires an authid and a secret");
        });
        config.secret = Some("password".to_owned());
        assert_matches::assert_matches!(config.validate(), Ok(()));
    }

    #[test]
    fn requires_some_method() {
        let config = SessionConfig {
            auth_methods: Vec::new(),
            ..Default::default()
        };
        assert_matches::assert_matches!(config.validate(), Err(_));
    }

    #[test]
    fn resume_token_requires_session() {
        let config = SessionConfig {
            resume_token: Some("token".to_owned()),
            ..Default::default()
        };
        assert_matches::assert_matches!(config.validate(), Err(_));
    }
}
