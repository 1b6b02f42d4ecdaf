//! Caller identity via OAuth2 token introspection.
//!
//! Authoring endpoints require an active bearer token. The token is checked
//! against the identity service's introspection endpoint; the decision
//! endpoints take the accessor from the request body instead.
use crate::error::CollaboratorError;
use crate::model::AccessorInfo;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use warden_authz::AccessorType;

const SERVICE: &str = "introspection";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallerKind {
    #[default]
    User,
    App,
}

/// RFC 7662 introspection response, reduced to the fields used here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Introspection {
    pub active: bool,
    #[serde(default, rename = "sub")]
    pub subject: Option<String>,
    #[serde(default)]
    pub kind: CallerKind,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl Introspection {
    pub fn inactive() -> Self {
        Self::default()
    }

    /// Accessor acting behind the token, if the token is active.
    pub fn caller(&self) -> Option<AccessorInfo> {
        if !self.active {
            return None;
        }
        match self.kind {
            CallerKind::User => self
                .subject
                .as_ref()
                .map(|sub| AccessorInfo::new(sub.clone(), AccessorType::User)),
            CallerKind::App => self
                .client_id
                .as_ref()
                .or(self.subject.as_ref())
                .map(|id| AccessorInfo::new(id.clone(), AccessorType::App)),
        }
    }
}

#[async_trait]
pub trait TokenIntrospector: Send + Sync {
    async fn introspect(&self, token: &str) -> Result<Introspection, CollaboratorError>;
}

pub struct HttpIntrospector {
    client: reqwest::Client,
    url: String,
}

impl HttpIntrospector {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, CollaboratorError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| CollaboratorError::from_reqwest(SERVICE, err))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl TokenIntrospector for HttpIntrospector {
    async fn introspect(&self, token: &str) -> Result<Introspection, CollaboratorError> {
        let response = self
            .client
            .post(&self.url)
            .form(&[("token", token)])
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|err| CollaboratorError::from_reqwest(SERVICE, err))?;
        response
            .json::<Introspection>()
            .await
            .map_err(|err| CollaboratorError::from_reqwest(SERVICE, err))
    }
}

/// Fixed token table. Unknown tokens introspect as inactive.
#[derive(Debug, Clone, Default)]
pub struct StaticIntrospector {
    tokens: HashMap<String, Introspection>,
}

impl StaticIntrospector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, token: &str, subject: &str) -> Self {
        self.tokens.insert(
            token.to_string(),
            Introspection {
                active: true,
                subject: Some(subject.to_string()),
                kind: CallerKind::User,
                client_id: None,
                scope: None,
            },
        );
        self
    }
}

#[async_trait]
impl TokenIntrospector for StaticIntrospector {
    async fn introspect(&self, token: &str) -> Result<Introspection, CollaboratorError> {
        Ok(self
            .tokens
            .get(token)
            .cloned()
            .unwrap_or_else(Introspection::inactive))
    }
}

/// Introspector used when none is configured: every token is inactive.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAllIntrospector;

#[async_trait]
impl TokenIntrospector for DenyAllIntrospector {
    async fn introspect(&self, _token: &str) -> Result<Introspection, CollaboratorError> {
        Ok(Introspection::inactive())
    }
}
