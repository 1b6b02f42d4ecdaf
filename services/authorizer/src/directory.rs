//! Org/directory collaborator.
//!
//! # Purpose
//! Answers the organizational questions the hierarchy resolver needs: which
//! departments and groups a user belongs to, the ancestor chain of a
//! department, and display names for IDs.
//!
//! # How it fits
//! [`HttpDirectory`] talks to the directory service over HTTP with `reqwest`.
//! [`StaticDirectory`] is an in-memory stand-in used when no directory URL is
//! configured and in tests.
use crate::error::CollaboratorError;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

const SERVICE: &str = "directory";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Memberships {
    #[serde(default)]
    pub departments: Vec<String>,
    #[serde(default)]
    pub groups: Vec<String>,
}

#[async_trait]
pub trait Directory: Send + Sync {
    /// Ancestors of `department_id`, root first, excluding the department itself.
    async fn department_ancestors(
        &self,
        department_id: &str,
    ) -> Result<Vec<String>, CollaboratorError>;
    /// Direct department and group memberships of a user.
    async fn memberships(&self, user_id: &str) -> Result<Memberships, CollaboratorError>;
    /// Display names for the IDs the directory knows; unknown IDs are omitted.
    async fn names(&self, ids: &[String]) -> Result<HashMap<String, String>, CollaboratorError>;
}

pub struct HttpDirectory {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct AncestorsResponse {
    #[serde(default)]
    ids: Vec<String>,
}

#[derive(Debug, Serialize)]
struct NamesRequest<'a> {
    ids: &'a [String],
}

#[derive(Debug, Deserialize)]
struct NamesResponse {
    #[serde(default)]
    names: HashMap<String, String>,
}

impl HttpDirectory {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, CollaboratorError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| CollaboratorError::from_reqwest(SERVICE, err))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// GET a JSON document; a 404 yields `None`.
    async fn get_optional<T>(&self, path: &str) -> Result<Option<T>, CollaboratorError>
    where
        T: serde::de::DeserializeOwned,
    {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .map_err(|err| CollaboratorError::from_reqwest(SERVICE, err))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response
            .error_for_status()
            .map_err(|err| CollaboratorError::from_reqwest(SERVICE, err))?;
        let body = response
            .json::<T>()
            .await
            .map_err(|err| CollaboratorError::from_reqwest(SERVICE, err))?;
        Ok(Some(body))
    }
}

#[async_trait]
impl Directory for HttpDirectory {
    async fn department_ancestors(
        &self,
        department_id: &str,
    ) -> Result<Vec<String>, CollaboratorError> {
        let body: Option<AncestorsResponse> = self
            .get_optional(&format!("/v1/departments/{department_id}/ancestors"))
            .await?;
        Ok(body.map(|body| body.ids).unwrap_or_default())
    }

    async fn memberships(&self, user_id: &str) -> Result<Memberships, CollaboratorError> {
        let body: Option<Memberships> = self
            .get_optional(&format!("/v1/users/{user_id}/memberships"))
            .await?;
        Ok(body.unwrap_or_default())
    }

    async fn names(&self, ids: &[String]) -> Result<HashMap<String, String>, CollaboratorError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let response = self
            .client
            .post(format!("{}/v1/names", self.base_url))
            .json(&NamesRequest { ids })
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|err| CollaboratorError::from_reqwest(SERVICE, err))?;
        let body: NamesResponse = response
            .json()
            .await
            .map_err(|err| CollaboratorError::from_reqwest(SERVICE, err))?;
        Ok(body.names)
    }
}

/// Fixed in-memory directory.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    parents: HashMap<String, String>,
    users: HashMap<String, Memberships>,
    names: HashMap<String, String>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_department(mut self, id: &str, parent: Option<&str>) -> Self {
        if let Some(parent) = parent {
            self.parents.insert(id.to_string(), parent.to_string());
        }
        self
    }

    pub fn with_user(mut self, id: &str, departments: &[&str], groups: &[&str]) -> Self {
        self.users.insert(
            id.to_string(),
            Memberships {
                departments: departments.iter().map(|d| d.to_string()).collect(),
                groups: groups.iter().map(|g| g.to_string()).collect(),
            },
        );
        self
    }

    pub fn with_name(mut self, id: &str, name: &str) -> Self {
        self.names.insert(id.to_string(), name.to_string());
        self
    }
}

#[async_trait]
impl Directory for StaticDirectory {
    async fn department_ancestors(
        &self,
        department_id: &str,
    ) -> Result<Vec<String>, CollaboratorError> {
        let mut chain = Vec::new();
        let mut seen = HashSet::from([department_id.to_string()]);
        let mut current = department_id;
        while let Some(parent) = self.parents.get(current) {
            // A cycle in the fixture stops the walk instead of looping forever.
            if !seen.insert(parent.clone()) {
                break;
            }
            chain.push(parent.clone());
            current = parent.as_str();
        }
        chain.reverse();
        Ok(chain)
    }

    async fn memberships(&self, user_id: &str) -> Result<Memberships, CollaboratorError> {
        Ok(self.users.get(user_id).cloned().unwrap_or_default())
    }

    async fn names(&self, ids: &[String]) -> Result<HashMap<String, String>, CollaboratorError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.names.get(id).map(|name| (id.clone(), name.clone())))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ancestors_are_root_first() {
        let directory = StaticDirectory::new()
            .with_department("eng", Some("rnd"))
            .with_department("rnd", Some("corp"))
            .with_department("corp", None);
        let chain = directory.department_ancestors("eng").await.expect("chain");
        assert_eq!(chain, vec!["corp".to_string(), "rnd".to_string()]);
        assert!(
            directory
                .department_ancestors("corp")
                .await
                .expect("root")
                .is_empty()
        );
    }

    #[tokio::test]
    async fn cyclic_parents_terminate() {
        let directory = StaticDirectory::new()
            .with_department("a", Some("b"))
            .with_department("b", Some("a"));
        let chain = directory.department_ancestors("a").await.expect("chain");
        assert_eq!(chain, vec!["b".to_string()]);
    }

    #[tokio::test]
    async fn unknown_user_has_no_memberships() {
        let directory = StaticDirectory::new();
        assert_eq!(
            directory.memberships("ghost").await.expect("memberships"),
            Memberships::default()
        );
    }
}
