//! Business directory client
//!
//! Once a session resolves its dialed number, the runner asks the REST
//! backend which business owns that number and pulls the context the AI
//! agent needs (greeting instructions, booking endpoints). The backend
//! itself is an external collaborator; only this lookup contract lives
//! in the bridge.

use crate::domain::error::BridgeError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Context for the business that owns a dialed number
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessContext {
    pub business_id: String,
    pub name: String,
    /// System instructions handed to the AI session
    #[serde(default)]
    pub agent_instructions: Option<String>,
    /// Preferred AI voice, if the business configured one
    #[serde(default)]
    pub voice: Option<String>,
}

/// Directory lookup contract
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    /// Find the business that owns a normalized dialed number
    ///
    /// `Ok(None)` means no business claims the number; the session still
    /// streams, with default agent instructions.
    async fn business_for_number(
        &self,
        dialed_number: &str,
    ) -> Result<Option<BusinessContext>, BridgeError>;
}

/// REST-backed directory client
pub struct HttpDirectoryClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpDirectoryClient {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl DirectoryClient for HttpDirectoryClient {
    async fn business_for_number(
        &self,
        dialed_number: &str,
    ) -> Result<Option<BusinessContext>, BridgeError> {
        let url = format!("{}/businesses/by-number/{}", self.base_url, dialed_number);
        debug!("Directory lookup: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| BridgeError::Directory(format!("request: {}", e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = response
            .error_for_status()
            .map_err(|e| BridgeError::Directory(format!("status: {}", e)))?;

        let context = response
            .json::<BusinessContext>()
            .await
            .map_err(|e| BridgeError::Directory(format!("decode: {}", e)))?;
        Ok(Some(context))
    }
}

/// Static in-memory directory, for tests and single-tenant deployments
#[derive(Default)]
pub struct StaticDirectory {
    entries: Vec<(String, BusinessContext)>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_business(mut self, number: &str, context: BusinessContext) -> Self {
        self.entries.push((number.to_string(), context));
        self
    }
}

#[async_trait]
impl DirectoryClient for StaticDirectory {
    async fn business_for_number(
        &self,
        dialed_number: &str,
    ) -> Result<Option<BusinessContext>, BridgeError> {
        Ok(self
            .entries
            .iter()
            .find(|(number, _)| number == dialed_number)
            .map(|(_, context)| context.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(id: &str) -> BusinessContext {
        BusinessContext {
            business_id: id.to_string(),
            name: "Cut & Curl".to_string(),
            agent_instructions: Some("You book haircuts.".to_string()),
            voice: None,
        }
    }

    #[tokio::test]
    async fn test_static_directory_lookup() {
        let directory = StaticDirectory::new().with_business("+15551230001", context("biz-1"));

        let found = directory
            .business_for_number("+15551230001")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.business_id, "biz-1");

        assert!(directory
            .business_for_number("+15559990000")
            .await
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_business_context_decoding() {
        // Optional fields may be missing from the backend response
        let context: BusinessContext = serde_json::from_str(
            r#"{"business_id": "biz-2", "name": "Dental on 5th"}"#,
        )
        .unwrap();
        assert_eq!(context.business_id, "biz-2");
        assert!(context.agent_instructions.is_none());
    }
}
