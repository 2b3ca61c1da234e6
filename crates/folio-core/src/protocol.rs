//! Request and response shapes exchanged with sync clients
//!
//! Requests are validated here, before the coordinator runs, so malformed
//! input never reaches the state machine.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{
    ConflictBlock, ConflictId, NotebookId, ResolutionStrategy, SessionToken, UserId,
};
use crate::sync::{PatchOutcome, ResolveOutcome, SessionStart, SyncStatus};

/// Body of an apply-patch call
#[derive(Debug, Clone, Deserialize)]
pub struct ApplyPatchRequest {
    pub session_token: String,
    /// Serialized patch; blank means poll for changes
    #[serde(default)]
    pub patch: String,
    /// Client installation id, used to label log lines
    #[serde(default)]
    pub client_id: Option<String>,
}

impl ApplyPatchRequest {
    /// Client label for logs; blank or missing ids read as `unknown`
    pub fn client(&self) -> &str {
        self.client_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or("unknown")
    }

    /// Check the size bound and parse the session token
    pub fn validate(&self, max_bytes: usize) -> Result<SessionToken> {
        if self.patch.len() > max_bytes {
            return Err(Error::InvalidInput(format!(
                "patch is {} bytes, limit is {max_bytes}",
                self.patch.len()
            )));
        }
        self.session_token
            .parse()
            .map_err(|e| Error::InvalidInput(format!("invalid session token: {e}")))
    }
}

/// Body of a resolve-conflict call
#[derive(Debug, Clone, Deserialize)]
pub struct ResolveConflictRequest {
    pub resolution_strategy: String,
    #[serde(default)]
    pub final_content: Option<String>,
}

impl ResolveConflictRequest {
    /// Parse the strategy; only final choices are accepted and MANUAL needs content
    pub fn validate(&self) -> Result<ResolutionStrategy> {
        let strategy: ResolutionStrategy = self.resolution_strategy.parse()?;
        if !strategy.is_user_choice() {
            return Err(Error::InvalidStrategy(strategy.to_string()));
        }
        if strategy == ResolutionStrategy::Manual && self.final_content.is_none() {
            return Err(Error::InvalidStrategy(
                "MANUAL resolution requires final_content".to_string(),
            ));
        }
        Ok(strategy)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartSessionResponse {
    pub session_token: SessionToken,
    pub base_version: i64,
    pub base_content: String,
    pub current_version: i64,
}

impl From<&SessionStart> for StartSessionResponse {
    fn from(start: &SessionStart) -> Self {
        Self {
            session_token: start.session.token,
            base_version: start.session.base_version,
            base_content: start.session.base_content.clone(),
            current_version: start.current_version,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyPatchResponse {
    pub status: SyncStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflict_id: Option<ConflictId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<&PatchOutcome> for ApplyPatchResponse {
    fn from(outcome: &PatchOutcome) -> Self {
        Self {
            status: outcome.status(),
            version: outcome.version(),
            content: outcome.content().map(str::to_string),
            conflict_id: outcome.conflict_id(),
            message: outcome.message().map(str::to_string),
        }
    }
}

/// Cheap version check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionStatus {
    pub notebook_id: NotebookId,
    pub version: i64,
    pub last_modified_by: Option<UserId>,
    pub pending_conflicts: usize,
}

/// Pending conflict as listed for reviewers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictSummary {
    pub id: ConflictId,
    pub notebook_id: NotebookId,
    pub notebook_title: String,
    pub user_id: UserId,
    pub server_version: i64,
    pub client_version: i64,
    pub conflict_blocks: Vec<ConflictBlock>,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolveConflictResponse {
    pub status: SyncStatus,
    pub version: i64,
    pub content: String,
    pub resolution_strategy: ResolutionStrategy,
}

impl From<&ResolveOutcome> for ResolveConflictResponse {
    fn from(outcome: &ResolveOutcome) -> Self {
        Self {
            status: SyncStatus::Success,
            version: outcome.version,
            content: outcome.content.clone(),
            resolution_strategy: outcome.strategy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patch_request(patch: &str) -> ApplyPatchRequest {
        ApplyPatchRequest {
            session_token: SessionToken::new().to_string(),
            patch: patch.to_string(),
            client_id: None,
        }
    }

    #[test]
    fn test_patch_size_bound() {
        assert!(patch_request("12345").validate(5).is_ok());
        let err = patch_request("123456").validate(5).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_bad_session_token_rejected() {
        let request = ApplyPatchRequest {
            session_token: "not-a-token".to_string(),
            patch: String::new(),
            client_id: Some("laptop".to_string()),
        };
        assert!(matches!(request.validate(64), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_request_defaults_from_json() {
        let token = SessionToken::new();
        let json = format!(r#"{{"session_token":"{token}"}}"#);
        let request: ApplyPatchRequest = serde_json::from_str(&json).unwrap();
        assert!(request.patch.is_empty());
        assert_eq!(request.validate(1).unwrap(), token);
    }

    #[test]
    fn test_client_label() {
        let json = format!(
            r#"{{"session_token":"{}","client_id":" laptop "}}"#,
            SessionToken::new()
        );
        let request: ApplyPatchRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(request.client(), "laptop");

        let mut request = patch_request("");
        assert_eq!(request.client(), "unknown");
        request.client_id = Some("  ".to_string());
        assert_eq!(request.client(), "unknown");
    }

    #[test]
    fn test_resolve_request_validation() {
        let request = |strategy: &str, content: Option<&str>| ResolveConflictRequest {
            resolution_strategy: strategy.to_string(),
            final_content: content.map(str::to_string),
        };

        assert_eq!(
            request("theirs", None).validate().unwrap(),
            ResolutionStrategy::Theirs
        );
        assert_eq!(
            request("MANUAL", Some("")).validate().unwrap(),
            ResolutionStrategy::Manual
        );
        for (strategy, content) in [
            ("MANUAL", None),
            ("PENDING", None),
            ("AUTO_MERGED", Some("x")),
            ("BOTH", None),
        ] {
            let err = request(strategy, content).validate().unwrap_err();
            assert!(matches!(err, Error::InvalidStrategy(_)), "{strategy}");
        }
    }

    #[test]
    fn test_apply_response_omits_empty_fields() {
        let response = ApplyPatchResponse::from(&PatchOutcome::UpToDate { version: 3 });
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json, serde_json::json!({"status": "no_changes", "version": 3}));

        let response = ApplyPatchResponse::from(&PatchOutcome::SessionInvalid);
        assert_eq!(response.status, SyncStatus::Error);
        assert_eq!(
            response.message.as_deref(),
            Some("Invalid or expired editing session")
        );
    }
}
