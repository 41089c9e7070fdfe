//! Request and response payloads for the DataDistillr REST API.
//!
//! Only the fields the SDK acts on are typed; everything else the server sends
//! is ignored, so additions on the server side do not break decoding.

use super::error::{DistillrError, Result};
use super::token::Token;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// =============================================================================
// Authentication
// =============================================================================

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub invitations: Invitations,
}

/// Invitation tokens accepted by `/login`. The SDK never redeems invitations,
/// but the endpoint expects the keys to be present.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Invitations {
    pub organization_invitation_token: Option<String>,
    pub project_invitation_token: Option<String>,
    pub team_invitation_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    #[serde(default)]
    pub logged_in: bool,
    pub active_organization: Option<OrganizationRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrganizationRef {
    pub token: Token,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutResponse {
    #[serde(default)]
    pub logged_in: bool,
}

// =============================================================================
// Directory
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub name: String,
    pub token: Token,
}

#[derive(Debug, Deserialize)]
pub struct OrganizationsResponse {
    pub organizations: Vec<Organization>,
}

/// A project as it appears in listings and in `/projectDistillry/{token}`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDetail {
    pub name: String,
    pub token: Token,
    pub slug: Option<String>,
    #[serde(default)]
    pub query_barrels: Vec<QueryBarrelRef>,
}

#[derive(Debug, Deserialize)]
pub struct ProjectsResponse {
    pub projects: Vec<ProjectDetail>,
}

#[derive(Debug, Deserialize)]
pub struct ProjectResponse {
    pub project: ProjectDetail,
}

/// Query barrel entry embedded in a project detail
#[derive(Debug, Clone, Deserialize)]
pub struct QueryBarrelRef {
    pub token: Token,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryBarrel {
    pub token: Option<Token>,
    pub name: Option<String>,
    #[serde(default)]
    pub queries: Vec<QueryDef>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryBarrelResponse {
    pub query_barrel: QueryBarrel,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryDef {
    pub token: Token,
    pub query_barrel_token: Option<Token>,
    /// SQL text
    pub query: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSource {
    pub name: String,
    pub token: Token,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSourcesResponse {
    pub data_sources: Vec<DataSource>,
}

// =============================================================================
// Query execution
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewQueryBarrelRequest<'a> {
    pub project_slug: &'a str,
    pub project_token: &'a Token,
    pub name: &'a str,
    pub active: bool,
    pub icon: Option<&'a str>,
    pub query: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResponse {
    pub request_token: Token,
}

/// Run status reported in `queryRun.status`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Complete,
    /// Anything else, including a missing status
    Error(Option<String>),
}

impl RunStatus {
    pub fn of(payload: &Value) -> Self {
        match payload
            .get("queryRun")
            .and_then(|run| run.get("status"))
            .and_then(Value::as_str)
        {
            Some(s) if s.eq_ignore_ascii_case("running") => RunStatus::Running,
            Some(s) if s.eq_ignore_ascii_case("complete") => RunStatus::Complete,
            Some(other) => RunStatus::Error(Some(other.to_string())),
            None => RunStatus::Error(None),
        }
    }
}

/// One page of query results: `results` plus `summary`
#[derive(Debug, Clone, Deserialize)]
pub struct ResultPage {
    #[serde(default)]
    pub results: Vec<Vec<Value>>,
    #[serde(default)]
    pub summary: Map<String, Value>,
}

impl ResultPage {
    pub fn column_names(&self) -> Option<Vec<String>> {
        self.summary
            .get("columnNames")?
            .as_array()?
            .iter()
            .map(|v| v.as_str().map(str::to_string))
            .collect()
    }

    /// Link to the following page
    ///
    /// A missing key, `null` or an empty string ends the result set. Any other
    /// non-string value is a server error reported against `url`.
    pub fn next_page(&self, url: &str) -> Result<Option<&str>> {
        match self.summary.get("nextPage") {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(link)) if link.is_empty() => Ok(None),
            Some(Value::String(link)) => Ok(Some(link)),
            Some(other) => Err(DistillrError::server(
                url,
                format!("summary.nextPage is not a link: {}", other),
                Some(Value::Object(self.summary.clone())),
            )),
        }
    }
}

// =============================================================================
// File upload
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileDescriptor {
    pub name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub content_type: String,
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct FileUploadRequest<'a> {
    pub files: &'a [FileDescriptor],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignedUrlsResponse {
    pub presigned_urls: Vec<String>,
}
