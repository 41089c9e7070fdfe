//! Organization / project listings and name-to-token resolution
//!
//! Listings are fetched fresh on every call. Nothing here is cached.

use super::error::{DistillrError, Result};
use super::models::{
    Organization, OrganizationsResponse, ProjectDetail, ProjectResponse, ProjectsResponse,
};
use super::project::Project;
use super::session::Session;
use super::token::Token;

/// Ordered token → name mapping built from one listing
///
/// Order is the server's listing order. Names are not unique; resolution
/// returns the first exact match.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenMap {
    kind: &'static str,
    entries: Vec<(Token, String)>,
}

impl TokenMap {
    pub fn new(kind: &'static str, entries: impl IntoIterator<Item = (Token, String)>) -> Self {
        TokenMap {
            kind,
            entries: entries.into_iter().collect(),
        }
    }

    /// Token of the first entry whose name equals `name` exactly (case-sensitive)
    pub fn resolve(&self, name: &str) -> Result<&Token> {
        self.entries
            .iter()
            .find(|(_, n)| n == name)
            .map(|(token, _)| token)
            .ok_or_else(|| DistillrError::not_found(self.kind, name))
    }

    pub fn name_of(&self, token: &Token) -> Option<&str> {
        self.entries
            .iter()
            .find(|(t, _)| t == token)
            .map(|(_, name)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Token, &str)> {
        self.entries.iter().map(|(t, n)| (t, n.as_str()))
    }

    pub fn tokens(&self) -> impl Iterator<Item = &Token> {
        self.entries.iter().map(|(t, _)| t)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(_, n)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Session {
    /// Organizations the user belongs to
    pub async fn organizations(&self) -> Result<Vec<Organization>> {
        let url = self.config().route("organization");
        let reply: OrganizationsResponse = serde_json::from_value(self.get(&url).await?)?;
        Ok(reply.organizations)
    }

    /// Projects of the active organization, as listed (not full detail)
    pub async fn projects(&self) -> Result<Vec<ProjectDetail>> {
        let org = match self.active_organization_token() {
            Some(org) => org,
            None => {
                // A rejected login carries no organization either
                self.authorize(&self.config().route("organization"))?;
                return Err(DistillrError::not_found("Active organization", "login payload"));
            }
        };
        let url = self.config().route(&format!("organization/{}/projects", org));

        let reply: ProjectsResponse = serde_json::from_value(self.get(&url).await?)?;
        Ok(reply.projects)
    }

    /// Project token → name mapping, in listing order
    pub async fn project_tokens(&self) -> Result<TokenMap> {
        let projects = self.projects().await?;
        Ok(TokenMap::new(
            "Project",
            projects.into_iter().map(|p| (p.token, p.name)),
        ))
    }

    /// Resolve a project name to its token
    pub async fn project_token(&self, name: &str) -> Result<Token> {
        self.project_tokens().await?.resolve(name).cloned()
    }

    /// Fetch a project's full detail and wrap it in a [`Project`] handle
    pub async fn project(&self, token: &Token) -> Result<Project<'_>> {
        let url = self.config().route(&format!("projectDistillry/{}", token));
        let reply: ProjectResponse = serde_json::from_value(self.get(&url).await?)?;
        Ok(Project::new(self, reply.project))
    }

    /// Resolve a project by name, then fetch it
    pub async fn project_by_name(&self, name: &str) -> Result<Project<'_>> {
        let token = self.project_token(name).await?;
        self.project(&token).await
    }
}
