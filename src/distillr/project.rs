use super::directory::TokenMap;
use super::error::{DistillrError, Result};
use super::models::{
    DataSource, DataSourcesResponse, NewQueryBarrelRequest, ProjectDetail, QueryBarrel,
    QueryBarrelResponse, QueryDef,
};
use super::query::QueryExecutor;
use super::result::QueryResult;
use super::session::Session;
use super::token::Token;
use super::upload::FileUploader;
use std::path::Path;
use tracing::info;

/// A project of the logged-in account
///
/// Built from the `/projectDistillry/{token}` detail payload. The query
/// barrels listed in that payload are read from it directly; data sources
/// and barrel contents are fetched on demand.
pub struct Project<'a> {
    session: &'a Session,
    detail: ProjectDetail,
}

impl<'a> Project<'a> {
    pub(crate) fn new(session: &'a Session, detail: ProjectDetail) -> Self {
        Project { session, detail }
    }

    pub fn name(&self) -> &str {
        &self.detail.name
    }

    pub fn token(&self) -> &Token {
        &self.detail.token
    }

    pub fn detail(&self) -> &ProjectDetail {
        &self.detail
    }

    /// Query barrel token → name mapping from the project detail (no request)
    pub fn query_barrel_tokens(&self) -> TokenMap {
        TokenMap::new(
            "Query barrel",
            self.detail
                .query_barrels
                .iter()
                .map(|b| (b.token.clone(), b.name.clone())),
        )
    }

    pub fn query_barrel_token(&self, name: &str) -> Result<Token> {
        self.query_barrel_tokens().resolve(name).cloned()
    }

    /// Fetch a query barrel with its queries
    pub async fn query_barrel(&self, barrel: &Token) -> Result<QueryBarrel> {
        let url = self
            .session
            .config()
            .route(&format!("queryBarrels/{}", barrel));
        let reply: QueryBarrelResponse = serde_json::from_value(self.session.get(&url).await?)?;
        Ok(reply.query_barrel)
    }

    pub async fn data_sources(&self) -> Result<Vec<DataSource>> {
        let url = self
            .session
            .config()
            .route(&format!("project/{}/dataSource", self.detail.token));
        let reply: DataSourcesResponse = serde_json::from_value(self.session.get(&url).await?)?;
        Ok(reply.data_sources)
    }

    /// Data source token → name mapping, fetched fresh on every call
    pub async fn data_source_tokens(&self) -> Result<TokenMap> {
        let sources = self.data_sources().await?;
        Ok(TokenMap::new(
            "Data source",
            sources.into_iter().map(|s| (s.token, s.name)),
        ))
    }

    pub async fn data_source_token(&self, name: &str) -> Result<Token> {
        self.data_source_tokens().await?.resolve(name).cloned()
    }

    /// Run the current query of an existing barrel
    ///
    /// The query flagged `active` is used when the barrel flags any; otherwise
    /// the most recent (last listed) query is run.
    pub async fn execute_existing_query(&self, barrel: &Token) -> Result<QueryResult> {
        let query_barrel = self.query_barrel(barrel).await?;
        let query = select_query(&query_barrel, barrel)?;

        QueryExecutor::new(self.session)
            .execute(barrel, &query.token)
            .await
    }

    /// Create a new active barrel holding `sql` and run it
    pub async fn execute_new_query(&self, barrel_name: &str, sql: &str) -> Result<QueryResult> {
        let url = self.session.config().route("queryBarrels");
        let token_text = self.detail.token.to_string();
        let request = NewQueryBarrelRequest {
            project_slug: self.detail.slug.as_deref().unwrap_or(&token_text),
            project_token: &self.detail.token,
            name: barrel_name,
            active: true,
            icon: None,
            query: sql,
        };

        info!(project = %self.detail.name, barrel = barrel_name, "creating query barrel");
        let body = serde_json::to_value(&request)?;
        let reply: QueryBarrelResponse =
            serde_json::from_value(self.session.post(&url, &body).await?)?;

        let created = reply.query_barrel;
        let query = created
            .queries
            .first()
            .ok_or_else(|| DistillrError::not_found("Query in new barrel", barrel_name))?;
        let barrel = query
            .query_barrel_token
            .as_ref()
            .or(created.token.as_ref())
            .ok_or_else(|| DistillrError::not_found("Query barrel token", barrel_name))?;

        QueryExecutor::new(self.session)
            .execute(barrel, &query.token)
            .await
    }

    /// Upload local files to a data source of this project
    pub async fn upload_files<P: AsRef<Path>>(
        &self,
        data_source: &Token,
        paths: &[P],
    ) -> Result<()> {
        FileUploader::new(self.session).upload(data_source, paths).await
    }
}

fn select_query<'b>(barrel: &'b QueryBarrel, barrel_token: &Token) -> Result<&'b QueryDef> {
    let flagged = barrel.queries.iter().any(|q| q.active.is_some());
    let chosen = if flagged {
        barrel.queries.iter().find(|q| q.active == Some(true))
    } else {
        barrel.queries.last()
    };

    chosen.ok_or_else(|| {
        let what = if barrel.queries.is_empty() {
            "Query"
        } else {
            "Active query"
        };
        DistillrError::not_found(what, format!("query barrel {}", barrel_token))
    })
}
