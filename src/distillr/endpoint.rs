//! Published API endpoints
//!
//! A dataset published as an API endpoint is served at its own URL and
//! protected by an API key sent verbatim in the `Authorization` header. No
//! login session is involved. Results are already materialized, so pages are
//! read without run-status polling, following `summary.nextPage` until it is
//! absent.

use super::client::Transport;
use super::error::{DistillrError, Result};
use super::models::ResultPage;
use super::result::{PageAccumulator, QueryResult};
use crate::config::join_link;
use std::collections::HashSet;
use tracing::info;

/// Read every page of a published endpoint
///
/// `nextPage` links are resolved against the endpoint URL.
pub async fn read_endpoint(
    transport: &dyn Transport,
    url: &str,
    api_key: &str,
) -> Result<QueryResult> {
    let mut pages = PageAccumulator::new();
    let mut seen = HashSet::new();
    let mut next = Some(url.to_string());

    while let Some(page_url) = next.take() {
        if !seen.insert(page_url.clone()) {
            return Err(DistillrError::server(
                &page_url,
                "nextPage revisits an earlier page",
                None,
            ));
        }

        let payload = transport.get_json_with_key(&page_url, api_key).await?;
        let page: ResultPage = serde_json::from_value(payload.clone()).map_err(|e| {
            DistillrError::server(&page_url, format!("malformed result page: {}", e), Some(payload))
        })?;

        if let Some(link) = page.next_page(&page_url)? {
            next = Some(join_link(url, link)?);
        }
        pages.push(&page_url, page)?;
    }

    info!(%url, pages = pages.pages(), "endpoint read");
    Ok(pages.finish())
}
