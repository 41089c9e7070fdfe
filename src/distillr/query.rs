//! Query execution: run, poll, paginate
//!
//! A run request returns a `requestToken`; its results live at
//! `/queryResults/{requestToken}` and move through `running` → `complete`
//! (or anything else, which is treated as an error). Once complete, the
//! summary may point at a further page through `nextPage`, which is followed
//! verbatim until it disappears.
//!
//! The retry budget (`max_poll_retries`) covers the whole logical query: a
//! continuation page that reports `running` draws on the same counter as the
//! first page.

use super::error::{DistillrError, Result};
use super::models::{ResultPage, RunResponse, RunStatus};
use super::result::{PageAccumulator, QueryResult};
use super::session::Session;
use super::token::Token;
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info};

/// Executes saved queries and gathers their paginated results
pub struct QueryExecutor<'a> {
    session: &'a Session,
}

impl<'a> QueryExecutor<'a> {
    pub fn new(session: &'a Session) -> Self {
        QueryExecutor { session }
    }

    /// Run `query` of barrel `barrel` and wait for the complete result set
    pub async fn execute(&self, barrel: &Token, query: &Token) -> Result<QueryResult> {
        let url = self
            .session
            .config()
            .route(&format!("queryBarrels/{}/query/{}/run", barrel, query));

        info!(%barrel, %query, "running query");
        let run: RunResponse = serde_json::from_value(self.session.get(&url).await?)?;
        debug!(request_token = %run.request_token, "run accepted");

        self.collect(&run.request_token).await
    }

    /// Poll and paginate the results of an already started run
    pub async fn collect(&self, request_token: &Token) -> Result<QueryResult> {
        let config = self.session.config();
        let mut poller = Poller::new(config.poll_interval, config.max_poll_retries);
        let mut pages = PageAccumulator::new();
        let mut next = Some(config.route(&format!("queryResults/{}", request_token)));
        let mut seen = HashSet::new();

        while let Some(url) = next.take() {
            if !seen.insert(url.clone()) {
                return Err(DistillrError::server(
                    &url,
                    "nextPage revisits an earlier page",
                    None,
                ));
            }

            let payload = poller.wait_complete(self.session, &url).await?;
            let page: ResultPage = serde_json::from_value(payload.clone()).map_err(|e| {
                DistillrError::server(&url, format!("malformed result page: {}", e), Some(payload))
            })?;

            if let Some(link) = page.next_page(&url)? {
                next = Some(config.resolve_link(link)?);
            }
            pages.push(&url, page)?;
        }

        info!(
            %request_token,
            pages = pages.pages(),
            polls = poller.polls,
            "query results collected"
        );
        Ok(pages.finish())
    }
}

/// Fixed-interval poll loop with a retry ceiling
struct Poller {
    interval: Duration,
    max_retries: u32,
    retries: u32,
    polls: u32,
}

impl Poller {
    fn new(interval: Duration, max_retries: u32) -> Self {
        Poller {
            interval,
            max_retries,
            retries: 0,
            polls: 0,
        }
    }

    /// Fetch `url` until its run status is `complete`
    async fn wait_complete(&mut self, session: &Session, url: &str) -> Result<Value> {
        loop {
            let payload = session.get(url).await?;
            self.polls += 1;

            match RunStatus::of(&payload) {
                RunStatus::Complete => return Ok(payload),
                RunStatus::Running => {
                    if self.retries >= self.max_retries {
                        return Err(DistillrError::Timeout {
                            url: url.to_string(),
                            attempts: self.polls,
                        });
                    }
                    self.retries += 1;
                    debug!(%url, retry = self.retries, "query still running");
                    tokio::time::sleep(self.interval).await;
                }
                RunStatus::Error(status) => {
                    let message = match status {
                        Some(s) => format!("query run status '{}'", s),
                        None => "query run status missing".to_string(),
                    };
                    return Err(DistillrError::server(url, message, Some(payload)));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distillr::session::tests::{logged_in, login_reply, test_config, BASE};
    use crate::distillr::testing::ScriptedTransport;
    use serde_json::json;
    use std::sync::Arc;

    const RESULTS: &str = "https://ddr.test/api/queryResults/333333333";

    fn running() -> Value {
        json!({"queryRun": {"status": "running"}})
    }

    fn complete(rows: Value, next: Option<&str>) -> Value {
        json!({
            "queryRun": {"status": "complete"},
            "results": rows,
            "summary": {
                "columnNames": ["Index", "Month"],
                "page": 1,
                "nextPage": next,
                "totalPages": 1
            }
        })
    }

    async fn session_with(
        transport: ScriptedTransport,
        retries: u32,
    ) -> (Session, Arc<ScriptedTransport>) {
        let transport = Arc::new(transport.reply(&format!("{BASE}/login"), login_reply()));
        let config = test_config().with_max_poll_retries(retries);
        let session = Session::login(transport.clone(), config, "a@b.c", "pw")
            .await
            .unwrap();
        (session, transport)
    }

    #[tokio::test]
    async fn test_execute_end_to_end() {
        let (session, transport) = logged_in(
            ScriptedTransport::new()
                .reply(
                    &format!("{BASE}/queryBarrels/111111111/query/222222222/run"),
                    json!({"requestToken": 333333333}),
                )
                .reply(
                    RESULTS,
                    complete(json!([["1", "January"], ["2", "February"], ["3", "March"]]), None),
                ),
        )
        .await;

        let result = QueryExecutor::new(&session)
            .execute(&Token::from(111111111u64), &Token::from(222222222u64))
            .await
            .unwrap();

        assert_eq!((result.num_rows(), result.num_columns()), (3, 2));
        assert_eq!(result.columns(), &["Index".to_string(), "Month".to_string()]);
        assert_eq!(transport.count_gets(RESULTS), 1);
    }

    #[tokio::test]
    async fn test_completes_after_running_polls() {
        let attempts = 4;
        let mut script = ScriptedTransport::new();
        for _ in 0..attempts - 1 {
            script = script.reply(RESULTS, running());
        }
        script = script.reply(RESULTS, complete(json!([["1", "January"]]), None));
        let (session, transport) = session_with(script, 20).await;

        let result = QueryExecutor::new(&session)
            .collect(&Token::from(333333333u64))
            .await
            .unwrap();

        assert_eq!(result.num_rows(), 1);
        assert_eq!(transport.count_gets(RESULTS), attempts);
    }

    #[tokio::test]
    async fn test_timeout_after_retry_ceiling() {
        let ceiling = 20;
        let (session, transport) =
            session_with(ScriptedTransport::new().reply(RESULTS, running()), ceiling).await;

        let err = QueryExecutor::new(&session)
            .collect(&Token::from(333333333u64))
            .await
            .unwrap_err();

        match err {
            DistillrError::Timeout { url, attempts } => {
                assert_eq!(url, RESULTS);
                assert_eq!(attempts, ceiling + 1);
            }
            other => panic!("unexpected error {other:?}"),
        }
        // First poll plus exactly `ceiling` retries
        assert_eq!(transport.count_gets(RESULTS), ceiling as usize + 1);
    }

    #[tokio::test]
    async fn test_error_status_is_not_retried() {
        let (session, transport) = session_with(
            ScriptedTransport::new().reply(
                RESULTS,
                json!({"queryRun": {"status": "error"}, "message": "bad sql"}),
            ),
            20,
        )
        .await;

        let err = QueryExecutor::new(&session)
            .collect(&Token::from(333333333u64))
            .await
            .unwrap_err();

        match err {
            DistillrError::Server { payload, message, .. } => {
                assert!(message.contains("'error'"));
                assert_eq!(payload.unwrap()["message"], "bad sql");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(transport.count_gets(RESULTS), 1);
    }

    #[tokio::test]
    async fn test_pages_followed_by_link_in_order() {
        let page2 = format!("{BASE}/queryResults/333333333?page=opaque-2");
        let page3 = "https://cdn.ddr.test/results/xyz";
        let (session, transport) = session_with(
            ScriptedTransport::new()
                .reply(
                    RESULTS,
                    complete(
                        json!([["1", "January"]]),
                        Some("queryResults/333333333?page=opaque-2"),
                    ),
                )
                .reply(
                    &page2,
                    complete(json!([["2", "February"], ["3", "March"]]), Some(page3)),
                )
                .reply(page3, complete(json!([["4", "April"]]), None)),
            20,
        )
        .await;

        let result = QueryExecutor::new(&session)
            .collect(&Token::from(333333333u64))
            .await
            .unwrap();

        let months: Vec<_> = result
            .column("Month")
            .unwrap()
            .into_iter()
            .map(|v| v.as_str().unwrap().to_string())
            .collect();
        assert_eq!(months, vec!["January", "February", "March", "April"]);
        assert!(!result.summary().contains_key("nextPage"));
        assert_eq!(transport.count_gets(&page2), 1);
        assert_eq!(transport.count_gets(page3), 1);
    }

    #[tokio::test]
    async fn test_retry_budget_shared_across_pages() {
        let page2 = format!("{BASE}/queryResults/p2");
        let (session, transport) = session_with(
            ScriptedTransport::new()
                .reply(RESULTS, running())
                .reply(
                    RESULTS,
                    complete(json!([["1", "January"]]), Some("queryResults/p2")),
                )
                .reply(&page2, running())
                .reply(&page2, running())
                .reply(&page2, complete(json!([["2", "February"]]), None)),
            2,
        )
        .await;

        let err = QueryExecutor::new(&session)
            .collect(&Token::from(333333333u64))
            .await
            .unwrap_err();

        assert!(matches!(err, DistillrError::Timeout { ref url, .. } if url == &page2));
        assert_eq!(transport.count_gets(RESULTS), 2);
        assert_eq!(transport.count_gets(&page2), 2);
    }

    #[tokio::test]
    async fn test_page_without_status_is_an_error() {
        let page2 = format!("{BASE}/queryResults/p2");
        let (session, _) = session_with(
            ScriptedTransport::new()
                .reply(
                    RESULTS,
                    complete(json!([["1", "January"]]), Some("queryResults/p2")),
                )
                .reply(&page2, json!({"results": [["2", "February"]], "summary": {}})),
            20,
        )
        .await;

        let err = QueryExecutor::new(&session)
            .collect(&Token::from(333333333u64))
            .await
            .unwrap_err();

        match err {
            DistillrError::Server { url, message, .. } => {
                assert_eq!(url, page2);
                assert!(message.contains("missing"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_self_referencing_next_page_rejected() {
        let (session, _) = session_with(
            ScriptedTransport::new().reply(
                RESULTS,
                complete(json!([["1", "January"]]), Some(RESULTS)),
            ),
            20,
        )
        .await;

        assert!(matches!(
            QueryExecutor::new(&session)
                .collect(&Token::from(333333333u64))
                .await,
            Err(DistillrError::Server { .. })
        ));
    }

    #[tokio::test]
    async fn test_next_page_cycle_rejected() {
        let page2 = format!("{BASE}/queryResults/p2");
        let (session, transport) = session_with(
            ScriptedTransport::new()
                .reply(
                    RESULTS,
                    complete(json!([["1", "January"]]), Some("queryResults/p2")),
                )
                .reply(
                    &page2,
                    complete(json!([["2", "February"]]), Some("queryResults/333333333")),
                ),
            20,
        )
        .await;

        let err = QueryExecutor::new(&session)
            .collect(&Token::from(333333333u64))
            .await
            .unwrap_err();

        match err {
            DistillrError::Server { url, message, .. } => {
                assert_eq!(url, RESULTS);
                assert!(message.contains("revisits"));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(transport.count_gets(RESULTS), 1);
        assert_eq!(transport.count_gets(&page2), 1);
    }

    #[tokio::test]
    async fn test_root_relative_next_page() {
        let page2 = format!("{BASE}/queryResults/333333333?page=2");
        let (session, transport) = session_with(
            ScriptedTransport::new()
                .reply(
                    RESULTS,
                    complete(
                        json!([["1", "January"]]),
                        Some("/api/queryResults/333333333?page=2"),
                    ),
                )
                .reply(&page2, complete(json!([["2", "February"]]), None)),
            20,
        )
        .await;

        let result = QueryExecutor::new(&session)
            .collect(&Token::from(333333333u64))
            .await
            .unwrap();

        assert_eq!(result.num_rows(), 2);
        assert_eq!(transport.count_gets(&page2), 1);
    }

    #[tokio::test]
    async fn test_numeric_next_page_is_an_error() {
        let (session, _) = session_with(
            ScriptedTransport::new().reply(
                RESULTS,
                json!({
                    "queryRun": {"status": "complete"},
                    "results": [["1", "January"]],
                    "summary": {"columnNames": ["Index", "Month"], "nextPage": 2}
                }),
            ),
            20,
        )
        .await;

        assert!(matches!(
            QueryExecutor::new(&session)
                .collect(&Token::from(333333333u64))
                .await,
            Err(DistillrError::Server { .. })
        ));
    }
}
