//! Client SDK for the DataDistillr data platform
//!
//! Log in, browse organizations and projects, run saved or ad-hoc SQL queries
//! and collect their paginated results, upload files to data sources, and read
//! published API endpoints.
//!
//! ```no_run
//! use datadistillr::{ClientConfig, Session};
//!
//! # async fn demo() -> datadistillr::Result<()> {
//! let session = Session::connect(ClientConfig::default(), "me@example.com", "secret").await?;
//! let project = session.project_by_name("Project 1").await?;
//! let barrel = project.query_barrel_token("Tab 1")?;
//! let result = project.execute_existing_query(&barrel).await?;
//! println!("{}", result.to_dataframe()?);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod distillr;

pub use config::ClientConfig;
pub use distillr::{
    read_endpoint, DistillrError, FileUploader, HttpTransport, Project, QueryExecutor,
    QueryResult, Result, Session, Token, TokenMap, Transport,
};
