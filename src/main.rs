//! DataDistillr command line client
//!
//! Thin wrapper around the library: log in, resolve names to tokens, run a
//! query or upload files, and print or export the result.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use datadistillr::distillr::logger::init_logging;
use datadistillr::{read_endpoint, ClientConfig, HttpTransport, QueryResult, Session};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "datadistillr", version, about = "DataDistillr platform client")]
struct Cli {
    /// Account email
    #[arg(long, env = "DATADISTILLR_EMAIL", global = true)]
    email: Option<String>,

    /// Account password
    #[arg(long, env = "DATADISTILLR_PASSWORD", hide_env_values = true, global = true)]
    password: Option<String>,

    /// JSON configuration file (defaults and DATADISTILLR_* variables otherwise)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List organizations
    Orgs,
    /// List projects of the active organization
    Projects,
    /// List query barrels of a project
    Barrels {
        #[arg(long)]
        project: String,
    },
    /// List data sources of a project
    DataSources {
        #[arg(long)]
        project: String,
    },
    /// Run an existing query barrel, or create and run a new one
    Run {
        #[arg(long)]
        project: String,
        /// Existing query barrel name
        #[arg(long, conflicts_with_all = ["new", "sql"])]
        barrel: Option<String>,
        /// Name of the query barrel to create
        #[arg(long, requires = "sql")]
        new: Option<String>,
        /// SQL text of the new query
        #[arg(long, requires = "new")]
        sql: Option<String>,
        /// Export file (.csv, .json, .parquet, .xlsx)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Upload local files to a data source
    Upload {
        #[arg(long)]
        project: String,
        #[arg(long)]
        data_source: String,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Read a published API endpoint (no login)
    Endpoint {
        #[arg(long)]
        url: String,
        #[arg(long, env = "DATADISTILLR_API_KEY", hide_env_values = true)]
        api_key: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => ClientConfig::from_json_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => ClientConfig::from_env()?,
    };

    let Cli {
        email,
        password,
        command,
        ..
    } = cli;

    match command {
        Command::Endpoint {
            url,
            api_key,
            output,
        } => {
            let transport = HttpTransport::connect(&config)?;
            let result = read_endpoint(&transport, &url, &api_key).await?;
            emit(&result, output.as_ref())
        }
        command => {
            let session = login(config, email, password).await?;
            run(&session, command).await
        }
    }
}

async fn login(
    config: ClientConfig,
    email: Option<String>,
    password: Option<String>,
) -> Result<Session> {
    let (Some(email), Some(password)) = (email, password) else {
        bail!("--email and --password (or DATADISTILLR_EMAIL / DATADISTILLR_PASSWORD) are required");
    };

    let session = Session::connect(config, &email, &password).await?;
    if !session.is_logged_in() {
        bail!("login rejected for {}", email);
    }
    Ok(session)
}

async fn run(session: &Session, command: Command) -> Result<()> {
    match command {
        Command::Orgs => {
            for org in session.organizations().await? {
                println!("{}\t{}", org.token, org.name);
            }
        }
        Command::Projects => {
            for (token, name) in session.project_tokens().await?.iter() {
                println!("{}\t{}", token, name);
            }
        }
        Command::Barrels { project } => {
            let project = session.project_by_name(&project).await?;
            for (token, name) in project.query_barrel_tokens().iter() {
                println!("{}\t{}", token, name);
            }
        }
        Command::DataSources { project } => {
            let project = session.project_by_name(&project).await?;
            for (token, name) in project.data_source_tokens().await?.iter() {
                println!("{}\t{}", token, name);
            }
        }
        Command::Run {
            project,
            barrel,
            new,
            sql,
            output,
        } => {
            let project = session.project_by_name(&project).await?;
            let result = match (barrel, new, sql) {
                (Some(barrel), _, _) => {
                    let token = project.query_barrel_token(&barrel)?;
                    project.execute_existing_query(&token).await?
                }
                (None, Some(name), Some(sql)) => project.execute_new_query(&name, &sql).await?,
                _ => bail!("either --barrel or --new with --sql is required"),
            };
            emit(&result, output.as_ref())?;
        }
        Command::Upload {
            project,
            data_source,
            files,
        } => {
            let project = session.project_by_name(&project).await?;
            let source = project.data_source_token(&data_source).await?;
            project.upload_files(&source, &files).await?;
            println!("✓ Uploaded {} file(s) to {}", files.len(), data_source);
        }
        Command::Endpoint { .. } => bail!("endpoint reads do not use a login session"),
    }
    Ok(())
}

fn emit(result: &QueryResult, output: Option<&PathBuf>) -> Result<()> {
    match output {
        Some(path) => {
            result.write_file(path)?;
            println!(
                "✓ Wrote {} rows × {} columns to {}",
                result.num_rows(),
                result.num_columns(),
                path.display()
            );
        }
        None => println!("{}", result.to_dataframe()?),
    }
    Ok(())
}
