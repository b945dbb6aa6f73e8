mod logging;

use std::io::{self, Write};
use std::time::Instant;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use colored::Colorize;
use kb_client::config::default_session_path;
use kb_client::models::{ConversationAskRequest, QuestionRequest, SearchRequest, SearchType};
use kb_client::{ApiClient, ApiOutcome, Callbacks, CancellationToken, ClientConfig, StreamEnd};

#[derive(Parser)]
#[command(name = "kb-cli")]
#[command(about = "Command-line client for the knowledge-base backend")]
#[command(version)]
struct Cli {
    /// Overrides the configured API base URL
    #[arg(long, env = "KB_API_BASE")]
    base_url: Option<String>,

    /// Enable debug logging
    #[arg(long, short, default_value = "false")]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and store the session
    Login { username: String, password: String },
    /// Create an account and store the session
    Register {
        username: String,
        password: String,
        email: String,
    },
    /// Sign out and clear the stored session
    Logout,
    /// Show the signed-in user
    Whoami {
        /// Fetch the profile from the server instead of the local snapshot
        #[arg(long)]
        remote: bool,
    },
    /// List documents
    Docs {
        #[arg(long, default_value_t = 0)]
        page: u32,
        #[arg(long, default_value_t = 10)]
        size: u32,
        #[arg(long)]
        keyword: Option<String>,
    },
    /// Search the knowledge base
    Search {
        query: String,
        /// SEMANTIC, KEYWORD or HYBRID
        #[arg(long = "type", default_value = "SEMANTIC")]
        search_type: String,
        #[arg(long, default_value_t = 10)]
        max_results: u32,
    },
    /// Ask a question and stream the answer
    Ask {
        question: String,
        /// Continue a conversation instead of a one-off question
        #[arg(long)]
        conversation: Option<i64>,
    },
    /// Check backend health
    Health,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.debug);

    let mut config = ClientConfig::load();
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url;
    }
    if config.storage_path.is_none() {
        config.storage_path = Some(default_session_path());
    }
    log::debug!("Using API base {}", config.base_url);

    let client = ApiClient::new(config).context("failed to build client")?;

    match cli.command {
        Commands::Login { username, password } => {
            let outcome = client.auth().login(&username, &password).await?;
            report_auth(outcome, &username)
        }
        Commands::Register {
            username,
            password,
            email,
        } => {
            let outcome = client.auth().register(&username, &password, &email).await?;
            report_auth(outcome, &username)
        }
        Commands::Logout => {
            client.auth().logout().await?;
            println!("{}", "Signed out".green());
            Ok(())
        }
        Commands::Whoami { remote } => whoami(&client, remote).await,
        Commands::Docs {
            page,
            size,
            keyword,
        } => list_documents(&client, page, size, keyword.as_deref()).await,
        Commands::Search {
            query,
            search_type,
            max_results,
        } => {
            let search_type: SearchType = search_type.parse().map_err(anyhow::Error::msg)?;
            search(&client, query, search_type, max_results).await
        }
        Commands::Ask {
            question,
            conversation,
        } => ask(&client, question, conversation).await,
        Commands::Health => {
            let outcome = client.health().health().await?;
            let body = outcome.into_result()?;
            println!("{}", serde_json::to_string_pretty(&body)?);
            Ok(())
        }
    }
}

fn report_auth<T>(outcome: ApiOutcome<T>, username: &str) -> anyhow::Result<()> {
    match outcome {
        ApiOutcome::Success { .. } => {
            println!("{}", format!("Signed in as {}", username).green());
            Ok(())
        }
        ApiOutcome::Rejected(err) => bail!("{}", err),
    }
}

async fn whoami(client: &ApiClient, remote: bool) -> anyhow::Result<()> {
    if !client.is_authenticated() {
        println!("{}", "Not signed in".yellow());
        return Ok(());
    }
    let profile = if remote {
        Some(client.auth().profile().await?.into_result()?)
    } else {
        client.auth().local_identity()
    };
    match profile {
        Some(profile) => {
            println!("{}", profile.username.bold());
            if let Some(email) = profile.email {
                println!("  email: {}", email);
            }
            if let (Some(used), Some(quota)) = (profile.used_storage, profile.storage_quota) {
                println!("  storage: {} / {} bytes", used, quota);
            }
        }
        None => println!("{}", "Signed in (no cached profile)".yellow()),
    }
    Ok(())
}

async fn list_documents(
    client: &ApiClient,
    page: u32,
    size: u32,
    keyword: Option<&str>,
) -> anyhow::Result<()> {
    let result = client.documents().list(page, size, keyword).await?.into_result()?;
    println!(
        "{}",
        format!(
            "Page {} of {} ({} documents)",
            result.page + 1,
            result.total_pages.max(1),
            result.total
        )
        .cyan()
    );
    for doc in result.data {
        println!(
            "  {}  {}  {}",
            doc.id.unwrap_or_default().dimmed(),
            doc.title.unwrap_or_default(),
            doc.processing_status.unwrap_or_default().dimmed()
        );
    }
    Ok(())
}

async fn search(
    client: &ApiClient,
    query: String,
    search_type: SearchType,
    max_results: u32,
) -> anyhow::Result<()> {
    let request = SearchRequest {
        search_type,
        max_results,
        ..SearchRequest::new(query)
    };
    let start = Instant::now();
    let results = client.search().search(&request).await?.into_result()?;
    println!(
        "{}",
        format!("{} results in {:?}", results.total, start.elapsed()).cyan()
    );
    for hit in results.data {
        println!(
            "{} {}",
            format!("[{:.2}]", hit.score.unwrap_or_default()).yellow(),
            hit.title.unwrap_or_default().bold()
        );
        if let Some(content) = hit.content {
            let preview: String = content.chars().take(160).collect();
            println!("    {}", preview.dimmed());
        }
    }
    Ok(())
}

async fn ask(client: &ApiClient, question: String, conversation: Option<i64>) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    let mut handler = Callbacks::new()
        .on_token(|token| {
            print!("{}", token);
            let _ = io::stdout().flush();
        })
        .on_error(|err| eprintln!("\n{}", format!("Stream error: {}", err).red()));

    let summary = match conversation {
        Some(id) => {
            let request = ConversationAskRequest::new(Some(id), question);
            client
                .conversations()
                .ask_streaming(&request, &mut handler, &cancel)
                .await?
        }
        None => {
            let request = QuestionRequest::new(question);
            client
                .search()
                .ask_streaming(&request, &mut handler, &cancel)
                .await?
        }
    };
    println!();

    match summary.end {
        StreamEnd::Completed | StreamEnd::Closed => Ok(()),
        StreamEnd::Cancelled => {
            println!("{}", "Cancelled".yellow());
            Ok(())
        }
        StreamEnd::Errored => bail!("answer stream failed after {} tokens", summary.tokens),
    }
}
