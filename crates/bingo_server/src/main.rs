//! Bingo Server - Unified CLI
//!
//! Shared bingo session server with stdio and HTTP MCP transports.

#![warn(missing_docs)]

mod cli;

use anyhow::{Context, Result};
use bingo_server::{BingoServer, MemoryStore, ServerSettings, SessionEvent, SessionHandle};
use clap::Parser;
use cli::{Cli, Command};
use rmcp::ServiceExt;
use std::path::{Path, PathBuf};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, instrument, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Command::Server { board } => {
            // stdout carries the MCP stream, logs go to stderr.
            init_tracing(true);
            let settings = ServerSettings::load_or_default(&cli.config)?;
            run_mcp_server(settings, board).await
        }
        Command::Http { port, host, board } => {
            init_tracing(false);
            let settings = ServerSettings::load_or_default(&cli.config)?.with_address(host, port);
            run_http_server(settings, board).await
        }
        Command::Validate { path } => {
            init_tracing(true);
            run_validate(&path)
        }
    }
}

fn init_tracing(stderr: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,bingo_server=debug"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if stderr {
        builder.with_writer(std::io::stderr).init();
    } else {
        builder.init();
    }
}

/// Spawns the session arbiter, preloads a board and starts event logging.
#[instrument(skip(settings))]
async fn start_session(settings: &ServerSettings, board: Option<PathBuf>) -> Result<SessionHandle> {
    let session = SessionHandle::spawn(MemoryStore::new(), *settings.event_buffer());
    tokio::spawn(log_events(session.clone()));

    if let Some(path) = board.or_else(|| settings.board().clone()) {
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read board {}", path.display()))?;
        let config = session
            .load_configuration(&text, None)
            .await
            .with_context(|| format!("Failed to load board {}", path.display()))?;
        info!(
            path = %path.display(),
            squares = config.total_squares(),
            "Board preloaded"
        );
    } else {
        info!("No board configured; waiting for load_configuration");
    }

    Ok(session)
}

async fn log_events(session: SessionHandle) {
    let mut events = session.subscribe();
    loop {
        match events.recv().await {
            Ok(SessionEvent::PlayerUpdated(player)) => debug!(
                player_id = %player.player_id,
                score = player.score,
                checked = player.checked_squares.len(),
                "Player updated"
            ),
            Ok(SessionEvent::ConfigurationChanged(config)) => {
                debug!(squares = config.total_squares(), "Configuration changed")
            }
            Ok(SessionEvent::SessionReset { generation }) => debug!(generation, "Session reset"),
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event log fell behind"),
            Err(RecvError::Closed) => break,
        }
    }
}

/// Run the MCP bingo server (stdio mode)
async fn run_mcp_server(settings: ServerSettings, board: Option<PathBuf>) -> Result<()> {
    info!("Starting bingo MCP server");

    let session = start_session(&settings, board).await?;
    let server = BingoServer::new(session);

    info!("Server ready - connect via MCP protocol");
    let service = server.serve(rmcp::transport::stdio()).await?;
    service.waiting().await?;

    Ok(())
}

/// Run the HTTP bingo server
async fn run_http_server(settings: ServerSettings, board: Option<PathBuf>) -> Result<()> {
    use axum::{Router, body::Body, http::Request};
    use rmcp::transport::streamable_http_server::{
        session::local::LocalSessionManager,
        tower::{StreamableHttpServerConfig, StreamableHttpService},
    };
    use std::sync::Arc;
    use tower::ServiceBuilder;

    info!(host = %settings.host(), port = settings.port(), "Starting bingo MCP server on HTTP");

    let session = start_session(&settings, board).await?;
    let session_manager = Arc::new(LocalSessionManager::default());

    let mut config = StreamableHttpServerConfig::default();
    config.stateful_mode = true;
    debug!(?config, "HTTP service configuration");

    // Every MCP connection gets its own server over the one shared session.
    let http_service = StreamableHttpService::new(
        move || Ok(BingoServer::new(session.clone())),
        session_manager,
        config,
    );

    let app = Router::new().nest_service(
        "/mcp",
        ServiceBuilder::new()
            .map_request(|req: Request<Body>| {
                debug!(method = %req.method(), uri = %req.uri(), "Incoming HTTP request");
                req
            })
            .service(http_service),
    );

    let address = (settings.host().as_str(), *settings.port());
    let listener = tokio::net::TcpListener::bind(address).await?;
    info!("Server ready at http://{}:{}/mcp", settings.host(), settings.port());
    info!(
        "Tools: join_session, submit_claim, load_configuration, reset_session, get_state, \
         get_leaderboard"
    );

    axum::serve(listener, app).await?;
    Ok(())
}

/// Check a board configuration file
fn run_validate(path: &Path) -> Result<()> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    match bingo_core::parse(&text) {
        Ok(config) => {
            let size = config.board_size();
            println!(
                "{}: valid {}x{} board, {} squares, exclusive={}, first-only bonuses={}",
                path.display(),
                size.rows,
                size.columns,
                config.total_squares(),
                config.exclusive_squares(),
                config.completion_bonuses().only_first_player_gets_bonus
            );
            Ok(())
        }
        Err(e) => {
            warn!(error = %e, "Board rejected");
            anyhow::bail!("{}: invalid board: {}", path.display(), e)
        }
    }
}
