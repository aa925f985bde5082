//! MCP server exposing the bingo session as tools.

use crate::session::{SessionError, SessionHandle};
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Content, ServerCapabilities, ServerInfo};
use rmcp::{ErrorData as McpError, ServerHandler, tool, tool_handler, tool_router};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, instrument, warn};

/// Request for joining the session.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JoinSessionRequest {
    /// Stable player ID chosen by the client.
    pub player_id: String,
    /// Display name.
    pub name: String,
}

/// Request for claiming a square.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SubmitClaimRequest {
    /// Player ID.
    pub player_id: String,
    /// Square index, row-major from 0 at the top-left.
    pub square: usize,
}

/// Request for loading a board.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LoadConfigurationRequest {
    /// Board configuration as JSON text.
    pub configuration: String,
    /// Player who uploaded the board, re-joined after the reset.
    #[serde(default)]
    pub uploader_id: Option<String>,
    /// Display name for the uploader.
    #[serde(default)]
    pub uploader_name: Option<String>,
}

/// Request for reading session state.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct GetStateRequest {
    /// If set, also report squares held by other players.
    #[serde(default)]
    pub viewer: Option<String>,
}

/// Main server handler.
#[derive(Clone)]
pub struct BingoServer {
    session: SessionHandle,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl BingoServer {
    /// Creates a server over a running session.
    #[instrument(skip(session))]
    pub fn new(session: SessionHandle) -> Self {
        info!("Creating bingo server");
        Self {
            session,
            tool_router: Self::tool_router(),
        }
    }

    /// Joins the session.
    #[instrument(skip(self, req), fields(player_id = %req.player_id))]
    #[tool(description = "Join the bingo session. Re-joining keeps your checked squares.")]
    pub async fn join_session(
        &self,
        Parameters(req): Parameters<JoinSessionRequest>,
    ) -> Result<CallToolResult, McpError> {
        let player = self
            .session
            .join_session(&req.player_id, &req.name)
            .await
            .map_err(to_mcp_error)?;
        info!(player_id = %player.player_id, score = player.score, "Player joined");
        json_result(&player)
    }

    /// Claims a square.
    #[instrument(skip(self, req), fields(player_id = %req.player_id, square = req.square))]
    #[tool(description = "Claim a square on the board. Returns accepted with your updated state, or the reason it was rejected.")]
    pub async fn submit_claim(
        &self,
        Parameters(req): Parameters<SubmitClaimRequest>,
    ) -> Result<CallToolResult, McpError> {
        let outcome = self
            .session
            .submit_claim(&req.player_id, req.square)
            .await
            .map_err(to_mcp_error)?;
        info!(accepted = outcome.is_accepted(), "Claim processed");
        json_result(&outcome)
    }

    /// Loads a board and resets the session.
    #[instrument(skip(self, req), fields(bytes = req.configuration.len()))]
    #[tool(description = "Load a new board configuration (JSON text). Clears every player's progress.")]
    pub async fn load_configuration(
        &self,
        Parameters(req): Parameters<LoadConfigurationRequest>,
    ) -> Result<CallToolResult, McpError> {
        let uploader = match (&req.uploader_id, &req.uploader_name) {
            (Some(id), Some(name)) => Some((id.as_str(), name.as_str())),
            (Some(id), None) => Some((id.as_str(), id.as_str())),
            _ => None,
        };
        let config = self
            .session
            .load_configuration(&req.configuration, uploader)
            .await
            .map_err(to_mcp_error)?;
        info!(squares = config.total_squares(), "Board loaded");
        json_result(&*config)
    }

    /// Clears all players, keeping the board.
    #[instrument(skip(self))]
    #[tool(description = "Reset the session: every player's checked squares and score are cleared.")]
    pub async fn reset_session(&self) -> Result<CallToolResult, McpError> {
        let generation = self.session.reset_session().await.map_err(to_mcp_error)?;
        json_result(&json!({ "generation": generation }))
    }

    /// Reads the session state.
    #[instrument(skip(self, req))]
    #[tool(description = "Get the board, every player's state and, for a viewer, squares held by others.")]
    pub async fn get_state(
        &self,
        Parameters(req): Parameters<GetStateRequest>,
    ) -> Result<CallToolResult, McpError> {
        let snapshot = self.session.snapshot().await.map_err(to_mcp_error)?;
        let held_by_others = match &req.viewer {
            Some(viewer) => Some(
                self.session
                    .held_by_others(viewer)
                    .await
                    .map_err(to_mcp_error)?,
            ),
            None => None,
        };
        json_result(&json!({
            "session": snapshot,
            "heldByOthers": held_by_others,
        }))
    }

    /// Players ranked by score.
    #[instrument(skip(self))]
    #[tool(description = "Get the leaderboard, highest score first.")]
    pub async fn get_leaderboard(&self) -> Result<CallToolResult, McpError> {
        let entries = self.session.leaderboard().await.map_err(to_mcp_error)?;
        json_result(&entries)
    }
}

#[tool_handler(router = self.tool_router)]
impl ServerHandler for BingoServer {
    fn get_info(&self) -> ServerInfo {
        let mut info = ServerInfo::default();
        info.instructions =
            Some("Multiplayer bingo session: join, claim squares, compete for bonuses".into());
        info.capabilities = ServerCapabilities::builder().enable_tools().build();
        info
    }
}

fn json_result<T: Serialize + ?Sized>(value: &T) -> Result<CallToolResult, McpError> {
    let text = serde_json::to_string_pretty(value).map_err(|e| {
        error!(error = %e, "Failed to serialize tool result");
        McpError::internal_error(e.to_string(), None)
    })?;
    Ok(CallToolResult::success(vec![Content::text(text)]))
}

fn to_mcp_error(err: SessionError) -> McpError {
    if err.is_retryable() {
        warn!(error = %err, "Transient session failure");
        McpError::internal_error(err.to_string(), Some(json!({ "retryable": true })))
    } else if matches!(err, SessionError::ArbiterClosed) || is_internal(&err) {
        error!(error = %err, "Session failure");
        McpError::internal_error(err.to_string(), None)
    } else {
        McpError::invalid_params(err.to_string(), None)
    }
}

fn is_internal(err: &SessionError) -> bool {
    matches!(
        err,
        SessionError::Coordinator(crate::coordinator::CoordinatorError::InconsistentState { .. })
    )
}
