//! Bingo Server library - a shared bingo session behind MCP tools
//!
//! Players join one session, claim squares on a shared board and compete
//! for completion bonuses.
//!
//! # Architecture
//!
//! - **Coordinator**: validates and applies claims, joins and resets
//! - **Store**: player state plus the commit hook every change goes through
//! - **Session**: single arbiter task serializing all requests, with event broadcast
//! - **Server**: MCP tools over a session (stdio or HTTP)
//!
//! # Example
//!
//! ```no_run
//! use bingo_server::{MemoryStore, SessionHandle};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let session = SessionHandle::spawn(MemoryStore::new(), 64);
//! let mut events = session.subscribe();
//!
//! session.load_configuration(&std::fs::read_to_string("board.json")?, None).await?;
//! session.join_session("p1", "Ada").await?;
//! let outcome = session.submit_claim("p1", 4).await?;
//! println!("{outcome:?} {:?}", events.recv().await?);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod coordinator;
mod server;
mod session;
mod settings;
mod store;

// Crate-level exports - Coordinator
pub use coordinator::{
    ClaimCoordinator, ClaimOutcome, CoordinatorError, LeaderboardEntry, SessionSnapshot,
};

// Crate-level exports - Store
pub use store::{CommitRecord, MemoryStore, PlayerSnapshot, PlayerStore, SessionStore, StoreError};

// Crate-level exports - Session arbiter
pub use session::{DEFAULT_EVENT_BUFFER, SessionError, SessionEvent, SessionHandle};

// Crate-level exports - MCP server
pub use server::{
    BingoServer, GetStateRequest, JoinSessionRequest, LoadConfigurationRequest, SubmitClaimRequest,
};

// Crate-level exports - Settings
pub use settings::{ServerSettings, SettingsError};
