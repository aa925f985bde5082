//! Session arbiter: one task owns the coordinator and applies requests in
//! arrival order.
//!
//! Any number of [`SessionHandle`] clones can submit requests concurrently.
//! They are queued on a channel and the arbiter task processes them one at
//! a time, so for two concurrent claims on the same square exactly one sees
//! it unclaimed. State changes are published to subscribers as
//! [`SessionEvent`]s after they are applied.

use crate::coordinator::{
    ClaimCoordinator, ClaimOutcome, CoordinatorError, LeaderboardEntry, SessionSnapshot,
};
use crate::store::{PlayerSnapshot, SessionStore};
use bingo_core::{BoardConfiguration, PlayerId};
use derive_more::{Display, Error};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, instrument, warn};

/// Pending requests the arbiter will queue before senders wait.
const REQUEST_BUFFER: usize = 256;

/// Default number of events a slow subscriber may fall behind by.
pub const DEFAULT_EVENT_BUFFER: usize = 256;

/// Published state changes.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A player's checked squares, completions or score changed, or they
    /// joined.
    PlayerUpdated(PlayerSnapshot),
    /// A new board was loaded.
    ConfigurationChanged(Arc<BoardConfiguration>),
    /// All players were cleared.
    SessionReset {
        /// Generation that starts with this reset.
        generation: u64,
    },
}

/// Errors returned through a [`SessionHandle`].
#[derive(Debug, Clone, Display, Error)]
pub enum SessionError {
    /// The coordinator rejected or failed the request.
    #[display("{_0}")]
    Coordinator(CoordinatorError),
    /// The arbiter task has stopped.
    #[display("Session arbiter is not running")]
    ArbiterClosed,
}

impl SessionError {
    /// Whether the same request may succeed if retried unchanged.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Coordinator(err) => err.is_retryable(),
            Self::ArbiterClosed => false,
        }
    }
}

impl From<CoordinatorError> for SessionError {
    fn from(err: CoordinatorError) -> Self {
        Self::Coordinator(err)
    }
}

type Reply<T> = oneshot::Sender<T>;

enum Request {
    Join {
        player_id: PlayerId,
        name: String,
        reply: Reply<Result<PlayerSnapshot, CoordinatorError>>,
    },
    Claim {
        player_id: PlayerId,
        square: usize,
        reply: Reply<Result<ClaimOutcome, CoordinatorError>>,
    },
    Load {
        text: String,
        uploader: Option<(PlayerId, String)>,
        reply: Reply<Result<Arc<BoardConfiguration>, CoordinatorError>>,
    },
    Reset {
        reply: Reply<Result<u64, CoordinatorError>>,
    },
    Snapshot {
        reply: Reply<SessionSnapshot>,
    },
    Leaderboard {
        reply: Reply<Vec<LeaderboardEntry>>,
    },
    HeldByOthers {
        viewer: PlayerId,
        reply: Reply<BTreeMap<usize, PlayerId>>,
    },
}

/// Cloneable handle to a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    requests: mpsc::Sender<Request>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionHandle {
    /// Spawns the arbiter task on the current Tokio runtime.
    #[instrument(skip(store))]
    pub fn spawn<S>(store: S, event_buffer: usize) -> Self
    where
        S: SessionStore + 'static,
    {
        let (requests, inbox) = mpsc::channel(REQUEST_BUFFER);
        let (events, _) = broadcast::channel(event_buffer.max(1));
        let arbiter = Arbiter {
            coordinator: ClaimCoordinator::new(store),
            events: events.clone(),
        };
        tokio::spawn(arbiter.run(inbox));
        info!("Session arbiter started");
        Self { requests, events }
    }

    /// Subscribes to state changes from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    async fn call<T>(
        &self,
        request: impl FnOnce(Reply<T>) -> Request,
    ) -> Result<T, SessionError> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(request(reply))
            .await
            .map_err(|_| SessionError::ArbiterClosed)?;
        response.await.map_err(|_| SessionError::ArbiterClosed)
    }

    /// Joins (or re-joins) the session.
    ///
    /// # Errors
    ///
    /// See [`ClaimCoordinator::join_session`].
    #[instrument(skip(self))]
    pub async fn join_session(
        &self,
        player_id: &str,
        name: &str,
    ) -> Result<PlayerSnapshot, SessionError> {
        let (player_id, name) = (player_id.to_string(), name.to_string());
        Ok(self
            .call(|reply| Request::Join {
                player_id,
                name,
                reply,
            })
            .await??)
    }

    /// Submits a claim for a square.
    ///
    /// # Errors
    ///
    /// See [`ClaimCoordinator::attempt_claim`]. Rejections are `Ok`.
    #[instrument(skip(self))]
    pub async fn submit_claim(
        &self,
        player_id: &str,
        square: usize,
    ) -> Result<ClaimOutcome, SessionError> {
        let player_id = player_id.to_string();
        Ok(self
            .call(|reply| Request::Claim {
                player_id,
                square,
                reply,
            })
            .await??)
    }

    /// Validates and installs a board, clearing every player. If `uploader`
    /// is given, that player is joined to the fresh session in the same
    /// step.
    ///
    /// # Errors
    ///
    /// See [`ClaimCoordinator::load_configuration`].
    #[instrument(skip(self, text), fields(bytes = text.len()))]
    pub async fn load_configuration(
        &self,
        text: &str,
        uploader: Option<(&str, &str)>,
    ) -> Result<Arc<BoardConfiguration>, SessionError> {
        let text = text.to_string();
        let uploader = uploader.map(|(id, name)| (id.to_string(), name.to_string()));
        Ok(self
            .call(|reply| Request::Load {
                text,
                uploader,
                reply,
            })
            .await??)
    }

    /// Clears every player, keeping the board.
    ///
    /// # Errors
    ///
    /// See [`ClaimCoordinator::reset_session`].
    #[instrument(skip(self))]
    pub async fn reset_session(&self) -> Result<u64, SessionError> {
        Ok(self.call(|reply| Request::Reset { reply }).await??)
    }

    /// Consistent view of the whole session.
    ///
    /// # Errors
    ///
    /// [`SessionError::ArbiterClosed`] if the arbiter stopped.
    pub async fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        self.call(|reply| Request::Snapshot { reply }).await
    }

    /// Players ranked by score.
    ///
    /// # Errors
    ///
    /// [`SessionError::ArbiterClosed`] if the arbiter stopped.
    pub async fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>, SessionError> {
        self.call(|reply| Request::Leaderboard { reply }).await
    }

    /// Squares other players hold that `viewer` does not.
    ///
    /// # Errors
    ///
    /// [`SessionError::ArbiterClosed`] if the arbiter stopped.
    pub async fn held_by_others(
        &self,
        viewer: &str,
    ) -> Result<BTreeMap<usize, PlayerId>, SessionError> {
        let viewer = viewer.to_string();
        self.call(|reply| Request::HeldByOthers { viewer, reply }).await
    }
}

struct Arbiter<S> {
    coordinator: ClaimCoordinator<S>,
    events: broadcast::Sender<SessionEvent>,
}

impl<S: SessionStore> Arbiter<S> {
    async fn run(mut self, mut inbox: mpsc::Receiver<Request>) {
        while let Some(request) = inbox.recv().await {
            self.handle(request);
        }
        info!("All session handles dropped, arbiter stopping");
    }

    fn handle(&mut self, request: Request) {
        match request {
            Request::Join {
                player_id,
                name,
                reply,
            } => {
                let result = self.coordinator.join_session(&player_id, &name);
                if let Ok(player) = &result {
                    self.publish(SessionEvent::PlayerUpdated(player.clone()));
                }
                respond(reply, result);
            }
            Request::Claim {
                player_id,
                square,
                reply,
            } => {
                let result = self.coordinator.attempt_claim(&player_id, square);
                if let Ok(ClaimOutcome::Accepted { player }) = &result {
                    self.publish(SessionEvent::PlayerUpdated(player.clone()));
                }
                respond(reply, result);
            }
            Request::Load {
                text,
                uploader,
                reply,
            } => {
                let result = self.load(&text, uploader);
                respond(reply, result);
            }
            Request::Reset { reply } => {
                let result = self.coordinator.reset_session();
                if let Ok(generation) = result {
                    self.publish(SessionEvent::SessionReset { generation });
                }
                respond(reply, result);
            }
            Request::Snapshot { reply } => respond(reply, self.coordinator.snapshot()),
            Request::Leaderboard { reply } => respond(reply, self.coordinator.leaderboard()),
            Request::HeldByOthers { viewer, reply } => {
                respond(reply, self.coordinator.held_by_others(&viewer));
            }
        }
    }

    fn load(
        &mut self,
        text: &str,
        uploader: Option<(PlayerId, String)>,
    ) -> Result<Arc<BoardConfiguration>, CoordinatorError> {
        let config = self.coordinator.load_configuration(text)?;
        self.publish(SessionEvent::ConfigurationChanged(Arc::clone(&config)));
        self.publish(SessionEvent::SessionReset {
            generation: self.coordinator.generation(),
        });

        if let Some((player_id, name)) = uploader {
            // The board is already live; a failed re-join only affects the uploader.
            match self.coordinator.join_session(&player_id, &name) {
                Ok(player) => self.publish(SessionEvent::PlayerUpdated(player)),
                Err(e) => warn!(error = %e, %player_id, "Uploader could not re-join"),
            }
        }
        Ok(config)
    }

    fn publish(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            debug!("No subscribers for session event");
        }
    }
}

fn respond<T>(reply: Reply<T>, value: T) {
    if reply.send(value).is_err() {
        debug!("Requester went away before the reply");
    }
}
