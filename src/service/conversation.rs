use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{TransportError, ValidationError, require_text};
use crate::events::queue::{EventBus, StateChange};
use crate::models::turn::{Origin, Turn};
use crate::service::backend_service::AgentBackend;
use crate::service::sequencer::{Channel, PendingInvocation, RequestSequencer, StateSink};

#[derive(Default)]
struct LogState {
    turns: Vec<Turn>,
    error: Option<TransportError>,
}

/// Append-only turn log plus the error slot of the latest admitted reply.
pub(crate) struct ConversationLog {
    session: Uuid,
    state: Mutex<LogState>,
    bus: EventBus,
}

impl ConversationLog {
    fn new(session: Uuid, bus: EventBus) -> Self {
        Self {
            session,
            state: Mutex::new(LogState::default()),
            bus,
        }
    }

    pub fn turns(&self) -> Vec<Turn> {
        self.lock().turns.clone()
    }

    pub fn error(&self) -> Option<TransportError> {
        self.lock().error.clone()
    }

    fn append_user(&self, text: &str) {
        self.append(Turn::user(text));
    }

    fn append_agent(&self, text: &str) {
        self.append(Turn::agent(text));
    }

    fn append(&self, turn: Turn) {
        let index = {
            let mut state = self.lock();
            state.turns.push(turn.clone());
            state.turns.len() - 1
        };
        self.bus.emit(StateChange::TurnAppended {
            session: self.session,
            index,
            origin: turn.origin(),
            text: turn.text().to_string(),
        });
    }

    fn lock(&self) -> MutexGuard<'_, LogState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StateSink<Result<String, TransportError>> for ConversationLog {
    // The user turn is appended before dispatch, nothing to do here.
    fn dispatched(&self, _channel: Channel, _sequence: u64) {}

    fn admit(&self, _channel: Channel, sequence: u64, result: Result<String, TransportError>) {
        match result {
            Ok(reply) => {
                self.lock().error = None;
                self.append_agent(&reply);
            }
            Err(err) => {
                warn!(session = %self.session, sequence, error = %err, "chat turn failed");
                let detail = err.to_string();
                self.lock().error = Some(err);
                self.bus.emit(StateChange::SessionError {
                    session: self.session,
                    detail,
                });
            }
        }
    }
}

/// One chat view's conversation. Lives as long as the view; nothing is
/// persisted. Chat requests are numbered per session.
pub struct ConversationSession {
    id: Uuid,
    backend: Arc<dyn AgentBackend>,
    sequencer: Arc<RequestSequencer>,
    log: Arc<ConversationLog>,
}

impl ConversationSession {
    pub fn new(backend: Arc<dyn AgentBackend>, bus: EventBus) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            backend,
            sequencer: Arc::new(RequestSequencer::new()),
            log: Arc::new(ConversationLog::new(id, bus)),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn sequencer(&self) -> &RequestSequencer {
        &self.sequencer
    }

    /// Shows the user turn right away, then asks the agent. Only the newest
    /// chat request can add an agent turn; a failed one sets the error slot
    /// and keeps the user turn.
    pub fn submit(&self, text: &str) -> Result<PendingInvocation, ValidationError> {
        let text = require_text(text)?.to_string();
        self.log.append_user(&text);
        debug!(session = %self.id, "submitting chat turn");

        let backend = Arc::clone(&self.backend);
        let work = async move { backend.chat(&text).await };
        let sink: Arc<dyn StateSink<Result<String, TransportError>>> = self.log.clone();
        Ok(self.sequencer.dispatch(Channel::Chat, work, sink))
    }

    pub fn turns(&self) -> Vec<Turn> {
        self.log.turns()
    }

    pub fn error(&self) -> Option<TransportError> {
        self.log.error()
    }

    pub fn last_agent_turn(&self) -> Option<Turn> {
        self.log
            .turns()
            .into_iter()
            .rev()
            .find(|turn| turn.origin() == Origin::Agent)
    }
}
