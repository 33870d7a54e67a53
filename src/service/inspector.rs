use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{TransportError, ValidationError, require_text};
use crate::events::queue::{EventBus, StateChange};
use crate::models::event::CalendarEvent;
use crate::models::payload::{DisplayPayload, OpaqueValue};
use crate::service::backend_service::AgentBackend;
use crate::service::sequencer::{Channel, PendingInvocation, RequestSequencer, StateSink};

#[derive(Debug, Clone, PartialEq)]
pub enum FlowState<V> {
    Idle,
    Loading,
    Success(V),
    Error(String),
}

impl<V> FlowState<V> {
    pub fn is_loading(&self) -> bool {
        matches!(self, FlowState::Loading)
    }

    pub fn value(&self) -> Option<&V> {
        match self {
            FlowState::Success(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            FlowState::Error(detail) => Some(detail.as_str()),
            _ => None,
        }
    }
}

impl<V: Clone + Into<DisplayPayload>> FlowState<V> {
    pub fn render(&self) -> String {
        match self {
            FlowState::Idle => "(not loaded)".to_string(),
            FlowState::Loading => "Loading...".to_string(),
            FlowState::Success(value) => Into::<DisplayPayload>::into(value.clone()).render(),
            FlowState::Error(detail) => format!("Error: {}", detail),
        }
    }
}

/// State cell of one fetch flow. Only the sequencer writes to it.
pub struct FlowCell<V> {
    view: Uuid,
    state: Mutex<FlowState<V>>,
    bus: EventBus,
}

impl<V: Clone> FlowCell<V> {
    /// `view` tags every change this cell announces.
    pub fn new(view: Uuid, bus: EventBus) -> Self {
        Self {
            view,
            state: Mutex::new(FlowState::Idle),
            bus,
        }
    }

    pub fn snapshot(&self) -> FlowState<V> {
        self.lock().clone()
    }

    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&FlowState<V>) -> R) -> R {
        f(&*self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, FlowState<V>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<V: Clone + Send + 'static> StateSink<Result<V, TransportError>> for FlowCell<V> {
    fn dispatched(&self, channel: Channel, sequence: u64) {
        *self.lock() = FlowState::Loading;
        self.bus.emit(StateChange::FlowLoading {
            view: self.view,
            channel,
            sequence,
        });
    }

    fn admit(&self, channel: Channel, sequence: u64, result: Result<V, TransportError>) {
        let succeeded = result.is_ok();
        let next = match result {
            Ok(value) => FlowState::Success(value),
            Err(err) => {
                warn!(view = %self.view, %channel, sequence, error = %err, "flow failed");
                FlowState::Error(err.to_string())
            }
        };
        *self.lock() = next;
        info!(view = %self.view, %channel, sequence, succeeded, "flow settled");
        self.bus.emit(StateChange::FlowSettled {
            view: self.view,
            channel,
            sequence,
            succeeded,
        });
    }
}

/// Starts `work` on `channel` and routes its result into `cell`.
pub(crate) fn run_flow<V, F>(
    sequencer: &Arc<RequestSequencer>,
    channel: Channel,
    cell: &Arc<FlowCell<V>>,
    work: F,
) -> PendingInvocation
where
    V: Clone + Send + 'static,
    F: Future<Output = Result<V, TransportError>> + Send + 'static,
{
    let sink: Arc<dyn StateSink<Result<V, TransportError>>> = cell.clone();
    sequencer.dispatch(channel, work, sink)
}

/// The three backend inspection flows (plus the test-case probe). Each has
/// its own channel and state; none waits on another. Every inspector numbers
/// its own requests, so two inspectors never drop each other's results.
pub struct DebugInspector {
    id: Uuid,
    backend: Arc<dyn AgentBackend>,
    sequencer: Arc<RequestSequencer>,
    parse_intent: Arc<FlowCell<OpaqueValue>>,
    conversation_state: Arc<FlowCell<OpaqueValue>>,
    event_dump: Arc<FlowCell<Vec<CalendarEvent>>>,
    test_case: Arc<FlowCell<OpaqueValue>>,
}

impl DebugInspector {
    pub fn new(backend: Arc<dyn AgentBackend>, bus: EventBus) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            backend,
            sequencer: Arc::new(RequestSequencer::new()),
            parse_intent: Arc::new(FlowCell::new(id, bus.clone())),
            conversation_state: Arc::new(FlowCell::new(id, bus.clone())),
            event_dump: Arc::new(FlowCell::new(id, bus.clone())),
            test_case: Arc::new(FlowCell::new(id, bus)),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn sequencer(&self) -> &RequestSequencer {
        &self.sequencer
    }

    pub fn run_parse_intent(&self, text: &str) -> Result<PendingInvocation, ValidationError> {
        let text = require_text(text)?.to_string();
        let backend = Arc::clone(&self.backend);
        Ok(run_flow(
            &self.sequencer,
            Channel::ParseIntent,
            &self.parse_intent,
            async move { backend.parse_intent(&text).await },
        ))
    }

    pub fn run_load_conversation_state(&self) -> PendingInvocation {
        let backend = Arc::clone(&self.backend);
        run_flow(
            &self.sequencer,
            Channel::ConversationState,
            &self.conversation_state,
            async move { backend.conversation_state().await },
        )
    }

    pub fn run_load_event_dump(&self) -> PendingInvocation {
        let backend = Arc::clone(&self.backend);
        run_flow(
            &self.sequencer,
            Channel::EventDump,
            &self.event_dump,
            async move { backend.event_dump().await },
        )
    }

    pub fn run_test_case(
        &self,
        input: &str,
        expected_intent: Option<&str>,
    ) -> Result<PendingInvocation, ValidationError> {
        let input = require_text(input)?.to_string();
        let expected_intent = expected_intent
            .map(str::trim)
            .filter(|intent| !intent.is_empty())
            .map(str::to_string);
        let backend = Arc::clone(&self.backend);
        Ok(run_flow(
            &self.sequencer,
            Channel::TestCase,
            &self.test_case,
            async move {
                backend
                    .run_test_case(&input, expected_intent.as_deref())
                    .await
            },
        ))
    }

    pub fn parse_intent_state(&self) -> FlowState<OpaqueValue> {
        self.parse_intent.snapshot()
    }

    pub fn conversation_state(&self) -> FlowState<OpaqueValue> {
        self.conversation_state.snapshot()
    }

    pub fn event_dump_state(&self) -> FlowState<Vec<CalendarEvent>> {
        self.event_dump.snapshot()
    }

    pub fn test_case_state(&self) -> FlowState<OpaqueValue> {
        self.test_case.snapshot()
    }
}
