use std::sync::{Arc, Mutex, PoisonError};

use uuid::Uuid;

use crate::events::queue::EventBus;
use crate::models::event::{CalendarEvent, project_by_date};
use crate::service::backend_service::AgentBackend;
use crate::service::inspector::{FlowCell, FlowState, run_flow};
use crate::service::sequencer::{Channel, PendingInvocation, RequestSequencer};

/// Fetched events plus the date the user picked. Picking a date never
/// touches the backend.
pub struct CalendarView {
    id: Uuid,
    backend: Arc<dyn AgentBackend>,
    sequencer: Arc<RequestSequencer>,
    events: Arc<FlowCell<Vec<CalendarEvent>>>,
    selected_date: Mutex<Option<String>>,
}

impl CalendarView {
    pub fn new(backend: Arc<dyn AgentBackend>, bus: EventBus) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            backend,
            sequencer: Arc::new(RequestSequencer::new()),
            events: Arc::new(FlowCell::new(id, bus)),
            selected_date: Mutex::new(None),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn load(&self) -> PendingInvocation {
        let backend = Arc::clone(&self.backend);
        run_flow(
            &self.sequencer,
            Channel::Events,
            &self.events,
            async move { backend.events().await },
        )
    }

    pub fn select_date(&self, date: Option<String>) {
        *self
            .selected_date
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = date;
    }

    pub fn selected_date(&self) -> Option<String> {
        self.selected_date
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn events_state(&self) -> FlowState<Vec<CalendarEvent>> {
        self.events.snapshot()
    }

    /// Loaded events on the selected date; empty until a load succeeds.
    pub fn visible(&self) -> Vec<CalendarEvent> {
        let selected = self.selected_date();
        self.events.with_state(|state| match state.value() {
            Some(events) => project_by_date(events, selected.as_deref())
                .into_iter()
                .cloned()
                .collect(),
            None => Vec::new(),
        })
    }
}
