use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use tracing_subscriber::EnvFilter;

use crate::clients::backend_client::BackendClient;
use crate::config::ClientSettings;
use crate::events::queue::{EventBus, StateChange};
use crate::service::backend_service::{AgentBackend, HttpBackend};
use crate::service::calendar_view::CalendarView;
use crate::service::conversation::ConversationSession;
use crate::service::inspector::DebugInspector;

/// `RUST_LOG` wins over the configured level.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Shared wiring for every view: one backend and one bus. Each view numbers
/// its own requests.
pub struct ClientRuntime {
    backend: Arc<dyn AgentBackend>,
    bus: EventBus,
}

impl ClientRuntime {
    pub fn new(backend: Arc<dyn AgentBackend>) -> (Self, UnboundedReceiver<StateChange>) {
        let (bus, rx) = EventBus::new();
        (Self { backend, bus }, rx)
    }

    pub fn from_settings(settings: &ClientSettings) -> (Self, UnboundedReceiver<StateChange>) {
        let client = BackendClient::new(settings.backend_url.clone(), settings.request_timeout);
        Self::new(Arc::new(HttpBackend::new(client)))
    }

    pub fn backend(&self) -> Arc<dyn AgentBackend> {
        Arc::clone(&self.backend)
    }

    pub fn conversation(&self) -> ConversationSession {
        ConversationSession::new(self.backend(), self.bus.clone())
    }

    pub fn inspector(&self) -> DebugInspector {
        DebugInspector::new(self.backend(), self.bus.clone())
    }

    pub fn calendar(&self) -> CalendarView {
        CalendarView::new(self.backend(), self.bus.clone())
    }
}
