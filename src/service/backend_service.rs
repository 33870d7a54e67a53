use async_trait::async_trait;
use serde_json::{Value, json};

use crate::clients::backend_client::{BackendClient, Endpoint};
use crate::error::TransportError;
use crate::models::event::CalendarEvent;
use crate::models::payload::OpaqueValue;

/// Everything the client asks of the calendar agent. Flows talk to this
/// trait so tests can swap the HTTP backend for a scripted one.
#[async_trait]
pub trait AgentBackend: Send + Sync {
    async fn chat(&self, text: &str) -> Result<String, TransportError>;

    async fn parse_intent(&self, text: &str) -> Result<OpaqueValue, TransportError>;

    async fn conversation_state(&self) -> Result<OpaqueValue, TransportError>;

    async fn event_dump(&self) -> Result<Vec<CalendarEvent>, TransportError>;

    /// The calendar view reads the same collection as the debug dump.
    async fn events(&self) -> Result<Vec<CalendarEvent>, TransportError> {
        self.event_dump().await
    }

    async fn run_test_case(
        &self,
        input: &str,
        expected_intent: Option<&str>,
    ) -> Result<OpaqueValue, TransportError>;

    async fn health(&self) -> Result<OpaqueValue, TransportError>;
}

pub struct HttpBackend {
    client: BackendClient,
}

impl HttpBackend {
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AgentBackend for HttpBackend {
    async fn chat(&self, text: &str) -> Result<String, TransportError> {
        let body = self.client.call(Endpoint::Chat, Some(&json!(text))).await?;
        decode_reply(body)
    }

    async fn parse_intent(&self, text: &str) -> Result<OpaqueValue, TransportError> {
        let body = self
            .client
            .call(Endpoint::ParseIntent, Some(&json!(text)))
            .await?;
        Ok(OpaqueValue::new(body))
    }

    async fn conversation_state(&self) -> Result<OpaqueValue, TransportError> {
        let body = self.client.call(Endpoint::ConversationState, None).await?;
        Ok(OpaqueValue::new(body))
    }

    async fn event_dump(&self) -> Result<Vec<CalendarEvent>, TransportError> {
        let body = self.client.call(Endpoint::CalendarEvents, None).await?;
        decode_events(body)
    }

    async fn run_test_case(
        &self,
        input: &str,
        expected_intent: Option<&str>,
    ) -> Result<OpaqueValue, TransportError> {
        let payload = json!({
            "input": input,
            "expected_intent": expected_intent,
        });
        let body = self
            .client
            .call(Endpoint::RunTestCase, Some(&payload))
            .await?;
        Ok(OpaqueValue::new(body))
    }

    async fn health(&self) -> Result<OpaqueValue, TransportError> {
        let body = self.client.call(Endpoint::Health, None).await?;
        Ok(OpaqueValue::new(body))
    }
}

/// Accepts `{"reply": ..}`, the older `{"response": ..}`, or a bare string.
pub fn decode_reply(body: Value) -> Result<String, TransportError> {
    match body {
        Value::String(text) => Ok(text),
        Value::Object(mut map) => {
            for key in ["reply", "response"] {
                if let Some(Value::String(text)) = map.remove(key) {
                    return Ok(text);
                }
            }
            Err(TransportError::malformed(format!(
                "chat response has no reply text: {}",
                Value::Object(map)
            )))
        }
        other => Err(TransportError::malformed(format!(
            "chat response has no reply text: {}",
            other
        ))),
    }
}

/// Accepts `{"events": [..]}` or a bare array.
pub fn decode_events(body: Value) -> Result<Vec<CalendarEvent>, TransportError> {
    let list = match body {
        Value::Array(items) => Value::Array(items),
        Value::Object(mut map) => match map.remove("events") {
            Some(events) => events,
            None => {
                return Err(TransportError::malformed(format!(
                    "event response has no events field: {}",
                    Value::Object(map)
                )));
            }
        },
        other => {
            return Err(TransportError::malformed(format!(
                "event response is not a collection: {}",
                other
            )));
        }
    };
    serde_json::from_value(list)
        .map_err(|e| TransportError::malformed(format!("invalid calendar event: {}", e)))
}
