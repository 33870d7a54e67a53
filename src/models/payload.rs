use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::event::CalendarEvent;

/// A structured backend value the client carries but never interprets
/// (parsed intents, conversation snapshots, test-case results).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpaqueValue(Value);

impl OpaqueValue {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_json(&self) -> &Value {
        &self.0
    }

    pub fn pretty(&self) -> String {
        serde_json::to_string_pretty(&self.0).unwrap_or_else(|_| self.0.to_string())
    }
}

impl From<Value> for OpaqueValue {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Every response shape the client shows, folded into one thing a render
/// surface can print.
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayPayload {
    Text(String),
    Structured(OpaqueValue),
    Events(Vec<CalendarEvent>),
}

impl DisplayPayload {
    pub fn render(&self) -> String {
        match self {
            DisplayPayload::Text(text) => text.clone(),
            DisplayPayload::Structured(value) => value.pretty(),
            DisplayPayload::Events(events) if events.is_empty() => "No events.".to_string(),
            DisplayPayload::Events(events) => events
                .iter()
                .map(render_event_line)
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

impl From<String> for DisplayPayload {
    fn from(text: String) -> Self {
        DisplayPayload::Text(text)
    }
}

impl From<OpaqueValue> for DisplayPayload {
    fn from(value: OpaqueValue) -> Self {
        DisplayPayload::Structured(value)
    }
}

impl From<Vec<CalendarEvent>> for DisplayPayload {
    fn from(events: Vec<CalendarEvent>) -> Self {
        DisplayPayload::Events(events)
    }
}

pub fn render_event_line(event: &CalendarEvent) -> String {
    let mut line = format!("{} - {}  {}", event.start_time, event.end_time, event.title);
    if let Some(location) = &event.location {
        if !location.trim().is_empty() {
            line.push_str(&format!(" @ {}", location.trim()));
        }
    }
    line
}
