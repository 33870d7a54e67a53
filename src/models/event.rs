use serde::{Deserialize, Serialize};

/// A calendar event as the backend transmits it. Times stay as the strings
/// the backend sent (`2024-05-01T15:00:00`); the client never normalizes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub title: String,
    pub start_time: String,
    pub end_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CalendarEvent {
    /// The part of `start_time` before the first `T`. A value without a `T`
    /// is returned whole.
    pub fn start_date(&self) -> &str {
        match self.start_time.split_once('T') {
            Some((date, _)) => date,
            None => &self.start_time,
        }
    }
}

/// Events whose start date equals `selected_date` exactly, in their original
/// order. No date selected means nothing is shown.
pub fn project_by_date<'a>(
    events: &'a [CalendarEvent],
    selected_date: Option<&str>,
) -> Vec<&'a CalendarEvent> {
    let Some(date) = selected_date else {
        return Vec::new();
    };
    events.iter().filter(|event| event.start_date() == date).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(title: &str, start: &str) -> CalendarEvent {
        CalendarEvent {
            title: title.to_string(),
            start_time: start.to_string(),
            end_time: start.to_string(),
            location: None,
            id: None,
            description: None,
        }
    }

    #[test]
    fn projection_matches_date_prefix_exactly() {
        let events = vec![
            event("standup", "2024-05-01T09:00:00"),
            event("lunch", "2024-05-02T12:00:00"),
            event("review", "2024-05-01T15:00:00+08:00"),
            event("prefix trap", "2024-05-011T10:00:00"),
        ];

        let titles: Vec<&str> = project_by_date(&events, Some("2024-05-01"))
            .iter()
            .map(|e| e.title.as_str())
            .collect();
        assert_eq!(titles, vec!["standup", "review"]);
    }

    #[test]
    fn projection_without_selection_is_empty() {
        let events = vec![event("standup", "2024-05-01T09:00:00")];
        assert!(project_by_date(&events, None).is_empty());
    }

    #[test]
    fn projection_does_no_calendar_normalization() {
        let events = vec![event("late", "2024-05-01T23:30:00-05:00")];
        assert!(project_by_date(&events, Some("2024-05-02")).is_empty());
        assert!(project_by_date(&events, Some("2024-5-1")).is_empty());
    }

    #[test]
    fn projection_is_repeatable() {
        let events = vec![
            event("a", "2024-05-01T09:00:00"),
            event("b", "2024-05-01T10:00:00"),
        ];
        let first = project_by_date(&events, Some("2024-05-01"));
        let second = project_by_date(&events, Some("2024-05-01"));
        assert_eq!(first, second);
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn deserializes_backend_row_with_extra_fields() {
        let raw = r#"{"id":"7","title":"Meeting","start_time":"2024-05-01T15:00:00",
            "end_time":"2024-05-01T16:00:00","description":"","location":null,"attendees":[]}"#;
        let parsed: CalendarEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.title, "Meeting");
        assert_eq!(parsed.location, None);
        assert_eq!(parsed.id.as_deref(), Some("7"));
        assert_eq!(parsed.start_date(), "2024-05-01");
    }
}
