use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    User,
    Agent,
}

/// One utterance in a conversation. Fields are private so a turn cannot
/// change after it lands in the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    text: String,
    origin: Origin,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            origin: Origin::User,
        }
    }

    pub fn agent(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            origin: Origin::Agent,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }
}
