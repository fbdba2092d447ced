//! Line-delimited JSON input fed to the coordinator.
//!
//! ```text
//! {"type":"error","message":"TypeError","application":"vscode"}
//! {"type":"deletion","characters":20}
//! {"type":"productive"}
//! {"type":"say","text":"I hate you clippy"}
//! ```
//!
//! Timestamps are optional and default to the time the line is read.
//! A deletion must remove at least one character.

use std::num::NonZeroU32;

use serde::Deserialize;

use paperclip_core::Timestamp;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputEvent {
    Error {
        message: String,
        #[serde(default)]
        application: String,
        #[serde(default)]
        timestamp: Option<Timestamp>,
    },
    Deletion {
        characters: NonZeroU32,
        #[serde(default)]
        timestamp: Option<Timestamp>,
    },
    Productive,
    Say {
        text: String,
    },
}

impl InputEvent {
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}
