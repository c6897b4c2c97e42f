//! Tool call results
//!
//! Remote responses are normalized into a [`ToolOutcome`]; every invocation
//! produces exactly one.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

/// Placeholder payload for a successful call that returned no text
pub const EMPTY_SUCCESS_MESSAGE: &str = "Tool completed successfully with no text output.";

/// Detail used when the server flags an error but sends no text
pub const EMPTY_ERROR_DETAIL: &str = "tool reported an error without details";

/// One content item of a call response, in source order
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentItem {
    Text {
        text: String,
    },
    Image {
        /// Base64 payload
        data: String,
        mime_type: String,
    },
    /// Any other content kind (audio, resources, ...)
    Other {
        kind: String,
    },
}

impl ContentItem {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn image(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self::Image {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// Raw call response from a protocol session
#[derive(Debug, Clone, Default)]
pub struct RemoteCallResult {
    pub content: Vec<ContentItem>,
    pub is_error: bool,
}

/// Successful call payload
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    /// Text items joined by newline, or the placeholder when there are none
    pub text: String,
    /// All content items in source order
    pub content: Vec<ContentItem>,
}

/// Why a call failed
#[derive(Debug, Clone, PartialEq)]
pub enum ToolFailure {
    /// The server answered with its error flag set
    Remote {
        detail: String,
        content: Vec<ContentItem>,
    },
    /// No answer within the per-call bound
    Timeout(Duration),
    /// The request failed at the protocol/transport level
    Transport(String),
    /// The transport is gone; the connection will be closed
    Disconnected(String),
    /// Arguments were not a JSON object
    InvalidArguments(String),
    /// The connection could not be established or is closed
    Unavailable(String),
}

impl ToolFailure {
    pub fn detail(&self) -> String {
        match self {
            Self::Remote { detail, .. } => detail.clone(),
            Self::Timeout(after) => format!("tool call timed out after {:?}", after),
            Self::Transport(msg) => format!("tool call failed: {}", msg),
            Self::Disconnected(msg) => format!("MCP server disconnected: {}", msg),
            Self::InvalidArguments(msg) => format!("invalid arguments: {}", msg),
            Self::Unavailable(msg) => format!("MCP server unavailable: {}", msg),
        }
    }
}

impl fmt::Display for ToolFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.detail())
    }
}

/// Final outcome of one invocation
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    Success(ToolOutput),
    Failure(ToolFailure),
    Cancelled,
}

impl ToolOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn is_error(&self) -> bool {
        !self.is_success()
    }

    /// Text for the calling session: the payload on success, the error detail otherwise
    pub fn message(&self) -> String {
        match self {
            Self::Success(output) => output.text.clone(),
            Self::Failure(failure) => failure.detail(),
            Self::Cancelled => "tool call cancelled".to_string(),
        }
    }
}

/// Join all text items with newlines, skipping other kinds
pub fn joined_text(content: &[ContentItem]) -> String {
    content
        .iter()
        .filter_map(ContentItem::as_text)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Normalize a remote response into an outcome
pub fn normalize(result: RemoteCallResult) -> ToolOutcome {
    let text = joined_text(&result.content);

    if result.is_error {
        let detail = if text.is_empty() {
            EMPTY_ERROR_DETAIL.to_string()
        } else {
            text
        };
        return ToolOutcome::Failure(ToolFailure::Remote {
            detail,
            content: result.content,
        });
    }

    let text = if text.is_empty() {
        EMPTY_SUCCESS_MESSAGE.to_string()
    } else {
        text
    };

    ToolOutcome::Success(ToolOutput {
        text,
        content: result.content,
    })
}
