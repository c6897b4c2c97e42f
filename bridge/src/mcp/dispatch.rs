//! Invocation dispatcher
//!
//! Sends one tool call with a fixed timeout and races it against an
//! optional cancellation token. Cancellation is local only: the losing call
//! future is dropped and its late response discarded, but the server is not
//! told to stop.

use std::time::Duration;

use rmcp::model::JsonObject;
use tokio_util::sync::CancellationToken;

use super::content::{normalize, ToolFailure, ToolOutcome};
use super::session::ProtocolSession;
use crate::error::SessionError;

/// Whether the token exists and has fired
pub fn is_cancelled(cancel: Option<&CancellationToken>) -> bool {
    cancel.is_some_and(CancellationToken::is_cancelled)
}

/// Dispatch one call and produce exactly one outcome
pub async fn dispatch(
    session: &dyn ProtocolSession,
    name: &str,
    arguments: JsonObject,
    cancel: Option<&CancellationToken>,
    call_timeout: Duration,
) -> ToolOutcome {
    if is_cancelled(cancel) {
        tracing::debug!(tool = name, "Call cancelled before dispatch");
        return ToolOutcome::Cancelled;
    }

    let call = tokio::time::timeout(call_timeout, session.call_tool(name, arguments));

    let settled = match cancel {
        // Biased towards the call so an answer that is already in wins a tie
        Some(token) => tokio::select! {
            biased;
            settled = call => settled,
            _ = token.cancelled() => {
                tracing::debug!(tool = name, "Call cancelled while in flight, dropping pending response");
                return ToolOutcome::Cancelled;
            }
        },
        None => call.await,
    };

    match settled {
        Ok(Ok(result)) => normalize(result),
        Ok(Err(SessionError::Disconnected)) => {
            ToolOutcome::Failure(ToolFailure::Disconnected(SessionError::Disconnected.to_string()))
        }
        Ok(Err(SessionError::Protocol(msg))) => ToolOutcome::Failure(ToolFailure::Transport(msg)),
        Err(_) => {
            tracing::warn!(tool = name, "Tool call timed out after {:?}", call_timeout);
            ToolOutcome::Failure(ToolFailure::Timeout(call_timeout))
        }
    }
}
