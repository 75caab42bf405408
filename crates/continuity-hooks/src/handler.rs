use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use continuity_core::Message;

use crate::error::{HookError, Result};
use crate::types::*;

/// The contract the host dispatches lifecycle events against.
///
/// All suspending events are `async`; `tool_result_persist` deliberately is
/// not, so a handler can never introduce I/O into that synchronous path (see
/// the design note on "async suspension in hooks"). Every turn-path method
/// degrades to an empty/no-op result on internal failure rather than
/// propagating an error to the host — §7 of the design.
#[async_trait]
pub trait LifecycleHandler: Send + Sync {
    /// Returns the string to prepend to the user's message. Empty = no injection.
    async fn before_agent_start(&self, event: BeforeAgentStart) -> String;

    async fn before_tool_call(&self, event: BeforeToolCall);

    async fn after_tool_call(&self, event: AfterToolCall);

    /// Synchronous by contract — must read only from a pre-populated cache.
    /// Returns `Some(modified)` to replace the persisted message, `None` to
    /// leave it unchanged (e.g. the tool result already parses fine).
    fn tool_result_persist(&self, event: ToolResultPersist) -> Option<Message>;

    async fn agent_end(&self, event: AgentEnd);

    async fn before_compaction(&self, event: BeforeCompaction);

    async fn session_start(&self, event: SessionStart);

    async fn session_end(&self, event: SessionEnd);
}

/// Bound a hook invocation to `timeout_ms`. `LifecycleHandler` methods never
/// return a `Result` themselves (a handler always degrades to a usable
/// default rather than failing the turn), so this is for host-side
/// dispatchers that want to detect a stuck handler and fall back on their
/// own terms rather than block the turn indefinitely.
pub async fn dispatch_with_timeout<F: Future>(timeout_ms: u64, fut: F) -> Result<F::Output> {
    tokio::time::timeout(Duration::from_millis(timeout_ms), fut)
        .await
        .map_err(|_| HookError::Timeout { ms: timeout_ms })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completes_within_timeout() {
        let result = dispatch_with_timeout(50, async { 7 }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn times_out_on_a_stuck_future() {
        let result = dispatch_with_timeout(5, async {
            tokio::time::sleep(Duration::from_secs(5)).await;
        })
        .await;
        assert!(matches!(result, Err(HookError::Timeout { ms: 5 })));
    }
}
