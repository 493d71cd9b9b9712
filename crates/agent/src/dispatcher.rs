//! Tool-call dispatcher.
//!
//! Auto-tier calls run straight away, one at a time, in call order. The rest
//! are queued as pending approvals and the loop parks until a human resolves
//! every one of them. Whatever the execution order, tool results land in the
//! transcript in the order the model listed the calls.

use futures::FutureExt;
use serde_json::Value;
use std::fmt::Display;
use std::panic::AssertUnwindSafe;
use tldw_agent_core::error::{Error, Result};
use tldw_agent_core::event::AgentEvent;
use tldw_agent_core::message::{AgentMessage, ToolCall};
use tldw_agent_core::session::{ApprovalStatus, PendingApproval, SessionStatus};
use tldw_agent_tools::{map_tool_name, should_auto_approve, tier_for};
use tracing::{debug, info, warn};

use crate::loop_runner::AgentLoop;

pub const REJECTED_MESSAGE: &str = "User rejected this action";
const CANCELLED_MESSAGE: &str = "Cancelled before approval";

/// `{"ok": false, "error": ...}`
pub fn failure_result(error: impl Display) -> Value {
    serde_json::json!({ "ok": false, "error": error.to_string() })
}

/// The fixed payload recorded for a rejected call.
pub fn rejection_result() -> Value {
    failure_result(REJECTED_MESSAGE)
}

impl AgentLoop {
    /// Run or gate every call of one turn, then append one tool message per
    /// call in call order.
    ///
    /// Returns [`Error::Cancelled`] if cancelled while waiting for approval;
    /// the tool messages are appended either way.
    pub(crate) async fn process_tool_calls(&self, calls: &[ToolCall]) -> Result<()> {
        let mut results: Vec<Option<Value>> = vec![None; calls.len()];
        let mut auto = Vec::new();
        let mut gated = Vec::new();

        for (position, call) in calls.iter().enumerate() {
            let capability = map_tool_name(&call.name);
            let tier = tier_for(capability);
            if should_auto_approve(tier, &self.settings) {
                auto.push(position);
            } else {
                let arguments = call
                    .parse_arguments()
                    .unwrap_or_else(|_| Value::String(call.arguments.clone()));
                gated.push((
                    position,
                    PendingApproval {
                        tool_call_id: call.id.clone(),
                        tool_name: call.name.clone(),
                        capability: capability.to_string(),
                        arguments,
                        tier,
                        status: ApprovalStatus::Pending,
                    },
                ));
            }
        }

        for position in auto {
            results[position] = Some(self.execute_tool_call(&calls[position]).await);
        }

        let outcome = if gated.is_empty() {
            Ok(())
        } else {
            self.run_gated(calls, gated, &mut results).await
        };

        self.shared.with_session(|s| {
            for (call, result) in calls.iter().zip(results) {
                let result = result.unwrap_or_else(|| failure_result(CANCELLED_MESSAGE));
                s.push(AgentMessage::tool_result(call.id.clone(), &result));
            }
        });

        outcome
    }

    async fn run_gated(
        &self,
        calls: &[ToolCall],
        gated: Vec<(usize, PendingApproval)>,
        results: &mut [Option<Value>],
    ) -> Result<()> {
        let (positions, approvals): (Vec<usize>, Vec<PendingApproval>) = gated.into_iter().unzip();

        info!(count = approvals.len(), "Waiting for approval");
        self.shared.with_session(|s| {
            s.pending_approvals = approvals.clone();
            s.set_status(SessionStatus::WaitingApproval);
        });
        self.emit(AgentEvent::ApprovalNeeded { approvals });

        self.wait_for_approvals().await?;

        let resolved = self.shared.with_session(|s| {
            s.set_status(SessionStatus::Running);
            std::mem::take(&mut s.pending_approvals)
        });

        for (position, approval) in positions.into_iter().zip(resolved) {
            let call = &calls[position];
            results[position] = Some(match approval.status {
                ApprovalStatus::Approved => self.execute_tool_call(call).await,
                ApprovalStatus::Rejected | ApprovalStatus::Pending => {
                    debug!(tool = %call.name, id = %call.id, "Tool call rejected");
                    rejection_result()
                }
            });
        }

        Ok(())
    }

    /// Park until no approval is pending, or the run is cancelled.
    ///
    /// Woken by approve/reject/cancel; the poll interval is only a fallback.
    async fn wait_for_approvals(&self) -> Result<()> {
        let interval = self.settings.approval_poll_interval();

        loop {
            // Register before checking so a resolve in between is not lost
            let notified = self.shared.approvals_changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.shared.cancel.is_cancelled() {
                self.shared.with_session(|s| s.pending_approvals.clear());
                return Err(Error::Cancelled);
            }
            if self.shared.with_session(|s| s.approvals_resolved()) {
                return Ok(());
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = self.shared.cancel.cancelled() => {}
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }

    /// Execute one call. Failures come back as `{"ok": false, "error"}`.
    pub(crate) async fn execute_tool_call(&self, call: &ToolCall) -> Value {
        let capability = map_tool_name(&call.name);
        let parsed = call.parse_arguments();

        self.emit(AgentEvent::ToolStart {
            tool_call_id: call.id.clone(),
            name: call.name.clone(),
            capability: capability.to_string(),
            arguments: match &parsed {
                Ok(arguments) => arguments.clone(),
                Err(_) => Value::String(call.arguments.clone()),
            },
        });
        debug!(tool = %call.name, capability, id = %call.id, "Executing tool");

        let result = match parsed {
            Ok(arguments) => {
                let invocation = AssertUnwindSafe(self.executor.execute(capability, arguments));
                match invocation.catch_unwind().await {
                    Ok(Ok(value)) => value,
                    Ok(Err(e)) => {
                        warn!(tool = %call.name, capability, error = %e, "Tool failed");
                        failure_result(e)
                    }
                    Err(_) => {
                        warn!(tool = %call.name, capability, "Tool executor panicked");
                        failure_result(format!("Tool executor panicked while running {capability}"))
                    }
                }
            }
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Unparseable tool arguments");
                failure_result(e)
            }
        };

        self.emit(AgentEvent::ToolComplete {
            tool_call_id: call.id.clone(),
            name: call.name.clone(),
            result: result.clone(),
        });

        result
    }
}
