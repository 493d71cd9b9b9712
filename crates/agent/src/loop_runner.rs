//! The agent loop controller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tldw_agent_core::agent::AgentSettings;
use tldw_agent_core::error::{Error, Result};
use tldw_agent_core::event::{AgentEvent, EventSink, deliver};
use tldw_agent_core::message::AgentMessage;
use tldw_agent_core::provider::{ChatRequest, Provider};
use tldw_agent_core::session::{
    AgentRunResult, AgentSession, ApprovalStatus, PendingApproval, RunStatus, SessionStatus,
};
use tldw_agent_core::tool::{ToolDefinition, ToolExecutor};
use tldw_agent_tools::tool_definitions;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::llm::call_llm;
use crate::prompt::resolve_system_prompt;

/// State shared between a running loop and its handles.
pub(crate) struct Shared {
    session: Mutex<AgentSession>,
    pub(crate) cancel: CancellationToken,
    pub(crate) approvals_changed: Notify,
    started: AtomicBool,
}

impl Shared {
    /// Run `f` against the live session. Never call this across an `.await`.
    pub(crate) fn with_session<R>(&self, f: impl FnOnce(&mut AgentSession) -> R) -> R {
        let mut guard = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    fn cancel(&self) {
        if !self.cancel.is_cancelled() {
            info!("Cancellation requested");
        }
        self.cancel.cancel();
        self.approvals_changed.notify_waiters();
    }

    fn resolve(&self, ids: &[String], status: ApprovalStatus) -> usize {
        let changed = self.with_session(|s| s.resolve_pending(ids, status));
        if changed > 0 {
            debug!(changed, ?status, "Approvals resolved");
            self.approvals_changed.notify_waiters();
        }
        changed
    }
}

/// A cloneable control handle for a running [`AgentLoop`].
///
/// UIs keep one of these while `run()` is awaited elsewhere.
#[derive(Clone)]
pub struct AgentHandle {
    shared: Arc<Shared>,
}

impl AgentHandle {
    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.shared.cancel();
    }

    /// Approve pending calls by tool-call id. Returns how many changed.
    pub fn approve_pending(&self, ids: &[String]) -> usize {
        self.shared.resolve(ids, ApprovalStatus::Approved)
    }

    /// Reject pending calls by tool-call id. Returns how many changed.
    pub fn reject_pending(&self, ids: &[String]) -> usize {
        self.shared.resolve(ids, ApprovalStatus::Rejected)
    }

    /// Snapshot of the session.
    pub fn session(&self) -> AgentSession {
        self.shared.with_session(|s| s.clone())
    }

    pub fn status(&self) -> SessionStatus {
        self.shared.with_session(|s| s.status)
    }

    pub fn pending_approvals(&self) -> Vec<PendingApproval> {
        self.shared.with_session(|s| s.pending_approvals.clone())
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }

    /// Resolves once cancellation has been requested.
    pub async fn cancelled(&self) {
        self.shared.cancel.cancelled().await;
    }
}

/// Drives one session: stream a turn, dispatch its tool calls, repeat.
pub struct AgentLoop {
    pub(crate) shared: Arc<Shared>,
    provider: Arc<dyn Provider>,
    pub(crate) executor: Arc<dyn ToolExecutor>,
    pub(crate) settings: AgentSettings,
    tools: Vec<ToolDefinition>,
    sink: Arc<dyn EventSink>,
}

impl AgentLoop {
    /// Create an idle loop for `task` in `workspace_id`.
    ///
    /// The session is seeded with the system prompt and the task; nothing is
    /// sent until [`run`](Self::run).
    pub fn new(
        provider: Arc<dyn Provider>,
        executor: Arc<dyn ToolExecutor>,
        workspace_id: impl Into<String>,
        task: impl Into<String>,
        settings: AgentSettings,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let workspace_id = workspace_id.into();
        let system_prompt = resolve_system_prompt(&workspace_id, settings.system_prompt.as_deref());
        let session = AgentSession::new(workspace_id, task, system_prompt);

        Self {
            shared: Arc::new(Shared {
                session: Mutex::new(session),
                cancel: CancellationToken::new(),
                approvals_changed: Notify::new(),
                started: AtomicBool::new(false),
            }),
            provider,
            executor,
            settings,
            tools: tool_definitions(),
            sink,
        }
    }

    pub fn handle(&self) -> AgentHandle {
        AgentHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    pub fn cancel(&self) {
        self.shared.cancel();
    }

    pub fn approve_pending(&self, ids: &[String]) -> usize {
        self.shared.resolve(ids, ApprovalStatus::Approved)
    }

    pub fn reject_pending(&self, ids: &[String]) -> usize {
        self.shared.resolve(ids, ApprovalStatus::Rejected)
    }

    /// Snapshot of the session; never the live object.
    pub fn get_session(&self) -> AgentSession {
        self.shared.with_session(|s| s.clone())
    }

    pub fn pending_approvals(&self) -> Vec<PendingApproval> {
        self.shared.with_session(|s| s.pending_approvals.clone())
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }

    pub(crate) fn emit(&self, event: AgentEvent) {
        deliver(self.sink.as_ref(), &event);
    }

    /// Run the loop to a terminal state.
    ///
    /// Never returns `Err`: stream failures, cancellation and budget
    /// exhaustion all come back as an [`AgentRunResult`]. Only the first call
    /// runs; later calls return an `error` result without touching the
    /// session.
    pub async fn run(&self) -> AgentRunResult {
        if self.shared.started.swap(true, Ordering::SeqCst) {
            warn!("run() called on a loop that already started");
            return AgentRunResult {
                status: RunStatus::Error,
                response: None,
                steps_completed: self.shared.with_session(|s| s.current_step),
                error: Some(Error::AlreadyStarted.to_string()),
            };
        }

        let session_id = self.shared.with_session(|s| {
            s.set_status(SessionStatus::Running);
            s.id.clone()
        });
        info!(
            session_id = %session_id,
            model = %self.settings.model,
            max_steps = self.settings.max_steps,
            "Agent run started"
        );

        match self.drive().await {
            Ok(result) => result,
            Err(Error::Cancelled) => self.finish_cancelled(),
            Err(e) => self.finish_error(e),
        }
    }

    async fn drive(&self) -> Result<AgentRunResult> {
        loop {
            if self.shared.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let step = self.shared.with_session(|s| {
                if s.current_step >= self.settings.max_steps {
                    return None;
                }
                s.current_step += 1;
                Some(s.current_step)
            });
            let Some(step) = step else {
                break;
            };

            debug!(step, "Step started");
            self.emit(AgentEvent::StepStart { step });

            let request = ChatRequest {
                model: self.settings.model.clone(),
                messages: self.shared.with_session(|s| s.messages.clone()),
                tools: self.tools.clone(),
            };
            let turn = call_llm(
                self.provider.as_ref(),
                request,
                step,
                &self.shared.cancel,
                self.sink.as_ref(),
            )
            .await?;

            self.emit(AgentEvent::LlmComplete {
                content: turn.content.clone(),
                tool_calls: turn.tool_calls.clone(),
            });

            if turn.tool_calls.is_empty() {
                self.shared.with_session(|s| {
                    s.push(AgentMessage::assistant(turn.content.clone()));
                    s.set_status(SessionStatus::Complete);
                });
                let result = AgentRunResult {
                    status: RunStatus::Complete,
                    response: Some(turn.content),
                    steps_completed: step,
                    error: None,
                };
                info!(steps = step, "Agent run complete");
                self.emit(AgentEvent::Complete {
                    result: result.clone(),
                });
                return Ok(result);
            }

            debug!(step, tool_calls = turn.tool_calls.len(), "Dispatching tool calls");
            // Tool messages must follow the assistant message that asked for them
            self.shared.with_session(|s| {
                s.push(AgentMessage::assistant_with_tools(
                    turn.content,
                    turn.tool_calls.clone(),
                ))
            });
            self.process_tool_calls(&turn.tool_calls).await?;
        }

        if self.shared.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let (steps, response) = self.shared.with_session(|s| {
            s.set_status(SessionStatus::Complete);
            (s.current_step, s.last_response().map(str::to_string))
        });
        let result = AgentRunResult {
            status: RunStatus::MaxStepsReached,
            response,
            steps_completed: steps,
            error: None,
        };
        info!(steps, "Step budget exhausted");
        self.emit(AgentEvent::Complete {
            result: result.clone(),
        });
        Ok(result)
    }

    fn finish_cancelled(&self) -> AgentRunResult {
        let (steps, response) = self.shared.with_session(|s| {
            s.pending_approvals.clear();
            s.set_status(SessionStatus::Cancelled);
            (s.current_step, s.last_response().map(str::to_string))
        });
        let result = AgentRunResult {
            status: RunStatus::Cancelled,
            response,
            steps_completed: steps,
            error: None,
        };
        info!(steps, "Agent run cancelled");
        self.emit(AgentEvent::Complete {
            result: result.clone(),
        });
        result
    }

    fn finish_error(&self, error: Error) -> AgentRunResult {
        let message = error.to_string();
        let steps = self.shared.with_session(|s| {
            s.pending_approvals.clear();
            s.set_status(SessionStatus::Error);
            s.current_step
        });
        warn!(steps, error = %message, "Agent run failed");
        self.emit(AgentEvent::Error {
            message: message.clone(),
        });
        AgentRunResult {
            status: RunStatus::Error,
            response: None,
            steps_completed: steps,
            error: Some(message),
        }
    }
}
