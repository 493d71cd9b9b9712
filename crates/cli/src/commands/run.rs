//! `tldw-agent run`: run one task, prompting for approvals on the terminal.

use std::future::Future;
use std::io::{BufRead, BufReader, Write};
use std::sync::Arc;
use tldw_agent::{AgentHandle, AgentLoop};
use tldw_agent_config::AppConfig;
use tldw_agent_core::agent::AgentSettingsOverrides;
use tldw_agent_core::event::{AgentEvent, ChannelSink};
use tldw_agent_core::session::{AgentRunResult, PendingApproval, RunStatus};
use tldw_agent_providers::OpenAiCompatProvider;
use tldw_agent_tools::RemoteToolExecutor;
use tokio::sync::mpsc;
use tracing::{debug, info};

const ARGUMENT_PREVIEW_CHARS: usize = 200;

/// Lines typed at the approval prompt.
type Answers = mpsc::UnboundedReceiver<std::io::Result<String>>;

pub struct RunOptions {
    pub task: String,
    pub workspace: String,
    pub model: Option<String>,
    pub max_steps: Option<u32>,
    pub auto_approve_writes: bool,
    pub auto_approve_exec: bool,
}

impl RunOptions {
    fn overrides(&self) -> AgentSettingsOverrides {
        AgentSettingsOverrides {
            model: self.model.clone(),
            max_steps: self.max_steps,
            auto_approve_writes: self.auto_approve_writes.then_some(true),
            auto_approve_exec: self.auto_approve_exec.then_some(true),
            ..Default::default()
        }
    }
}

pub async fn run(options: RunOptions) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if config.server.api_key.is_none() {
        eprintln!("  warning: no API key configured (set TLDW_API_KEY or server.api_key)");
    }

    let provider = OpenAiCompatProvider::from_config(&config)?;
    let executor = RemoteToolExecutor::from_config(&config)?;
    let settings = config.agent_settings().merge(options.overrides());

    info!(
        workspace = %options.workspace,
        model = %settings.model,
        tools = %executor.endpoint(),
        "Starting agent"
    );

    let (sink, mut events) = ChannelSink::channel();
    let agent = Arc::new(AgentLoop::new(
        Arc::new(provider),
        Arc::new(executor),
        options.workspace.clone(),
        options.task.clone(),
        settings,
        Arc::new(sink),
    ));
    let handle = agent.handle();

    let runner = tokio::spawn(async move { agent.run().await });

    let ctrl_c = {
        let handle = handle.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!();
                eprintln!("  Cancelling...");
                handle.cancel();
            }
        })
    };

    // Started on the first prompt so runs that never ask leave stdin alone
    let mut answers: Option<Answers> = None;

    // The channel closes once the loop finishes and drops its sink
    while let Some(event) = events.recv().await {
        render(&event)?;
        if let AgentEvent::ApprovalNeeded { approvals } = event {
            let answers =
                answers.get_or_insert_with(|| spawn_line_reader(BufReader::new(std::io::stdin())));
            ask_for_approvals(&handle, answers, approvals).await?;
        }
    }

    let result = runner.await?;
    ctrl_c.abort();
    print_result(&result);

    match result.status {
        RunStatus::Error => Err(result
            .error
            .unwrap_or_else(|| "agent run failed".to_string())
            .into()),
        _ => Ok(()),
    }
}

fn render(event: &AgentEvent) -> std::io::Result<()> {
    let mut out = std::io::stdout();
    match event {
        AgentEvent::StepStart { step } => debug!(step, "Step"),
        AgentEvent::LlmChunk { content } => {
            write!(out, "{content}")?;
            out.flush()?;
        }
        AgentEvent::LlmComplete { content, .. } if !content.is_empty() => writeln!(out)?,
        AgentEvent::ToolStart {
            name, arguments, ..
        } => writeln!(out, "  → {name} {}", preview(arguments))?,
        AgentEvent::ToolComplete { name, result, .. } => {
            let outcome = if is_failure(result) { "failed" } else { "ok" };
            writeln!(out, "  ← {name}: {outcome}")?;
        }
        AgentEvent::Error { message } => eprintln!("  [Error] {message}"),
        _ => {}
    }
    Ok(())
}

/// Read lines on a detached thread.
///
/// A blocking read inside the runtime would keep `main` from returning after
/// a cancel until the user pressed Enter; a plain thread is not waited on.
fn spawn_line_reader<R: BufRead + Send + 'static>(mut reader: R) -> Answers {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        loop {
            let mut line = String::new();
            match reader.read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {
                    if tx.send(Ok(line)).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    let _ = tx.send(Err(e));
                    break;
                }
            }
        }
    });
    rx
}

/// Wait for the next typed line, or `None` once `cancelled` resolves.
///
/// End of input reads as an empty answer, which rejects.
async fn next_answer(
    answers: &mut Answers,
    cancelled: impl Future<Output = ()>,
) -> std::io::Result<Option<String>> {
    tokio::select! {
        answer = answers.recv() => answer.transpose().map(|line| Some(line.unwrap_or_default())),
        _ = cancelled => Ok(None),
    }
}

async fn ask_for_approvals(
    handle: &AgentHandle,
    answers: &mut Answers,
    approvals: Vec<PendingApproval>,
) -> Result<(), Box<dyn std::error::Error>> {
    println!();
    println!("  {} action(s) need approval:", approvals.len());

    for approval in approvals {
        if handle.is_cancelled() {
            break;
        }
        print!(
            "  ? {} [{}] {}\n    Approve? [y/N] ",
            approval.tool_name,
            approval.tier,
            preview(&approval.arguments)
        );
        std::io::stdout().flush()?;

        let Some(answer) = next_answer(answers, handle.cancelled()).await? else {
            break;
        };

        let ids = [approval.tool_call_id];
        if is_yes(&answer) {
            handle.approve_pending(&ids);
        } else {
            handle.reject_pending(&ids);
        }
    }
    println!();
    Ok(())
}

fn print_result(result: &AgentRunResult) {
    println!();
    match result.status {
        RunStatus::Complete => println!("  Done after {} step(s).", result.steps_completed),
        RunStatus::MaxStepsReached => println!(
            "  Stopped: step budget used up after {} step(s).",
            result.steps_completed
        ),
        RunStatus::Cancelled => println!("  Cancelled after {} step(s).", result.steps_completed),
        RunStatus::Error => println!("  Failed after {} step(s).", result.steps_completed),
    }
}

/// Empty input and anything but y/yes means no.
fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn is_failure(result: &serde_json::Value) -> bool {
    result.get("ok").and_then(serde_json::Value::as_bool) == Some(false)
}

/// One-line, length-capped rendering of tool arguments.
fn preview(arguments: &serde_json::Value) -> String {
    let text = arguments.to_string();
    if text.chars().count() <= ARGUMENT_PREVIEW_CHARS {
        return text;
    }
    let cut: String = text.chars().take(ARGUMENT_PREVIEW_CHARS).collect();
    format!("{cut}…")
}
