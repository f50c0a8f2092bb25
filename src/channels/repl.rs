//! Interactive REPL front-end.
//!
//! Uses rustyline for line editing, history, and tab-completion. The REPL
//! stands in for the conversational front-end: `/verify` starts a command,
//! plain text is relayed to the pipeline as the user's spoken reply.
//!
//! ## Commands
//!
//! - `/verify <action> <amount> [to|into|via] <target>` - start a command
//! - `/status` - Show the session phase and pending command
//! - `/cancel` - Drop the pending command
//! - `/balance [target]` - Native balance of an address, name or the agent wallet
//! - `/wallet` - Agent wallet info
//! - `/tools` - List registered tools
//! - `/debug` - Toggle debug mode (raw JSON responses)
//! - `/help` - Show available commands
//! - `/quit` or `/exit` - Exit the REPL

use std::borrow::Cow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rustyline::completion::Completer;
use rustyline::config::Config;
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{CompletionType, Editor, Helper};
use tokio::sync::{broadcast, mpsc};

use crate::app::App;
use crate::error::ChannelError;
use crate::pipeline::{
    Action, Amount, EventType, OutcomeStatus, PipelineResponse, SessionEvent, Session, StepState,
};
use crate::tools::{BALANCE_TOOL_NAME, ToolContext, WALLET_INFO_TOOL_NAME};

/// Slash commands available in the REPL.
const SLASH_COMMANDS: &[&str] = &[
    "/verify", "/status", "/cancel", "/balance", "/wallet", "/tools", "/debug", "/help", "/quit",
    "/exit",
];

/// One parsed input line.
#[derive(Debug, Clone, PartialEq)]
enum ReplCommand {
    Verify {
        action: Action,
        amount: Amount,
        target: String,
    },
    Status,
    Cancel,
    Balance(Option<String>),
    Wallet,
    Tools,
    Debug,
    Help,
    Quit,
    /// Free text relayed as the user's reply.
    Say(String),
}

fn parse_line(line: &str) -> Result<ReplCommand, String> {
    let line = line.trim();
    if !line.starts_with('/') {
        return Ok(ReplCommand::Say(line.to_string()));
    }

    let mut parts = line.split_whitespace();
    let command = parts.next().unwrap_or_default().to_ascii_lowercase();
    let args: Vec<&str> = parts.collect();

    match command.as_str() {
        "/verify" => parse_verify(&args),
        "/status" => Ok(ReplCommand::Status),
        "/cancel" => Ok(ReplCommand::Cancel),
        "/balance" => Ok(ReplCommand::Balance(args.first().map(|s| s.to_string()))),
        "/wallet" => Ok(ReplCommand::Wallet),
        "/tools" => Ok(ReplCommand::Tools),
        "/debug" => Ok(ReplCommand::Debug),
        "/help" => Ok(ReplCommand::Help),
        "/quit" | "/exit" => Ok(ReplCommand::Quit),
        other => Err(format!("unknown command {other}; try /help")),
    }
}

/// `send 1 ETH to vitalik.eth`, `deposit 0.5 ETH into 0x...`.
fn parse_verify(args: &[&str]) -> Result<ReplCommand, String> {
    const USAGE: &str = "usage: /verify <action> <amount> <denomination> [to|into|via] <target>";

    let (action, rest) = args.split_first().ok_or(USAGE)?;
    let (target, rest) = rest.split_last().ok_or(USAGE)?;
    let amount_parts = match rest.split_last() {
        Some((last, head)) if matches!(last.to_ascii_lowercase().as_str(), "to" | "into" | "via") => {
            head
        }
        _ => rest,
    };
    if amount_parts.is_empty() {
        return Err(USAGE.to_string());
    }

    Ok(ReplCommand::Verify {
        action: action.parse()?,
        amount: amount_parts.join(" ").parse()?,
        target: target.to_string(),
    })
}

/// Rustyline helper for slash-command tab completion.
struct ReplHelper;

impl Completer for ReplHelper {
    type Candidate = String;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        if !line.starts_with('/') {
            return Ok((0, vec![]));
        }

        let prefix = &line[..pos];
        let matches: Vec<String> = SLASH_COMMANDS
            .iter()
            .filter(|cmd| cmd.starts_with(prefix))
            .map(|cmd| cmd.to_string())
            .collect();

        Ok((0, matches))
    }
}

impl Hinter for ReplHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> Option<String> {
        if !line.starts_with('/') || pos < line.len() {
            return None;
        }

        SLASH_COMMANDS
            .iter()
            .find(|cmd| cmd.starts_with(line) && **cmd != line)
            .map(|cmd| cmd[line.len()..].to_string())
    }
}

impl Highlighter for ReplHelper {
    fn highlight_hint<'h>(&self, hint: &'h str) -> Cow<'h, str> {
        Cow::Owned(format!("\x1b[90m{hint}\x1b[0m"))
    }
}

impl Validator for ReplHelper {}
impl Helper for ReplHelper {}

fn print_help() {
    let h = "\x1b[1m";
    let c = "\x1b[1;36m";
    let d = "\x1b[90m";
    let r = "\x1b[0m";

    println!();
    println!("  {h}pyra REPL{r}");
    println!();
    println!("  {h}Commands{r}");
    println!("  {c}/verify send 1 ETH to vitalik.eth{r}  {d}start a guarded command{r}");
    println!("  {c}/status{r}                            {d}show session phase{r}");
    println!("  {c}/cancel{r}                            {d}drop the pending command{r}");
    println!("  {c}/balance [target]{r}                  {d}native balance lookup{r}");
    println!("  {c}/wallet{r}                            {d}agent wallet info{r}");
    println!("  {c}/tools{r}                             {d}list tools{r}");
    println!("  {c}/debug{r}                             {d}toggle raw responses{r}");
    println!("  {c}/quit{r} {c}/exit{r}                        {d}exit the repl{r}");
    println!();
    println!("  {h}Replies{r}");
    println!("  {c}yes{r} / {c}no{r}        {d}confirm or reject the restated command{r}");
    println!("  {c}acknowledge{r}     {d}proceed past a security warning{r}");
    println!("  {c}execute{r}         {d}dispatch once checks pass{r}");
    println!("  {c}cancel{r}          {d}abort at any point{r}");
    println!();
}

/// Get the history file path (~/.pyra/history).
fn history_path() -> std::path::PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(".pyra")
        .join("history")
}

fn status_color(status: OutcomeStatus) -> &'static str {
    match status {
        OutcomeStatus::Success | OutcomeStatus::ChecksPassed => "\x1b[32m",
        OutcomeStatus::NeedsVerification | OutcomeStatus::Pending => "\x1b[33m",
        OutcomeStatus::Aborted | OutcomeStatus::Error => "\x1b[31m",
    }
}

fn render_event(event: &SessionEvent) -> String {
    let progress = &event.event;
    let (color, mark) = match progress.state {
        StepState::Passed | StepState::Executed => ("\x1b[32m", "ok"),
        StepState::Failed => ("\x1b[31m", "xx"),
        StepState::Running => ("\x1b[36m", ".."),
        StepState::Pending => ("\x1b[33m", "??"),
    };
    let label = match progress.kind {
        EventType::GateUpdate => progress.step.as_str().to_ascii_lowercase(),
        EventType::ScanResult => "scan result".to_string(),
    };
    let mut line = format!("  {color}[{mark}]\x1b[0m \x1b[90m{label}\x1b[0m");
    if let Some(detail) = &progress.detail {
        line.push_str(&format!(" {detail}"));
    }
    if let Some(issues) = progress.issues.as_ref().filter(|i| !i.is_empty()) {
        line.push_str(&format!(" \x1b[90m({})\x1b[0m", issues.join("; ")));
    }
    line
}

pub struct ReplChannel {
    app: Arc<App>,
    debug_mode: Arc<AtomicBool>,
}

impl ReplChannel {
    pub fn new(app: Arc<App>) -> Self {
        Self {
            app,
            debug_mode: Arc::new(AtomicBool::new(false)),
        }
    }

    fn print_response(&self, response: &PipelineResponse) {
        if self.debug_mode.load(Ordering::Relaxed) {
            match serde_json::to_string_pretty(response) {
                Ok(json) => println!("\x1b[90m{json}\x1b[0m"),
                Err(e) => eprintln!("failed to render response: {e}"),
            }
        }
        println!(
            "{}\u{25CF}\x1b[0m {}",
            status_color(response.status),
            response.message
        );
    }

    async fn call_tool(&self, session: &mut Session, name: &str, params: serde_json::Value) {
        let mut ctx = ToolContext::new(session);
        match self.app.tools.call(name, params, &mut ctx).await {
            Ok(output) => match serde_json::to_string_pretty(&output.result) {
                Ok(json) => println!("{json}"),
                Err(e) => eprintln!("failed to render result: {e}"),
            },
            Err(e) => println!("\x1b[31m\u{25CF}\x1b[0m {e}"),
        }
    }

    /// Handle one line. Returns false when the REPL should exit.
    async fn dispatch(&self, session: &mut Session, line: &str) -> bool {
        let command = match parse_line(line) {
            Ok(command) => command,
            Err(e) => {
                println!("\x1b[31m\u{25CF}\x1b[0m {e}");
                return true;
            }
        };
        let orchestrator = &self.app.orchestrator;

        let outcome = match command {
            ReplCommand::Quit => return false,
            ReplCommand::Help => {
                print_help();
                return true;
            }
            ReplCommand::Debug => {
                let current = self.debug_mode.fetch_xor(true, Ordering::Relaxed);
                println!(
                    "\x1b[90mdebug mode {}\x1b[0m",
                    if current { "off" } else { "on" }
                );
                return true;
            }
            ReplCommand::Tools => {
                for definition in self.app.tools.definitions() {
                    println!("  \x1b[1;36m{}\x1b[0m  {}", definition.name, definition.description);
                }
                return true;
            }
            ReplCommand::Status => {
                match serde_json::to_string_pretty(&orchestrator.status(session)) {
                    Ok(json) => println!("{json}"),
                    Err(e) => eprintln!("failed to render status: {e}"),
                }
                return true;
            }
            ReplCommand::Balance(target) => {
                let params = serde_json::json!({ "target": target });
                self.call_tool(session, BALANCE_TOOL_NAME, params).await;
                return true;
            }
            ReplCommand::Wallet => {
                self.call_tool(session, WALLET_INFO_TOOL_NAME, serde_json::json!({}))
                    .await;
                return true;
            }
            ReplCommand::Verify {
                action,
                amount,
                target,
            } => orchestrator.verify(session, action, amount, &target),
            ReplCommand::Cancel => orchestrator.cancel(session),
            ReplCommand::Say(text) => orchestrator.handle_utterance(session, &text).await,
        };

        match outcome {
            Ok(response) => self.print_response(&response),
            Err(e) => self.print_response(&PipelineResponse::error(&e)),
        }
        true
    }

    /// Run until the user quits or input closes.
    pub async fn run(&self) -> Result<(), ChannelError> {
        let (tx, mut rx) = mpsc::channel::<String>(32);
        let debug_mode = Arc::clone(&self.debug_mode);

        let mut session = Session::new();
        let session_id = session.id;
        let mut events = self.app.events.subscribe();
        let printer = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) if event.session_id == session_id => {
                        println!("{}", render_event(&event));
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::debug!("REPL event printer skipped {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        std::thread::spawn(move || {
            let config = match Config::builder().history_ignore_dups(true) {
                Ok(builder) => builder
                    .auto_add_history(true)
                    .completion_type(CompletionType::List)
                    .build(),
                Err(e) => {
                    eprintln!("Failed to configure line editor: {e}");
                    return;
                }
            };

            let mut rl = match Editor::with_config(config) {
                Ok(editor) => editor,
                Err(e) => {
                    eprintln!("Failed to initialize line editor: {e}");
                    return;
                }
            };
            rl.set_helper(Some(ReplHelper));

            let hist_path = history_path();
            if let Some(parent) = hist_path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            let _ = rl.load_history(&hist_path);

            loop {
                let prompt = if debug_mode.load(Ordering::Relaxed) {
                    "\x1b[33m[debug]\x1b[0m \x1b[1;36m\u{203A}\x1b[0m "
                } else {
                    "\x1b[1;36m\u{203A}\x1b[0m "
                };

                match rl.readline(prompt) {
                    Ok(line) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        if tx.blocking_send(line.to_string()).is_err() {
                            break;
                        }
                    }
                    Err(ReadlineError::Interrupted) => {
                        // Ctrl+C cancels whatever is pending
                        if tx.blocking_send("/cancel".to_string()).is_err() {
                            break;
                        }
                    }
                    Err(ReadlineError::Eof) => {
                        let _ = tx.blocking_send("/quit".to_string());
                        break;
                    }
                    Err(e) => {
                        eprintln!("Input error: {e}");
                        break;
                    }
                }
            }

            let _ = rl.save_history(&history_path());
        });

        println!("\x1b[1mpyra\x1b[0m  /help for commands, /quit to exit");
        if self.app.orchestrator.dispatcher().is_simulated() {
            println!("\x1b[90mtransfers are simulated; no funds will move\x1b[0m");
        }
        println!();

        while let Some(line) = rx.recv().await {
            if !self.dispatch(&mut session, &line).await {
                break;
            }
        }

        printer.abort();
        tracing::debug!("REPL session {} closed", session_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::pipeline::{PhaseKind, ProgressEvent, Step};

    #[test]
    fn verify_accepts_optional_preposition() {
        let expected = ReplCommand::Verify {
            action: Action::Send,
            amount: "1 ETH".parse().unwrap(),
            target: "vitalik.eth".to_string(),
        };
        assert_eq!(parse_line("/verify send 1 ETH to vitalik.eth"), Ok(expected.clone()));
        assert_eq!(parse_line("/verify send 1 ETH vitalik.eth"), Ok(expected));
    }

    #[test]
    fn verify_reports_usage_and_parse_errors() {
        assert!(parse_line("/verify send").unwrap_err().starts_with("usage"));
        assert!(
            parse_line("/verify fly 1 ETH to x.eth")
                .unwrap_err()
                .contains("invalid action")
        );
        assert!(
            parse_line("/verify send lots to x.eth")
                .unwrap_err()
                .contains("invalid amount")
        );
    }

    #[test]
    fn plain_text_is_relayed() {
        assert_eq!(
            parse_line("  yes please "),
            Ok(ReplCommand::Say("yes please".to_string()))
        );
        assert_eq!(parse_line("/EXIT"), Ok(ReplCommand::Quit));
        assert!(parse_line("/teleport").is_err());
    }

    #[test]
    fn events_render_step_and_detail() {
        let event = SessionEvent {
            session_id: uuid::Uuid::new_v4(),
            event: ProgressEvent::gate(Step::ContractDetection, StepState::Failed)
                .with_detail("lookup failed"),
        };
        let line = render_event(&event);
        assert!(line.contains("contract_detection"));
        assert!(line.contains("lookup failed"));
    }

    #[tokio::test]
    async fn dispatch_drives_the_pipeline() {
        let repl = ReplChannel::new(Arc::new(App::simulated(1, Duration::ZERO)));
        let mut session = Session::new();

        assert!(repl.dispatch(&mut session, "/verify send 1 ETH to vitalik.eth").await);
        assert_eq!(session.phase().kind(), PhaseKind::AwaitingVerification);
        assert!(repl.dispatch(&mut session, "yes").await);
        assert_eq!(
            session.phase().kind(),
            PhaseKind::AwaitingExecutionConfirmation
        );
        assert!(repl.dispatch(&mut session, "execute").await);
        assert_eq!(session.phase().kind(), PhaseKind::Executed);
        assert!(!repl.dispatch(&mut session, "/quit").await);
    }
}
