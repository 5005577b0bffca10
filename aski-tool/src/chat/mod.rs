mod editor;
mod interrupt;
pub(crate) mod render;

use std::io;
use std::path::PathBuf;

use aski_core::command::{self, CommandTable, Outcome};
use aski_core::{
    CancellationToken, ConversationGraph, FailurePolicy, Persistence, RequestParams, Role,
    StreamState, Summarizer, Transport, TurnCommitter,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use editor::ExternalEditor;
use interrupt::Interrupt;

use crate::config::open_config_dir;
use crate::error::AskiError;

/// What the prompt loop does after a command.
enum Flow {
    Continue,
    Submit(String),
    Exit,
}

/// One interactive conversation bound to a stored session.
pub struct Session<P> {
    name: String,
    graph: ConversationGraph,
    params: RequestParams,
    policy: FailurePolicy,
    store: P,
    editor: ExternalEditor,
    config_dir: Option<PathBuf>,
}

impl<P> Session<P>
where
    P: Persistence,
    AskiError: From<P::Error>,
{
    pub fn new(name: String, graph: ConversationGraph, params: RequestParams, store: P) -> Self {
        Self {
            name,
            graph,
            params,
            policy: FailurePolicy::default(),
            store,
            editor: ExternalEditor::from_env(),
            config_dir: None,
        }
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_config_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.config_dir = dir;
        self
    }

    /// Runs the prompt loop until `:exit`, Ctrl-C at the prompt or EOF.
    ///
    /// `initial` is sent as the first user turn before reading stdin.
    pub async fn run<C>(mut self, client: &C, initial: Option<&str>) -> Result<(), AskiError>
    where
        C: Transport + Summarizer,
    {
        info!(session = %self.name, model = %self.params.model, "session started");

        if let Some(text) = initial.filter(|t| !t.trim().is_empty()) {
            self.send(text, client).await;
        }

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            render::prompt(&mut io::stdout())?;

            let line = tokio::select! {
                line = lines.next_line() => line?,
                _ = tokio::signal::ctrl_c() => {
                    println!();
                    break;
                }
            };
            let Some(line) = line else {
                break;
            };

            let input = line.trim();
            if input.is_empty() {
                continue;
            }

            if !command::is_command(input) {
                self.send(input, client).await;
                continue;
            }
            let interrupt = Interrupt::ctrl_c();
            let flow = self.command(input, client, interrupt.token()).await;
            drop(interrupt);
            match flow {
                Flow::Continue => {}
                Flow::Submit(text) => self.send(&text, client).await,
                Flow::Exit => break,
            }
        }

        let interrupt = Interrupt::ctrl_c();
        self.finish(client, interrupt.token()).await
    }

    async fn send<T: Transport>(&mut self, input: &str, transport: &T) {
        let interrupt = Interrupt::ctrl_c();
        let result = TurnCommitter::new(&mut self.graph, self.policy)
            .exchange(input, transport, &self.params, interrupt.token(), io::stdout())
            .await;
        drop(interrupt);
        println!();

        match result {
            Ok(exchange) => {
                if exchange.state == StreamState::Cancelled {
                    render::notice("(cancelled)");
                }
                info!(
                    user = %exchange.user,
                    reply = ?exchange.reply,
                    state = ?exchange.state,
                    "exchange finished"
                );
                self.save();
            }
            Err(e) => {
                warn!(error = %e, "exchange failed");
                render::error(&e);
            }
        }
    }

    /// Runs one `:` command. Failures are reported and the prompt continues.
    async fn command<S: Summarizer>(
        &mut self,
        input: &str,
        summarizer: &S,
        cancel: &CancellationToken,
    ) -> Flow {
        let table = CommandTable::default();
        let command = match table.parse(input) {
            Ok(command) => command,
            Err(e) => {
                render::error(&e);
                return Flow::Continue;
            }
        };

        let dispatched = cancel
            .run_until_cancelled(command::dispatch(
                command,
                &mut self.graph,
                summarizer,
                &self.editor,
            ))
            .await;
        let outcome = match dispatched {
            Some(Ok(outcome)) => outcome,
            Some(Err(e)) => {
                render::error(&e);
                return Flow::Continue;
            }
            None => {
                println!();
                render::notice("(cancelled)");
                return Flow::Continue;
            }
        };

        let shown = match outcome {
            Outcome::Submit(text) => return Flow::Submit(text),
            Outcome::Exit => return Flow::Exit,
            outcome => self.show(outcome),
        };
        if let Err(e) = shown {
            warn!(error = %e, "command failed");
            render::error(&e);
        }
        Flow::Continue
    }

    fn show(&self, outcome: Outcome) -> Result<(), AskiError> {
        let mut out = io::stdout();
        match outcome {
            Outcome::History => render::history(&mut out, &self.graph)?,
            Outcome::Summary(text) => render::summary(&mut out, &text)?,
            Outcome::Moved(hash) => render::moved(&mut out, self.graph.get(&hash)?)?,
            Outcome::Unchanged => render::notice("(no input)"),
            Outcome::OpenConfig => match &self.config_dir {
                Some(dir) => open_config_dir(dir)?,
                None => render::notice("(no configuration directory)"),
            },
            Outcome::Submit(_) | Outcome::Exit => {}
        }
        Ok(())
    }

    fn save(&self) {
        if let Err(e) = self.store.save(&self.name, &self.graph.snapshot()) {
            warn!(session = %self.name, error = %e, "failed to save session");
        }
    }

    /// Titles the conversation if it has none yet, saves it and prints its name.
    ///
    /// Cancelling `cancel` skips the title but still saves.
    async fn finish<S: Summarizer>(
        &mut self,
        summarizer: &S,
        cancel: &CancellationToken,
    ) -> Result<(), AskiError> {
        let has_turns = self
            .graph
            .active_path()
            .iter()
            .any(|n| n.role() != Role::System);

        if has_turns && self.graph.summary().is_none() {
            let summary = cancel
                .run_until_cancelled(summarizer.summarize(&self.graph.active_path()))
                .await;
            match summary {
                Some(Ok(summary)) => self.graph.set_summary(summary),
                Some(Err(e)) => warn!(error = %e, "could not summarize session"),
                None => render::notice("(summary skipped)"),
            }
        }

        self.store.save(&self.name, &self.graph.snapshot())?;
        info!(session = %self.name, nodes = self.graph.len(), "session saved");

        println!("Session: {}", self.name);
        println!("To continue: aski --session {}", self.name);
        Ok(())
    }
}
