//! End-to-end behaviour of the history graph, the aggregator and the dispatcher.

use std::convert::Infallible;
use std::sync::Mutex;

use aski_core::command::{self, Command, CommandError, CommandTable, Outcome};
use aski_core::{
    CancellationToken, ConversationGraph, DeltaStream, Edited, Editor, ExchangeError,
    FailurePolicy, HistoryError, MessageNode, RequestParams, Role, StreamAggregator,
    StreamOutcome, StreamState, Summarizer, Transport, TransportError, TurnCommitter,
};
use futures::stream::{self, StreamExt};

/// Replies with a fixed script of deltas and records what it was sent.
struct ScriptedTransport {
    script: Mutex<Vec<Vec<Result<String, TransportError>>>>,
    seen: Mutex<Vec<Vec<String>>>,
}

impl ScriptedTransport {
    fn new(replies: Vec<Vec<Result<String, TransportError>>>) -> Self {
        Self {
            script: Mutex::new(replies),
            seen: Mutex::new(Vec::new()),
        }
    }

    fn replying(text: &[&str]) -> Self {
        Self::new(vec![text.iter().map(|t| Ok(t.to_string())).collect()])
    }
}

impl Transport for ScriptedTransport {
    async fn submit(
        &self,
        path: &[&MessageNode],
        _params: &RequestParams,
    ) -> Result<DeltaStream, TransportError> {
        self.seen
            .lock()
            .unwrap()
            .push(path.iter().map(|n| n.content().to_string()).collect());
        let mut script = self.script.lock().unwrap();
        if script.is_empty() {
            return Err(TransportError::new("no scripted reply"));
        }
        Ok(stream::iter(script.remove(0)).boxed())
    }
}

struct FixedSummary(&'static str, Mutex<usize>);

impl Summarizer for FixedSummary {
    async fn summarize(&self, _path: &[&MessageNode]) -> Result<String, TransportError> {
        *self.1.lock().unwrap() += 1;
        Ok(self.0.to_string())
    }
}

struct FixedEditor(Edited);

impl Editor for FixedEditor {
    type Error = Infallible;

    fn edit(&self, _path: &[&MessageNode]) -> Result<Edited, Self::Error> {
        Ok(self.0.clone())
    }
}

fn contents(graph: &ConversationGraph) -> Vec<String> {
    graph
        .active_path()
        .iter()
        .map(|n| n.content().to_string())
        .collect()
}

/// Yields the given chunks, then cancels the token and never ends.
fn chunks_then_cancel(chunks: &[&str], cancel: CancellationToken) -> DeltaStream {
    let head = stream::iter(
        chunks
            .iter()
            .map(|c| Ok(c.to_string()))
            .collect::<Vec<Result<String, TransportError>>>(),
    );
    let tail = stream::once(async move { cancel.cancel() })
        .filter_map(|_| async { None::<Result<String, TransportError>> })
        .chain(stream::pending());
    head.chain(tail).boxed()
}

#[test]
fn appends_without_moves_form_the_active_path() {
    let mut graph = ConversationGraph::new();
    let texts = ["sys", "q1", "a1", "q2", "a2"];
    let roles = [
        Role::System,
        Role::User,
        Role::Assistant,
        Role::User,
        Role::Assistant,
    ];
    for (role, text) in roles.iter().zip(texts) {
        graph.append_turn(*role, text).unwrap();
    }

    assert_eq!(contents(&graph), texts);
    let path = graph.active_path();
    assert!(path[0].is_root());
    for pair in path.windows(2) {
        assert_eq!(pair[1].parent(), Some(pair[0].hash()));
    }
}

#[test]
fn change_head_reparents_next_append() {
    let mut graph = ConversationGraph::new();
    let root = graph.append_turn(Role::System, "sys").unwrap().hash();
    graph.append_turn(Role::User, "first").unwrap();

    graph.change_head(&root.short()).unwrap();
    let next = graph.append_turn(Role::User, "second").unwrap().clone();

    assert_eq!(next.parent(), Some(root));
    assert_eq!(contents(&graph), ["sys", "second"]);
}

#[test]
fn ambiguous_prefix_leaves_head_unchanged() {
    let mut graph = ConversationGraph::new();
    let root = graph.append_turn(Role::System, "sys").unwrap().hash();

    // Seventeen siblings guarantee two share a first hex digit.
    let mut shared = None;
    let mut firsts = Vec::new();
    for i in 0..17 {
        graph.change_head(&root.to_string()).unwrap();
        let hash = graph.append_turn(Role::User, format!("q{i}")).unwrap().hash();
        let first = hash.to_string()[..1].to_string();
        if firsts.contains(&first) {
            shared = Some(first);
            break;
        }
        firsts.push(first);
    }
    let shared = shared.unwrap();
    // The root may share the digit too; either way it is ambiguous.
    let head = graph.head();

    let err = graph.change_head(&shared).unwrap_err();

    assert!(matches!(err, HistoryError::AmbiguousPrefix { .. }));
    assert_eq!(graph.head(), head);
}

#[test]
fn identical_append_onto_same_head_is_idempotent() {
    let mut graph = ConversationGraph::new();
    let root = graph.append_turn(Role::System, "sys").unwrap().hash();
    let first = graph.append_turn(Role::User, "same").unwrap().hash();
    let len = graph.len();

    graph.change_head(&root.to_string()).unwrap();
    let second = graph.append_turn(Role::User, "same").unwrap().hash();

    assert_eq!(first, second);
    assert_eq!(graph.len(), len);
    assert_eq!(graph.head(), Some(first));
}

#[test]
fn branches_stay_isolated_and_reachable() {
    let mut graph = ConversationGraph::new();
    let a = graph.append_turn(Role::User, "A").unwrap().hash();
    let b = graph.append_turn(Role::Assistant, "B").unwrap().hash();

    graph.change_head(&a.to_string()).unwrap();
    let c = graph.append_turn(Role::Assistant, "C").unwrap().hash();

    assert_eq!(graph.get(&b).unwrap().parent(), Some(a));
    assert_eq!(graph.get(&c).unwrap().parent(), Some(a));
    assert_eq!(contents(&graph), ["A", "C"]);

    graph.change_head(&b.to_string()).unwrap();
    assert_eq!(contents(&graph), ["A", "B"]);
}

#[tokio::test]
async fn aggregator_joins_chunks_on_completion() {
    let transport = ScriptedTransport::replying(&["Hel", "lo"]);
    let mut echo = Vec::new();
    let cancel = CancellationToken::new();
    let node = MessageNode::new(Role::User, "greet me", None);

    let outcome = StreamAggregator::new(&mut echo)
        .run(&transport, &[&node], &RequestParams::default(), &cancel)
        .await;

    assert_eq!(outcome.state(), StreamState::Completed);
    assert_eq!(outcome.content(), "Hello");
    assert_eq!(String::from_utf8(echo).unwrap(), "Hello");
}

#[tokio::test]
async fn aggregator_keeps_partial_output_on_cancel() {
    let cancel = CancellationToken::new();
    let deltas = chunks_then_cancel(&["Hel"], cancel.clone());

    let outcome = StreamAggregator::new(std::io::sink())
        .drive(deltas, &cancel)
        .await;

    assert!(matches!(outcome, StreamOutcome::Cancelled(ref s) if s == "Hel"));
    assert_ne!(outcome.state(), StreamState::Failed);
}

#[tokio::test]
async fn exchange_commits_user_and_reply() {
    let transport = ScriptedTransport::replying(&["Hel", "lo"]);
    let mut graph = ConversationGraph::new();
    graph.append_turn(Role::System, "sys").unwrap();
    let cancel = CancellationToken::new();

    let exchange = TurnCommitter::new(&mut graph, FailurePolicy::Discard)
        .exchange("hi", &transport, &RequestParams::default(), &cancel, std::io::sink())
        .await
        .unwrap();

    assert_eq!(exchange.state, StreamState::Completed);
    assert_eq!(graph.head(), exchange.reply);
    assert_eq!(contents(&graph), ["sys", "hi", "Hello"]);
    assert_eq!(transport.seen.lock().unwrap()[0], ["sys", "hi"]);
}

#[tokio::test]
async fn cancelled_exchange_commits_partial_reply() {
    let cancel = CancellationToken::new();
    struct CancellingTransport(CancellationToken);
    impl Transport for CancellingTransport {
        async fn submit(
            &self,
            _path: &[&MessageNode],
            _params: &RequestParams,
        ) -> Result<DeltaStream, TransportError> {
            Ok(chunks_then_cancel(&["Hel"], self.0.clone()))
        }
    }

    let mut graph = ConversationGraph::new();
    let exchange = TurnCommitter::new(&mut graph, FailurePolicy::Discard)
        .exchange(
            "hi",
            &CancellingTransport(cancel.clone()),
            &RequestParams::default(),
            &cancel,
            std::io::sink(),
        )
        .await
        .unwrap();

    assert_eq!(exchange.state, StreamState::Cancelled);
    assert!(exchange.reply.is_some());
    assert_eq!(contents(&graph), ["hi", "Hel"]);
}

#[tokio::test]
async fn failed_exchange_restores_head_and_allows_resubmit() {
    let transport = ScriptedTransport::new(vec![
        vec![Ok("par".into()), Err(TransportError::new("reset"))],
        vec![Ok("ok".into())],
    ]);
    let mut graph = ConversationGraph::new();
    let root = graph.append_turn(Role::System, "sys").unwrap().hash();
    let cancel = CancellationToken::new();
    let params = RequestParams::default();

    let err = TurnCommitter::new(&mut graph, FailurePolicy::Discard)
        .exchange("hi", &transport, &params, &cancel, std::io::sink())
        .await
        .unwrap_err();
    assert!(matches!(err, ExchangeError::Transport(_)));
    assert_eq!(graph.head(), Some(root));
    let after_failure = graph.len();

    let exchange = TurnCommitter::new(&mut graph, FailurePolicy::Discard)
        .exchange("hi", &transport, &params, &cancel, std::io::sink())
        .await
        .unwrap();

    // The user node from the failed attempt is reused.
    assert_eq!(graph.len(), after_failure + 1);
    assert_eq!(graph.get(&exchange.user).unwrap().parent(), Some(root));
    assert_eq!(contents(&graph), ["sys", "hi", "ok"]);
}

/// Never answers the request.
struct PendingTransport;

impl Transport for PendingTransport {
    async fn submit(
        &self,
        _path: &[&MessageNode],
        _params: &RequestParams,
    ) -> Result<DeltaStream, TransportError> {
        std::future::pending().await
    }
}

#[tokio::test]
async fn cancel_while_requesting_commits_nothing() {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move { trigger.cancel() });

    let node = MessageNode::new(Role::User, "hi", None);
    let outcome = StreamAggregator::new(std::io::sink())
        .run(&PendingTransport, &[&node], &RequestParams::default(), &cancel)
        .await;
    assert!(matches!(outcome, StreamOutcome::Cancelled(ref s) if s.is_empty()));

    let mut graph = ConversationGraph::new();
    graph.append_turn(Role::System, "sys").unwrap();
    let exchange = TurnCommitter::new(&mut graph, FailurePolicy::Discard)
        .exchange("hi", &PendingTransport, &RequestParams::default(), &cancel, std::io::sink())
        .await
        .unwrap();

    assert_eq!(exchange.state, StreamState::Cancelled);
    assert_eq!(exchange.reply, None);
    assert_eq!(graph.head(), Some(exchange.user));
    assert_eq!(contents(&graph), ["sys", "hi"]);
}

#[tokio::test]
async fn rejected_request_restores_head() {
    let transport = ScriptedTransport::new(vec![]);
    let mut graph = ConversationGraph::new();
    let root = graph.append_turn(Role::System, "sys").unwrap().hash();

    let err = TurnCommitter::new(&mut graph, FailurePolicy::Discard)
        .exchange(
            "hi",
            &transport,
            &RequestParams::default(),
            &CancellationToken::new(),
            std::io::sink(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ExchangeError::Transport(_)));
    assert_eq!(graph.head(), Some(root));
    // Only the user node was stored; no assistant turn exists.
    assert_eq!(graph.len(), 2);
    assert!(
        graph
            .store()
            .iter()
            .all(|n| n.role() != Role::Assistant)
    );
}

#[tokio::test]
async fn dispatch_move_and_history() {
    let mut graph = ConversationGraph::new();
    let a = graph.append_turn(Role::User, "A").unwrap().hash();
    graph.append_turn(Role::Assistant, "B").unwrap();
    let table = CommandTable::default();
    let summarizer = FixedSummary("unused", Mutex::new(0));
    let editor = FixedEditor(Edited::unchanged());

    let command = table.parse(&format!(":mo {}", a.short())).unwrap();
    let outcome = command::dispatch(command, &mut graph, &summarizer, &editor)
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Moved(a));
    assert_eq!(graph.head(), Some(a));

    let outcome = command::dispatch(Command::History, &mut graph, &summarizer, &editor)
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::History);
}

#[tokio::test]
async fn dispatch_move_without_argument_is_empty_input() {
    let mut graph = ConversationGraph::new();
    graph.append_turn(Role::User, "A").unwrap();
    let command = CommandTable::default().parse(":move").unwrap();

    let err = command::dispatch(
        command,
        &mut graph,
        &FixedSummary("", Mutex::new(0)),
        &FixedEditor(Edited::unchanged()),
    )
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        CommandError::History(HistoryError::EmptyInput(_))
    ));
}

#[tokio::test]
async fn dispatch_summary_is_cached() {
    let mut graph = ConversationGraph::new();
    graph.append_turn(Role::User, "A").unwrap();
    let summarizer = FixedSummary("Greeting", Mutex::new(0));
    let editor = FixedEditor(Edited::unchanged());

    for _ in 0..2 {
        let outcome = command::dispatch(Command::Summary, &mut graph, &summarizer, &editor)
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Summary("Greeting".into()));
    }

    assert_eq!(*summarizer.1.lock().unwrap(), 1);
    assert_eq!(graph.summary(), Some("Greeting"));
}

#[tokio::test]
async fn dispatch_editor_submits_only_non_blank_edits() {
    let mut graph = ConversationGraph::new();
    let summarizer = FixedSummary("", Mutex::new(0));

    let edited = FixedEditor(Edited {
        text: "rewritten question\n".into(),
        modified: true,
    });
    let outcome = command::dispatch(Command::Editor, &mut graph, &summarizer, &edited)
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Submit("rewritten question\n".into()));

    let blank = FixedEditor(Edited {
        text: "  \n".into(),
        modified: true,
    });
    let outcome = command::dispatch(Command::Editor, &mut graph, &summarizer, &blank)
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Unchanged);
}
