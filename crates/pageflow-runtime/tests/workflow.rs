mod common;

use common::*;
use pageflow_core::{
    EventBus, ExecutionEvent, ProxySettings, WorkflowDefinition, WorkflowError, WorkflowState,
};
use pageflow_runtime::Workflow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::timeout;

fn build(def: &WorkflowDefinition) -> Workflow {
    Workflow::build("test", def, None).expect("valid definition")
}

fn started_nodes(rx: &mut broadcast::Receiver<ExecutionEvent>) -> Vec<String> {
    let mut ids = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let ExecutionEvent::NodeStarted { node_id, .. } = event {
            ids.push(node_id);
        }
    }
    ids
}

#[test]
fn build_rejects_empty_definition() {
    let err = Workflow::build("empty", &WorkflowDefinition::new(), None).unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidDefinition(_)));
}

#[test]
fn build_requires_a_start_node() {
    let def = graph(vec![node("a", "goto"), node("b", "stop")], &[("a", "out", "b")]);
    let err = Workflow::build("no-start", &def, None).unwrap_err();
    assert!(err.to_string().contains("start node"));
}

#[test]
fn build_rejects_two_start_nodes() {
    let def = graph(vec![node("s1", "start"), node("s2", "start")], &[]);
    let err = Workflow::build("two-starts", &def, None).unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidDefinition(_)));
    assert!(err.to_string().contains("only have one start node"));
}

#[test]
fn build_ignores_connections_from_unknown_nodes() {
    let def = graph(
        vec![node("start", "start"), node("stop", "stop")],
        &[("ghost", "out", "stop"), ("start", "out", "stop")],
    );
    let wf = build(&def);
    assert_eq!(wf.nodes().len(), 2);
    assert_eq!(wf.start_node_id(), "start");
    assert_eq!(wf.state(), WorkflowState::Pending);
    assert!(wf.can_run());
    assert!(wf.analyze().is_clean());
}

#[test]
fn build_accepts_unknown_node_types() {
    let def = graph(
        vec![node("start", "start"), node("t", "teleport")],
        &[("start", "out", "t")],
    );
    let wf = build(&def);
    assert!(wf.node("t").is_some_and(|n| n.node_type().is_none()));
}

#[tokio::test]
async fn successful_run_completes() {
    init_tracing();
    let browser = MockBrowser::new();
    let registry = registry();
    let mut wf = build(&visit("https://example.com"));

    assert!(wf.run(browser.as_ref(), &registry).await);

    assert_eq!(wf.state(), WorkflowState::Completed);
    assert!(!wf.can_run());
    assert_eq!(browser.log(), vec!["goto:https://example.com"]);
    assert!(wf.nodes().values().all(|n| n.executed()));
    assert!(wf.last_run_at().is_some());
    assert!(wf.last_execution_duration_ms().is_some());
    assert!(wf.last_error_message().is_none());
    assert_eq!(browser.opened(), 1);
    assert_eq!(browser.closed(), 1);
}

#[tokio::test]
async fn completed_workflow_does_not_run_again() {
    let browser = MockBrowser::new();
    let registry = registry();
    let mut wf = build(&visit("https://example.com"));

    assert!(wf.run(browser.as_ref(), &registry).await);
    assert!(!wf.run(browser.as_ref(), &registry).await);

    assert_eq!(wf.state(), WorkflowState::Completed);
    assert_eq!(browser.opened(), 1);
}

#[tokio::test]
async fn failed_node_marks_workflow_failed_and_retryable() {
    let browser = MockBrowser::new();
    let registry = registry();
    let mut wf = build(&visit("fail://down"));

    assert!(!wf.run(browser.as_ref(), &registry).await);
    assert_eq!(wf.state(), WorkflowState::Failed);
    assert!(wf.can_run());
    assert!(wf.last_error_message().is_some_and(|m| m.contains("fail://down")));

    // Failed may be retried; the same failure keeps it Failed
    assert!(!wf.run(browser.as_ref(), &registry).await);
    assert_eq!(wf.state(), WorkflowState::Failed);
    assert_eq!(browser.opened(), 2);
    assert_eq!(browser.closed(), 2);
}

#[tokio::test]
async fn missing_parameter_fails_the_run() {
    let browser = MockBrowser::new();
    let registry = registry();
    let def = graph(
        vec![node("start", "start"), node("open", "goto"), node("stop", "stop")],
        &[("start", "out", "open"), ("open", "out", "stop")],
    );
    let mut wf = build(&def);

    assert!(!wf.run(browser.as_ref(), &registry).await);
    let message = wf.last_error_message().unwrap_or_default();
    assert!(message.contains("requires parameter 'url'"), "{message}");
    assert!(browser.log().is_empty());
}

#[tokio::test]
async fn unknown_node_type_fails_at_run_time() {
    let browser = MockBrowser::new();
    let registry = registry();
    let def = graph(
        vec![node("start", "start"), node("t", "teleport")],
        &[("start", "out", "t")],
    );
    let mut wf = build(&def);

    assert!(!wf.run(browser.as_ref(), &registry).await);
    assert!(wf
        .last_error_message()
        .is_some_and(|m| m.contains("Unknown node type: teleport")));
}

#[tokio::test]
async fn dangling_next_node_fails_the_run() {
    let browser = MockBrowser::new();
    let registry = registry();
    let def = graph(vec![node("start", "start")], &[("start", "out", "ghost")]);
    let mut wf = build(&def);

    assert!(!wf.analyze().dangling.is_empty());
    assert!(!wf.run(browser.as_ref(), &registry).await);
    assert!(wf
        .last_error_message()
        .is_some_and(|m| m.contains("Next node not found: ghost")));
    assert_eq!(browser.closed(), 1);
}

#[tokio::test]
async fn run_without_stop_node_finishes_when_no_next() {
    let browser = MockBrowser::new();
    let registry = registry();
    let def = graph(
        vec![
            node("start", "start"),
            node("open", "goto").with_param("url", "https://a.test"),
        ],
        &[("start", "out", "open")],
    );
    let mut wf = build(&def);

    assert!(wf.run(browser.as_ref(), &registry).await);
    assert_eq!(wf.state(), WorkflowState::Completed);
}

#[tokio::test]
async fn stop_node_ends_traversal() {
    let browser = MockBrowser::new();
    let registry = registry();
    let def = graph(
        vec![
            node("start", "start"),
            node("stop", "stop"),
            node("after", "click").with_param("selector", "#never"),
        ],
        &[("start", "out", "stop"), ("stop", "out", "after")],
    );
    let mut wf = build(&def);

    assert!(wf.run(browser.as_ref(), &registry).await);
    assert!(browser.log().is_empty());
    assert!(!wf.node("after").unwrap().executed());
}

#[tokio::test]
async fn revisiting_a_node_stops_without_error() {
    let browser = MockBrowser::new();
    let registry = registry();
    let def = graph(
        vec![
            node("start", "start"),
            node("a", "click").with_param("selector", "#btn"),
        ],
        &[("start", "out", "a"), ("a", "out", "a")],
    );
    let mut wf = build(&def);
    assert!(wf.analyze().has_cycles);

    assert!(wf.run(browser.as_ref(), &registry).await);
    assert_eq!(browser.log(), vec!["click:#btn"]);
    assert_eq!(wf.state(), WorkflowState::Completed);
}

#[tokio::test]
async fn for_each_may_be_revisited() {
    let browser = MockBrowser::new();
    let registry = registry();
    let bus = Arc::new(EventBus::default());
    let mut rx = bus.subscribe();
    let def = graph(
        vec![
            node("start", "start"),
            node("loop", "forEach"),
            node("item", "click").with_param("selector", ".item"),
        ],
        &[
            ("start", "out", "loop"),
            ("loop", "next", "item"),
            ("item", "out", "loop"),
        ],
    );
    let mut wf = build(&def).with_event_bus(bus);

    assert!(wf.run(browser.as_ref(), &registry).await);
    assert_eq!(started_nodes(&mut rx), vec!["start", "loop", "item", "loop"]);
    assert_eq!(browser.log(), vec!["click:.item"]);
}

#[tokio::test]
async fn if_node_follows_then_port() {
    let browser = MockBrowser::new();
    let registry = registry();
    let def = graph(
        vec![
            node("start", "start"),
            node("check", "if"),
            node("yes", "click").with_param("selector", "#yes"),
            node("no", "click").with_param("selector", "#no"),
        ],
        &[
            ("start", "out", "check"),
            ("check", "out", "no"),
            ("check", "then", "yes"),
        ],
    );
    let mut wf = build(&def);

    assert!(wf.run(browser.as_ref(), &registry).await);
    assert_eq!(browser.log(), vec!["click:#yes"]);
}

#[tokio::test]
async fn traversal_order_is_deterministic() {
    let browser = MockBrowser::new();
    let registry = registry();
    let bus = Arc::new(EventBus::default());
    let mut rx = bus.subscribe();
    let def = graph(
        vec![
            node("start", "start"),
            node("a", "click").with_param("selector", "#a"),
            node("b", "click").with_param("selector", "#b"),
            node("c", "click").with_param("selector", "#c"),
        ],
        &[
            ("start", "out_bottom", "c"),
            ("start", "out_right", "b"),
            ("b", "out", "a"),
        ],
    );
    let mut wf = build(&def).with_event_bus(bus);

    assert!(wf.run(browser.as_ref(), &registry).await);
    let first = started_nodes(&mut rx);
    wf.reset();
    assert!(wf.run(browser.as_ref(), &registry).await);
    let second = started_nodes(&mut rx);

    assert_eq!(first, vec!["start", "b", "a"]);
    assert_eq!(first, second);
}

#[tokio::test]
async fn reset_restores_pending_and_is_idempotent() {
    let browser = MockBrowser::new();
    let registry = registry();
    let def = graph(
        vec![
            node("start", "start"),
            node("title", "extractText")
                .with_param("selector", "h1")
                .with_param("variableName", "title"),
            node("open", "goto").with_param("url", "fail://later"),
        ],
        &[("start", "out", "title"), ("title", "out", "open")],
    );
    let mut wf = build(&def);

    assert!(!wf.run(browser.as_ref(), &registry).await);
    assert_eq!(
        wf.context().get("title").and_then(|v| v.as_str()),
        Some("text of h1")
    );

    wf.reset();
    let once = wf.status();
    wf.reset();
    let twice = wf.status();

    assert_eq!(wf.state(), WorkflowState::Pending);
    assert!(wf.context().is_empty());
    assert!(wf.last_error_message().is_none());
    assert!(wf.nodes().values().all(|n| !n.executed()));
    assert_eq!(once, twice);
}

#[tokio::test]
async fn proxy_user_agent_is_sent_as_header() {
    let browser = MockBrowser::new();
    let registry = registry();
    let proxy = ProxySettings::new("http://proxy:8080")
        .with_credentials("user", "secret")
        .with_user_agent("pageflow-bot/1.0");
    let mut wf = Workflow::build("proxied", &visit("https://a.test"), Some(proxy)).unwrap();

    assert!(wf.status().has_proxy);
    assert!(wf.run(browser.as_ref(), &registry).await);

    assert_eq!(
        browser.log(),
        vec!["headers:User-Agent=pageflow-bot/1.0", "goto:https://a.test"]
    );
    let sessions = browser.sessions.lock().unwrap();
    assert_eq!(
        sessions[0].proxy.as_ref().map(|p| p.server.as_str()),
        Some("http://proxy:8080")
    );
}

#[tokio::test]
async fn browser_launch_failure_fails_the_run() {
    let browser = MockBrowser::failing();
    let registry = registry();
    let mut wf = build(&visit("https://a.test"));

    assert!(!wf.run(browser.as_ref(), &registry).await);
    assert_eq!(wf.state(), WorkflowState::Failed);
    assert!(wf
        .last_error_message()
        .is_some_and(|m| m.contains("no browser installed")));
}

#[tokio::test]
async fn status_updates_are_published() {
    let browser = MockBrowser::new();
    let registry = registry();
    let def = graph(
        vec![
            node("start", "start"),
            node("title", "extractText").with_param("selector", "h1"),
        ],
        &[("start", "out", "title")],
    );
    let mut wf = build(&def);
    let rx = wf.subscribe();
    assert_eq!(rx.borrow().state, WorkflowState::Pending);

    assert!(wf.run(browser.as_ref(), &registry).await);

    let status = rx.borrow().clone();
    assert_eq!(status.state, WorkflowState::Completed);
    assert_eq!(status.context_keys, vec!["extracted_text"]);
    assert_eq!(status.context_size, 1);
    assert!(status.current_node.is_none());
    assert_eq!(status, wf.status());
}

#[tokio::test]
async fn current_node_is_published_while_it_executes() {
    let browser = MockBrowser::new();
    let registry = registry();
    let mut wf = build(&slow(300));
    let mut rx = wf.subscribe();

    let run = tokio::spawn(async move { wf.run(browser.as_ref(), &registry).await });

    let status = timeout(
        Duration::from_secs(5),
        rx.wait_for(|s| s.current_node.as_deref() == Some("pause")),
    )
    .await
    .expect("pause never published")
    .expect("status channel open")
    .clone();
    assert_eq!(status.state, WorkflowState::Running);
    assert!(!run.is_finished());

    assert!(run.await.unwrap());
    assert!(rx.borrow().current_node.is_none());
}

#[tokio::test]
async fn panicking_node_fails_the_run_and_closes_the_session() {
    let browser = MockBrowser::new();
    let registry = registry();
    let def = graph(
        vec![
            node("start", "start"),
            node("explode", "fill").with_param("panic", true),
        ],
        &[("start", "out", "explode")],
    );
    let mut wf = build(&def);

    assert!(!wf.run(browser.as_ref(), &registry).await);

    assert_eq!(wf.state(), WorkflowState::Failed);
    assert!(wf.can_run());
    let message = wf.last_error_message().expect("error recorded");
    assert!(message.contains("strategy blew up"), "{message}");
    assert_eq!(browser.opened(), 1);
    assert_eq!(browser.closed(), 1);
    assert!(wf.status().current_node.is_none());
}

#[tokio::test]
async fn lifecycle_events_are_emitted() {
    let browser = MockBrowser::new();
    let registry = registry();
    let bus = Arc::new(EventBus::default());
    let mut rx = bus.subscribe();
    let mut wf = build(&visit("fail://x")).with_event_bus(bus);

    assert!(!wf.run(browser.as_ref(), &registry).await);

    let mut states = Vec::new();
    let mut completed = None;
    let mut failed_node = None;
    while let Ok(event) = rx.try_recv() {
        match event {
            ExecutionEvent::StateChanged { state, .. } => states.push(state),
            ExecutionEvent::WorkflowCompleted { success, error, .. } => completed = Some((success, error)),
            ExecutionEvent::NodeFailed { node_id, .. } => failed_node = Some(node_id),
            _ => {}
        }
    }

    assert_eq!(states, vec![WorkflowState::Running, WorkflowState::Failed]);
    assert_eq!(failed_node.as_deref(), Some("open"));
    let (success, error) = completed.expect("completion event");
    assert!(!success);
    assert!(error.is_some());
}
