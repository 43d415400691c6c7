//! 流水线集成测试：阶段顺序、流式与非流式等价、失败中止

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use pricer::core::PipelineError;
use pricer::llm::TextStream;
use pricer::pipeline::{Orchestrator, PipelinePlan, StageTool, StreamEvent};
use pricer::session::{InMemorySession, Role, SessionStore, Turn};

/// 记录调用次数与输入的桩阶段
struct StubStage {
    name: &'static str,
    output: Result<&'static str, &'static str>,
    calls: AtomicUsize,
    inputs: Mutex<Vec<String>>,
}

impl StubStage {
    fn ok(name: &'static str, output: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            output: Ok(output),
            calls: AtomicUsize::new(0),
            inputs: Mutex::new(Vec::new()),
        })
    }

    fn failing(name: &'static str, cause: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            output: Err(cause),
            calls: AtomicUsize::new(0),
            inputs: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn last_input(&self) -> String {
        self.inputs.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl StageTool for StubStage {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        "stub stage"
    }

    async fn invoke(&self, input: &str, _context: &[Turn]) -> Result<String, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inputs.lock().unwrap().push(input.to_string());
        self.output.map(String::from).map_err(String::from)
    }

    /// 按空格切成多个片段
    async fn invoke_stream(&self, input: &str, context: &[Turn]) -> Result<TextStream, String> {
        let output = self.invoke(input, context).await?;
        let fragments: Vec<Result<String, String>> =
            output.split_inclusive(' ').map(|s| Ok(s.to_string())).collect();
        Ok(Box::pin(stream::iter(fragments)))
    }
}

fn plan_of(b: &Arc<StubStage>, p: &Arc<StubStage>, r: &Arc<StubStage>) -> PipelinePlan {
    PipelinePlan::pricing(b.clone(), p.clone(), r.clone()).unwrap()
}

async fn collect(
    orchestrator: &Orchestrator,
    input: &str,
    session: &dyn SessionStore,
) -> Vec<Result<StreamEvent, PipelineError>> {
    orchestrator.run_streamed(input, session).collect().await
}

#[tokio::test]
async fn test_stage_inputs_follow_plan_order() {
    let b = StubStage::ok("b", "B-out");
    let p = StubStage::ok("p", "P-out");
    let r = StubStage::ok("r", "R-out");
    let orchestrator = Orchestrator::new(plan_of(&b, &p, &r));
    let session = InMemorySession::new();

    let out = orchestrator.run("question", &session).await.unwrap();
    assert_eq!(out, "R-out");
    assert_eq!((b.calls(), p.calls(), r.calls()), (1, 1, 1));

    assert_eq!(b.last_input(), "question");
    let p_input = p.last_input();
    assert!(p_input.starts_with("question"));
    assert!(p_input.contains("B-out"));
    let r_input = r.last_input();
    let (ib, ip) = (r_input.find("B-out").unwrap(), r_input.find("P-out").unwrap());
    assert!(r_input.starts_with("question") && ib < ip);
}

#[tokio::test]
async fn test_streamed_text_equals_non_streamed_result() {
    let b = StubStage::ok("b", "B-out");
    let p = StubStage::ok("p", "P-out");
    let r = StubStage::ok("r", "Tiered pricing wins for this product");
    let orchestrator = Orchestrator::new(plan_of(&b, &p, &r));

    let once = orchestrator.run("q", &InMemorySession::new()).await.unwrap();
    let events = collect(&orchestrator, "q", &InMemorySession::new()).await;
    let streamed: String = events
        .iter()
        .filter_map(|e| match e {
            Ok(StreamEvent::TextDelta { text }) => Some(text.as_str()),
            _ => None,
        })
        .collect();

    assert_eq!(streamed, once);
    let deltas = events.iter().filter(|e| matches!(e, Ok(ev) if ev.is_text())).count();
    assert!(deltas > 1);
}

#[tokio::test]
async fn test_failure_aborts_downstream_and_commits_nothing() {
    let b = StubStage::ok("b", "B-out");
    let p = StubStage::failing("p", "quota exceeded");
    let r = StubStage::ok("r", "R-out");
    let orchestrator = Orchestrator::new(plan_of(&b, &p, &r));
    let session = InMemorySession::new();

    let err = orchestrator.run("q", &session).await.unwrap_err();
    assert_eq!(err.failed_stage(), Some("p"));
    assert!(err.to_string().contains("quota exceeded"));
    assert_eq!(r.calls(), 0);
    assert!(session.get_items(None).await.unwrap().is_empty());

    // 流式：错误作为最后一项，之后没有事件
    let events = collect(&orchestrator, "q", &session).await;
    assert!(matches!(events.last(), Some(Err(e)) if e.failed_stage() == Some("p")));
    assert_eq!(events.iter().filter(|e| e.is_err()).count(), 1);
    assert!(!events
        .iter()
        .any(|e| matches!(e, Ok(StreamEvent::ToolInvoked { name }) if name == "r")));
    assert_eq!(r.calls(), 0);
    assert!(session.get_items(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_behavior_failure_skips_remaining_stages() {
    let b = StubStage::failing("b", "connection refused");
    let p = StubStage::ok("p", "P-out");
    let r = StubStage::ok("r", "R-out");
    let orchestrator = Orchestrator::new(plan_of(&b, &p, &r));
    let session = InMemorySession::new();

    let err = orchestrator.run("q", &session).await.unwrap_err();
    assert_eq!(err.failed_stage(), Some("b"));
    assert_eq!((b.calls(), p.calls(), r.calls()), (1, 0, 0));

    let events = collect(&orchestrator, "q", &session).await;
    assert!(matches!(events.last(), Some(Err(e)) if e.failed_stage() == Some("b")));
    let invoked: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            Ok(StreamEvent::ToolInvoked { name }) => Some(name.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(invoked, vec!["b"]);
    assert_eq!((b.calls(), p.calls(), r.calls()), (2, 0, 0));

    let items = session.get_items(None).await.unwrap();
    assert!(!items.iter().any(|t| t.role == Role::Assistant));
    assert!(items.is_empty());
}

#[tokio::test]
async fn test_streamed_end_to_end_event_shape() {
    let b = StubStage::ok("b", "B-out");
    let p = StubStage::ok("p", "P-out");
    let r = StubStage::ok("r", "R-out");
    let orchestrator = Orchestrator::new(plan_of(&b, &p, &r));
    let session = InMemorySession::new();

    let events: Vec<StreamEvent> = collect(&orchestrator, "Freemium vs Tiered for a chatbot SaaS", &session)
        .await
        .into_iter()
        .map(|e| e.unwrap())
        .collect();

    let tools: Vec<(String, &str)> = events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::ToolInvoked { name } => Some((name.clone(), "invoked")),
            StreamEvent::ToolCompleted { name, .. } => Some((name.clone(), "completed")),
            _ => None,
        })
        .collect();
    assert_eq!(
        tools,
        vec![
            ("b".to_string(), "invoked"),
            ("b".to_string(), "completed"),
            ("p".to_string(), "invoked"),
            ("p".to_string(), "completed"),
            ("r".to_string(), "invoked"),
            ("r".to_string(), "completed"),
        ]
    );

    // 每个 ToolInvoked 前都有 StageChanged
    for (i, e) in events.iter().enumerate() {
        if matches!(e, StreamEvent::ToolInvoked { .. }) {
            assert!(matches!(events[i - 1], StreamEvent::StageChanged { .. }));
        }
    }

    let text: String = events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::TextDelta { text } => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(text, "R-out");

    let items = session.get_items(None).await.unwrap();
    assert_eq!(items.first().map(|t| t.role), Some(Role::User));
    assert_eq!(items.first().map(|t| t.content.as_str()), Some("Freemium vs Tiered for a chatbot SaaS"));
    let assistants: Vec<&Turn> = items.iter().filter(|t| t.role == Role::Assistant).collect();
    assert_eq!(assistants.len(), 1);
    assert_eq!(assistants[0].content, "R-out");
}

#[tokio::test]
async fn test_dropped_stream_stops_pipeline() {
    let b = StubStage::ok("b", "B-out");
    let p = StubStage::ok("p", "P-out");
    let r = StubStage::ok("r", "R-out");
    let orchestrator = Orchestrator::new(plan_of(&b, &p, &r));
    let session = InMemorySession::new();

    {
        let mut events = orchestrator.run_streamed("q", &session);
        // 只拉取第一个阶段的 StageChanged 与 ToolInvoked
        let _ = events.next().await;
        let _ = events.next().await;
    }

    assert_eq!(b.calls(), 0);
    assert_eq!(p.calls(), 0);
    assert!(session.get_items(None).await.unwrap().is_empty());
}
