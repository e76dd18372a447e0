//! End-to-end behaviour of one batch: submit, poll, fetch, reconcile.

use std::sync::Arc;
use std::time::{Duration, Instant};

use answer_engine::providers::{BrightDataApi, ChatGptAdapter};
use answer_engine::testing::{
    answer_entry, building_reply, error_entry, fast_settings, progress_reply, trigger_reply,
    MemorySink, Scripted, ScriptedTransport,
};
use answer_engine::{
    BatchError, BatchOrchestrator, Diagnostic, ErrorCategory, Locale, Method, PipelineSettings,
    ProviderRegistry, ResilientInvoker, SecretString, SharedParams, TransportError,
    FAILED_ANSWER_TEXT,
};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

fn orchestrator_with(transport: &ScriptedTransport, settings: PipelineSettings) -> BatchOrchestrator {
    let api = Arc::new(BrightDataApi::new(SecretString::new("bd-key")).with_base_url("http://bd.test"));
    let mut registry = ProviderRegistry::new();
    registry.register_job("chatgpt", Arc::new(ChatGptAdapter::new(api.clone(), "gd_chatgpt")), api);
    BatchOrchestrator::new(registry, ResilientInvoker::new(Arc::new(transport.clone())), settings)
}

fn orchestrator(transport: &ScriptedTransport) -> BatchOrchestrator {
    orchestrator_with(transport, fast_settings())
}

fn prompts(n: usize) -> Vec<String> {
    (1..=n).map(|i| format!("question {i}")).collect()
}

fn answer(i: usize) -> String {
    format!("answer to question {i}")
}

/// Ready job whose snapshot returns `entries` as-is.
fn ready_job(entries: Vec<Value>) -> ScriptedTransport {
    ScriptedTransport::new()
        .on(Method::Post, "/trigger", [trigger_reply("s_1")])
        .on(Method::Get, "/progress/s_1", [progress_reply("running"), progress_reply("ready")])
        .on(Method::Get, "/snapshot/s_1", [Scripted::json(Value::Array(entries))])
}

async fn run(transport: &ScriptedTransport, texts: &[String]) -> Result<Vec<answer_engine::ReconciledResponse>, BatchError> {
    orchestrator(transport)
        .run_batch("chatgpt", texts, &SharedParams::default(), &CancellationToken::new())
        .await
}

#[tokio::test]
async fn test_output_follows_submission_order_for_shuffled_results() {
    let texts = prompts(5);
    let entries = [4, 2, 5, 1, 3]
        .iter()
        .map(|&i| answer_entry(i as i64, &texts[i - 1], &answer(i)))
        .collect();
    let transport = ready_job(entries);

    let responses = run(&transport, &texts).await.unwrap();

    assert_eq!(responses.len(), texts.len());
    for (position, response) in responses.iter().enumerate() {
        assert_eq!(response.prompt_index, position + 1);
        assert_eq!(response.text, answer(position + 1));
        assert!(response.succeeded);
    }
}

#[tokio::test]
async fn test_reverse_order_results_are_not_cross_attributed() {
    let texts = vec!["Which CRM suits a dental clinic?".to_string(), "Best payroll app in Ohio?".to_string()];
    let transport = ready_job(vec![
        answer_entry(2, &texts[1], "Gusto is popular in Ohio."),
        answer_entry(1, &texts[0], "Dentrix integrates with most CRMs."),
    ]);

    let responses = run(&transport, &texts).await.unwrap();

    assert_eq!(responses[0].text, "Dentrix integrates with most CRMs.");
    assert_eq!(responses[1].text, "Gusto is popular in Ohio.");
}

#[tokio::test]
async fn test_zero_index_falls_back_to_prompt_text() {
    let texts = prompts(3);
    let transport = ready_job(vec![
        answer_entry(3, &texts[2], &answer(3)),
        answer_entry(0, &texts[0], &answer(1)),
        answer_entry(2, &texts[1], &answer(2)),
    ]);
    let sink = MemorySink::new();

    let responses = orchestrator(&transport)
        .with_sink(Arc::new(sink.clone()))
        .run_batch("chatgpt", &texts, &SharedParams::default(), &CancellationToken::new())
        .await
        .unwrap();

    let got: Vec<&str> = responses.iter().map(|r| r.text.as_str()).collect();
    assert_eq!(got, vec![answer(1), answer(2), answer(3)]);
    assert!(matches!(
        sink.records().as_slice(),
        [Diagnostic::ContentFallback { reason, .. }] if reason.contains("out-of-range index 0")
    ));
}

#[tokio::test]
async fn test_unmatched_text_fails_the_batch() {
    let texts = prompts(2);
    let transport = ready_job(vec![
        answer_entry(0, &texts[0], &answer(1)),
        answer_entry(0, "a question nobody asked", "stray answer"),
    ]);

    let err = run(&transport, &texts).await.unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Reconciliation);
    assert!(err.to_string().contains("s_1"));
}

#[tokio::test]
async fn test_assembly_retry_below_ceiling_succeeds() {
    let texts = prompts(2);
    let transport = ScriptedTransport::new()
        .on(Method::Post, "/trigger", [trigger_reply("s_1")])
        .on(Method::Get, "/progress/s_1", [progress_reply("ready")])
        .on(
            Method::Get,
            "/snapshot/s_1",
            [
                building_reply(),
                building_reply(),
                building_reply(),
                Scripted::json(json!([
                    answer_entry(1, &texts[0], &answer(1)),
                    answer_entry(2, &texts[1], &answer(2)),
                ])),
            ],
        );

    let responses = run(&transport, &texts).await.unwrap();

    assert_eq!(responses.len(), 2);
    assert_eq!(responses[1].text, answer(2));
    assert_eq!(transport.call_count("/snapshot/s_1"), 4);
}

#[tokio::test]
async fn test_assembly_beyond_ceiling_times_out() {
    let transport = ScriptedTransport::new()
        .on(Method::Post, "/trigger", [trigger_reply("s_1")])
        .on(Method::Get, "/progress/s_1", [progress_reply("ready")])
        .on(Method::Get, "/snapshot/s_1", [building_reply()]);

    let err = run(&transport, &prompts(2)).await.unwrap_err();

    assert!(matches!(err, BatchError::AssemblyTimeout { attempts: 5, .. }));
    assert_eq!(err.category(), ErrorCategory::Assembly);
    assert_eq!(transport.call_count("/snapshot/s_1"), 5);
}

#[tokio::test]
async fn test_one_failed_item_does_not_fail_the_batch() {
    let texts = prompts(5);
    let mut entries: Vec<Value> = (1..=5)
        .filter(|&i| i != 3)
        .map(|i| answer_entry(i as i64, &texts[i - 1], &answer(i)))
        .collect();
    entries.insert(1, error_entry(3, &texts[2], "Timed out waiting for the answer"));
    let transport = ready_job(entries);

    let responses = run(&transport, &texts).await.unwrap();

    assert_eq!(responses.len(), 5);
    for (position, response) in responses.iter().enumerate() {
        if position == 2 {
            assert!(!response.succeeded);
            assert!(!response.should_evaluate());
            assert_eq!(response.cost, 0.0);
            assert!(response.citations.is_empty());
            assert_eq!(response.text, FAILED_ANSWER_TEXT);
        } else {
            assert!(response.succeeded, "prompt {} should succeed", position + 1);
            assert_eq!(response.text, answer(position + 1));
            assert_eq!(response.cost, 0.0015);
        }
    }
}

#[tokio::test]
async fn test_cancellation_mid_poll_returns_within_a_tick() {
    let tick = Duration::from_millis(100);
    let transport = ScriptedTransport::new()
        .on(Method::Post, "/trigger", [trigger_reply("s_1")])
        .on(Method::Get, "/progress/s_1", [progress_reply("running")]);
    let orchestrator = orchestrator_with(&transport, fast_settings().with_poll_interval(tick));

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(250)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let err = orchestrator
        .run_batch("chatgpt", &prompts(3), &SharedParams::default(), &cancel)
        .await
        .unwrap_err();
    let elapsed = started.elapsed();

    assert!(err.is_cancelled(), "expected cancellation, got {err:?}");
    assert_eq!(err.category(), ErrorCategory::Cancelled);
    assert!(elapsed >= Duration::from_millis(250));
    assert!(elapsed < Duration::from_millis(250) + tick + Duration::from_millis(150), "took {elapsed:?}");
    assert!(transport.call_count("/progress/s_1") >= 2);
    assert_eq!(transport.call_count("/snapshot/"), 0);
}

#[tokio::test]
async fn test_failed_job_is_fatal_and_skips_fetch() {
    let transport = ScriptedTransport::new()
        .on(Method::Post, "/trigger", [trigger_reply("s_1")])
        .on(Method::Get, "/progress/s_1", [progress_reply("running"), progress_reply("failed")]);

    let err = run(&transport, &prompts(2)).await.unwrap_err();

    assert!(matches!(err, BatchError::JobFailed { ref handle } if handle == "chatgpt:s_1"));
    assert_eq!(err.category(), ErrorCategory::Job);
    assert_eq!(transport.call_count("/snapshot/"), 0);
}

#[tokio::test]
async fn test_submission_without_handle_fails() {
    let transport = ScriptedTransport::new().on(
        Method::Post,
        "/trigger",
        [Scripted::json(json!({"message": "accepted"}))],
    );

    let err = run(&transport, &prompts(1)).await.unwrap_err();

    assert!(matches!(err, BatchError::MissingHandle { .. }));
    assert_eq!(transport.call_count("/progress/"), 0);
}

#[tokio::test]
async fn test_unauthorized_submission_is_not_retried() {
    let transport = ScriptedTransport::new().on(
        Method::Post,
        "/trigger",
        [Scripted::status(401, r#"{"error":"Invalid API key"}"#)],
    );

    let err = run(&transport, &prompts(1)).await.unwrap_err();

    match err {
        BatchError::Transport {
            source: TransportError::Rejected { status, ref body, .. },
            ..
        } => {
            assert_eq!(status, 401);
            assert!(body.contains("Invalid API key"));
        }
        other => panic!("expected rejected transport error, got {other:?}"),
    }
    assert_eq!(transport.call_count("/trigger"), 1);
}

#[tokio::test]
async fn test_rate_limited_submission_is_retried() {
    let texts = prompts(1);
    let transport = ScriptedTransport::new()
        .on(
            Method::Post,
            "/trigger",
            [Scripted::status(429, "Too many requests"), trigger_reply("s_1")],
        )
        .on(Method::Get, "/progress/s_1", [progress_reply("ready")])
        .on(
            Method::Get,
            "/snapshot/s_1",
            [Scripted::json(json!([answer_entry(1, &texts[0], &answer(1))]))],
        );

    let responses = run(&transport, &texts).await.unwrap();

    assert_eq!(responses[0].text, answer(1));
    assert_eq!(transport.call_count("/trigger"), 2);
}

#[tokio::test]
async fn test_submission_carries_indexes_locale_and_credential() {
    let texts = prompts(2);
    let transport = ready_job(vec![
        answer_entry(1, &texts[0], &answer(1)),
        answer_entry(2, &texts[1], &answer(2)),
    ]);
    let params = SharedParams::new(Locale::country("UK")).with_web_search(false);

    orchestrator(&transport)
        .run_batch("chatgpt", &texts, &params, &CancellationToken::new())
        .await
        .unwrap();

    let bodies = transport.bodies("/trigger");
    let body = &bodies[0];
    let inputs = body["input"].as_array().unwrap();
    assert_eq!(inputs.len(), 2);
    for (position, input) in inputs.iter().enumerate() {
        assert_eq!(input["index"], json!(position + 1));
        assert_eq!(input["prompt"], json!(texts[position]));
        assert_eq!(input["country"], json!("GB"));
        assert_eq!(input["web_search"], json!(false));
    }
    let calls = transport.calls();
    assert!(calls.iter().all(|c| c.bearer.as_deref() == Some("bd-key")));
}
