//! Integration tests for the container tool dispatcher
//!
//! Every tool is driven end to end (registry → validation → handler →
//! runtime) against the in-memory runtime.

use std::sync::Arc;

use dockhand_tools::runtime::{ContainerStats, InMemoryRuntime};
use dockhand_tools::{
    Dispatcher, FailureKind, InvocationResult, RuntimeClient, RuntimeError, ToolRegistry,
};
use serde_json::{json, Value};

fn setup(runtime: InMemoryRuntime) -> (Arc<InMemoryRuntime>, Dispatcher) {
    let runtime = Arc::new(runtime);
    let registry = Arc::new(ToolRegistry::with_builtin_tools().unwrap());
    let dispatcher = Dispatcher::new(registry, RuntimeClient::new(runtime.clone()));
    (runtime, dispatcher)
}

fn success(text: &str) -> InvocationResult {
    InvocationResult::Success(text.to_string())
}

#[tokio::test]
async fn test_unknown_names_are_rejected() {
    let (_, dispatcher) = setup(InMemoryRuntime::new());
    for name in ["", "get-logs", "GET_LOGS", "exec_container", "tools/list"] {
        let result = dispatcher.invoke(name, json!({})).await;
        assert_eq!(
            result.failure_kind(),
            Some(FailureKind::UnknownOperation),
            "{name:?} should be unknown"
        );
    }
}

#[tokio::test]
async fn test_every_tool_answers_any_payload() {
    let (_, dispatcher) = setup(InMemoryRuntime::new());
    let payloads = [
        Value::Null,
        json!({}),
        json!([]),
        json!("container"),
        json!({"container_id": 7, "tail": {}, "force": "perhaps"}),
        json!({"container_id": "ghost", "image_name": "ghost", "ports": {"x": "y"}}),
    ];
    let names = dispatcher.registry().names();
    for name in names {
        for payload in &payloads {
            // Each call returns a result with readable text; none panics
            let result = dispatcher.invoke(name, payload.clone()).await;
            assert!(!result.text().is_empty(), "{name} returned empty text");
        }
    }
}

#[tokio::test]
async fn test_missing_parameter_named_regardless_of_others() {
    let (_, dispatcher) = setup(InMemoryRuntime::new());
    let cases = [
        ("get_logs", json!({"tail": "not a number"}), "container_id"),
        ("delete_container", json!({"force": [1]}), "container_id"),
        ("run_container", json!({"ports": "80:80", "detach": "sometimes"}), "image_name"),
        ("container_stats", json!({"container_id": null}), "container_id"),
    ];
    for (tool, args, param) in cases {
        match dispatcher.invoke(tool, args).await {
            InvocationResult::Failure(failure) => {
                assert_eq!(failure.kind, FailureKind::MissingParameter);
                assert!(
                    failure.message.contains(&format!("'{param}'")),
                    "{tool}: {}",
                    failure.message
                );
            }
            other => panic!("{tool} should fail validation, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_get_logs_default_tail() {
    let runtime = InMemoryRuntime::new();
    runtime.add_container("x", "busybox", true);
    let lines: String = (1..=30).map(|i| format!("line {i}\n")).collect();
    runtime.set_logs("x", lines.as_bytes());
    let (_, dispatcher) = setup(runtime);

    let implicit = dispatcher.invoke("get_logs", json!({"container_id": "x"})).await;
    let explicit = dispatcher
        .invoke("get_logs", json!({"container_id": "x", "tail": 20}))
        .await;
    assert_eq!(implicit, explicit);
    assert!(implicit.text().starts_with("line 11\n"));
    assert!(implicit.text().ends_with("line 30\n"));

    let everything = dispatcher
        .invoke("get_logs", json!({"container_id": "x", "tail": -1}))
        .await;
    assert!(everything.text().starts_with("line 1\n"));
}

#[tokio::test]
async fn test_empty_results_render_fixed_text() {
    let runtime = InMemoryRuntime::new();
    let (runtime, dispatcher) = setup(runtime);

    assert_eq!(
        dispatcher.invoke("list_containers", json!({})).await,
        success("No containers found.")
    );

    runtime.add_container("quiet", "alpine", true);
    assert_eq!(
        dispatcher
            .invoke("get_logs", json!({"container_id": "quiet"}))
            .await,
        success("No logs available.")
    );
}

#[tokio::test]
async fn test_list_containers_format() {
    let runtime = InMemoryRuntime::new();
    let web = runtime.add_container("web", "nginx", true);
    let db = runtime.add_container("db", "postgres", false);
    let (_, dispatcher) = setup(runtime);

    let result = dispatcher.invoke("list_containers", Value::Null).await;
    let expected = format!("{} | web | running\n{} | db | exited", &web[..12], &db[..12]);
    assert_eq!(result, success(&expected));
}

#[tokio::test]
async fn test_lifecycle_round_trip() {
    let runtime = InMemoryRuntime::new();
    runtime.add_container("api", "myorg/api", false);
    runtime.set_stats(
        "api",
        ContainerStats {
            cpu_usage_total: 52_000_000,
            memory_usage_bytes: 7_340_032,
        },
    );
    let (runtime, dispatcher) = setup(runtime);

    assert_eq!(
        dispatcher
            .invoke("start_container", json!({"container_id": "api"}))
            .await,
        success("Container api started")
    );
    assert_eq!(runtime.status_of("api").as_deref(), Some("running"));

    let stats = dispatcher
        .invoke("container_stats", json!({"container_id": "api"}))
        .await;
    assert_eq!(
        stats,
        success("CPU Usage: 52000000, Memory Usage: 7340032 bytes")
    );

    assert_eq!(
        dispatcher
            .invoke("restart_container", json!({"container_id": "api"}))
            .await,
        success("Container api restarted")
    );
    assert_eq!(
        dispatcher
            .invoke("stop_container", json!({"container_id": "api"}))
            .await,
        success("Container api stopped")
    );
    assert_eq!(runtime.status_of("api").as_deref(), Some("exited"));
}

#[tokio::test]
async fn test_generic_handlers_collapse_faults() {
    let (_, dispatcher) = setup(InMemoryRuntime::new());
    for tool in ["get_logs", "start_container", "stop_container", "restart_container", "container_stats"] {
        let result = dispatcher.invoke(tool, json!({"container_id": "ghost"})).await;
        assert_eq!(result.failure_kind(), Some(FailureKind::RuntimeFault), "{tool}");
        assert_eq!(result.text(), "Error: No such container: ghost");
    }
}

#[tokio::test]
async fn test_runtime_fault_reported() {
    let runtime = InMemoryRuntime::new();
    runtime.add_container("web", "nginx", true);
    runtime.fail(
        "stop",
        RuntimeError::Api {
            status: 500,
            message: "cannot kill container".into(),
        },
    );
    let (_, dispatcher) = setup(runtime);

    let result = dispatcher
        .invoke("stop_container", json!({"container_id": "web"}))
        .await;
    assert_eq!(result.failure_kind(), Some(FailureKind::RuntimeFault));
    assert_eq!(result.text(), "Error: cannot kill container (status 500)");
}

#[tokio::test]
async fn test_run_container_scenario() {
    let (runtime, dispatcher) = setup(InMemoryRuntime::new().with_image("alpine"));

    let result = dispatcher
        .invoke(
            "run_container",
            json!({"image_name": "alpine", "name": "t1", "ports": {"80/tcp": 8080}, "detach": true}),
        )
        .await;

    let text = result.text().to_string();
    assert!(result.is_success(), "{text}");
    let short_id = text
        .strip_prefix("Container t1 started with ID: ")
        .expect("success text");
    assert_eq!(short_id.len(), 12);
    assert_eq!(runtime.status_of("t1").as_deref(), Some("running"));
    assert_eq!(runtime.ports_of("t1").unwrap()["80/tcp"], 8080);
    assert_eq!(runtime.image_of(short_id).as_deref(), Some("alpine"));
}

#[tokio::test]
async fn test_run_container_defaults_and_nulls() {
    let (runtime, dispatcher) = setup(InMemoryRuntime::new().with_image("alpine"));

    let result = dispatcher
        .invoke("run_container", json!({"image_name": "alpine", "name": null, "ports": null}))
        .await;
    assert!(result.text().starts_with("Container container_1 started with ID: "));
    assert_eq!(runtime.status_of("container_1").as_deref(), Some("running"));

    let attached = dispatcher
        .invoke("run_container", json!({"image_name": "alpine", "detach": false}))
        .await;
    assert!(attached.is_success());
    assert_eq!(runtime.status_of("container_2").as_deref(), Some("exited"));
}

#[tokio::test]
async fn test_run_container_failures() {
    let (runtime, dispatcher) = setup(InMemoryRuntime::new().with_image("alpine"));
    runtime.add_container("taken", "alpine", false);

    let missing_image = dispatcher
        .invoke("run_container", json!({"image_name": "no-such-image"}))
        .await;
    assert_eq!(missing_image.failure_kind(), Some(FailureKind::NotFound));
    assert_eq!(
        missing_image.text(),
        "Error running container: No such image: no-such-image"
    );

    let conflict = dispatcher
        .invoke("run_container", json!({"image_name": "alpine", "name": "taken"}))
        .await;
    assert_eq!(conflict.failure_kind(), Some(FailureKind::RuntimeFault));
    assert!(conflict.text().starts_with("Error running container: Conflict."));

    let bad_ports = dispatcher
        .invoke("run_container", json!({"image_name": "alpine", "ports": {"eighty": 80}}))
        .await;
    assert_eq!(bad_ports.failure_kind(), Some(FailureKind::ConstraintViolation));
    assert!(bad_ports.text().contains("'ports'"));
    assert_eq!(runtime.container_count(), 1);
}

#[tokio::test]
async fn test_delete_container() {
    let runtime = InMemoryRuntime::new();
    runtime.add_container("old", "alpine", false);
    runtime.add_container("busy", "nginx", true);
    let (runtime, dispatcher) = setup(runtime);

    assert_eq!(
        dispatcher
            .invoke("delete_container", json!({"container_id": "old"}))
            .await,
        success("Container old removed successfully.")
    );

    let refused = dispatcher
        .invoke("delete_container", json!({"container_id": "busy"}))
        .await;
    assert_eq!(refused.failure_kind(), Some(FailureKind::RuntimeFault));
    assert!(refused.text().starts_with("Docker API error: You cannot remove a running container"));

    let forced = dispatcher
        .invoke("delete_container", json!({"container_id": "busy", "force": true}))
        .await;
    assert_eq!(forced, success("Container busy removed successfully."));
    assert_eq!(runtime.container_count(), 0);
}

#[tokio::test]
async fn test_delete_missing_container_is_distinct() {
    let (runtime, dispatcher) = setup(InMemoryRuntime::new());

    let missing = dispatcher
        .invoke("delete_container", json!({"container_id": "missing"}))
        .await;
    assert_eq!(missing.failure_kind(), Some(FailureKind::NotFound));
    assert_eq!(missing.text(), "Container 'missing' not found.");

    runtime.add_container("flaky", "alpine", false);
    runtime.fail("remove", RuntimeError::Transport("connection reset".into()));
    let broken = dispatcher
        .invoke("delete_container", json!({"container_id": "flaky"}))
        .await;
    assert_eq!(broken.failure_kind(), Some(FailureKind::UnexpectedFault));
    assert_eq!(
        broken.text(),
        "Error removing container: daemon connection error: connection reset"
    );
}

#[tokio::test]
async fn test_concurrent_invocations() {
    let runtime = InMemoryRuntime::new();
    for i in 0..16 {
        runtime.add_container(&format!("svc{i}"), "nginx", false);
    }
    let (runtime, dispatcher) = setup(runtime);
    let dispatcher = Arc::new(dispatcher);

    let mut tasks = Vec::new();
    for i in 0..16 {
        let dispatcher = dispatcher.clone();
        tasks.push(tokio::spawn(async move {
            dispatcher
                .invoke("start_container", json!({"container_id": format!("svc{i}")}))
                .await
        }));
    }
    for (i, task) in tasks.into_iter().enumerate() {
        assert_eq!(task.await.unwrap(), success(&format!("Container svc{i} started")));
    }
    for i in 0..16 {
        assert_eq!(runtime.status_of(&format!("svc{i}")).as_deref(), Some("running"));
    }
}
