use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{Value, json};
use std::fs;
use std::path::Path;
use std::process::Output;
use std::time::Duration;
use tempfile::tempdir;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const VALID_REPLY: &str = "OVERVIEW:\nA gentle, steady month.\n\nOBSERVATIONS:\n- You wrote on most weekends.\n- Walks came up more than once.\n\nTHEME_REFLECTION:\nSmall routines carried you through.\n\nCLOSING_QUESTION:\nWhich routine would you like to keep?";

fn reflect_cmd(home: &Path) -> Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("reflect");
    cmd.env_clear()
        .current_dir(home)
        .env("HOME", home)
        .env("REFLECT_HOME", home.join("reflect"));
    cmd
}

/// Run the binary off the async runtime so the mock server keeps serving.
async fn run(mut cmd: Command) -> Output {
    tokio::task::spawn_blocking(move || cmd.output().expect("run reflect"))
        .await
        .expect("join")
}

fn completion(text: &str) -> Value {
    json!({"choices": [{"message": {"role": "assistant", "content": text}}]})
}

fn summary_data(output: &Output) -> Value {
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let report: Value = serde_json::from_slice(&output.stdout).expect("json report");
    report["data"].clone()
}

fn body_of(request: &Request) -> Value {
    serde_json::from_slice(&request.body).expect("json body")
}

fn header_of<'a>(request: &'a Request, name: &str) -> Option<&'a str> {
    request.headers.get(name).and_then(|v| v.to_str().ok())
}

#[test]
fn providers_lists_cascade_in_priority_order_without_secrets() {
    let tmp = tempdir().expect("tempdir");
    reflect_cmd(tmp.path())
        .env("GEMINI_API_KEY", "gm-secret-value")
        .env("REFLECT_DISABLED_PROVIDERS", "openai")
        .env("REFLECT_OPENROUTER_MODELS", "a/free,b/free")
        .arg("providers")
        .assert()
        .success()
        .stdout(predicate::str::contains("1. openrouter [no api key] models=a/free,b/free"))
        .stdout(predicate::str::contains("2. huggingface [no api key]"))
        .stdout(predicate::str::contains("3. gemini [active]"))
        .stdout(predicate::str::contains("4. openai [disabled]"))
        .stdout(predicate::str::contains("gm-secret-value").not());
}

#[test]
fn providers_flags_unknown_reflect_variables() {
    let tmp = tempdir().expect("tempdir");
    reflect_cmd(tmp.path())
        .env("REFLECT_TEMPRATURE", "0.2")
        .arg("providers")
        .assert()
        .failure()
        .stdout(predicate::str::contains("unknown environment variable REFLECT_TEMPRATURE"));
}

#[test]
fn invalid_config_file_fails_loudly() {
    let tmp = tempdir().expect("tempdir");
    let config = tmp.path().join("reflect.toml");
    fs::write(&config, "[generation]\ntemperature = 9.0\nmax_output_tokens = 1400\n").expect("write");
    reflect_cmd(tmp.path())
        .env("REFLECT_CONFIG_PATH", &config)
        .arg("providers")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid temperature"));
}

#[tokio::test(flavor = "multi_thread")]
async fn summary_moves_to_next_model_after_404() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"model": "missing/model"})))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "no such model"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer or-test"))
        .and(body_partial_json(json!({"model": "working/model"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(VALID_REPLY)))
        .expect(1)
        .mount(&server)
        .await;

    let tmp = tempdir().expect("tempdir");
    let mut cmd = reflect_cmd(tmp.path());
    cmd.env("OPENROUTER_API_KEY", "or-test")
        .env("REFLECT_OPENROUTER_BASE_URL", server.uri())
        .env("REFLECT_OPENROUTER_MODELS", "missing/model,working/model")
        .args(["summary", "--user", "u1", "--month", "2024-03", "--json"]);
    let data = summary_data(&run(cmd).await);

    assert_eq!(data["provider"], "openrouter");
    assert_eq!(data["model"], "working/model");
    assert_eq!(data["overviewText"], "A gentle, steady month.");
    assert_eq!(data["observations"].as_array().map(Vec::len), Some(2));

    let received = server.received_requests().await.expect("recorded requests");
    let models: Vec<Value> = received.iter().map(|r| body_of(r)["model"].clone()).collect();
    assert_eq!(models, vec![json!("missing/model"), json!("working/model")]);

    let body = body_of(&received[1]);
    assert_eq!(body["messages"][0]["role"], "system");
    assert!(
        body["messages"][0]["content"]
            .as_str()
            .is_some_and(|s| s.contains("CLOSING_QUESTION:"))
    );
    assert_eq!(body["messages"][1]["role"], "user");
    assert_eq!(body["max_tokens"], 1400);
    assert_eq!(header_of(&received[1], "x-title"), Some("reflection-digest"));
}

#[tokio::test(flavor = "multi_thread")]
async fn rejected_key_skips_remaining_models_then_falls_back() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "bad key"})))
        .expect(1)
        .mount(&server)
        .await;

    let tmp = tempdir().expect("tempdir");
    let mut cmd = reflect_cmd(tmp.path());
    cmd.env("OPENAI_API_KEY", "sk-bad")
        .env("REFLECT_OPENAI_BASE_URL", server.uri())
        .env("REFLECT_OPENAI_MODELS", "m1,m2")
        .args(["summary", "--user", "u1", "--month", "2024-03"]);
    let output = run(cmd).await;
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("provider=fallback"));
    assert!(stdout.contains("attempt openai/m1: credentials rejected (401)"));
    assert!(!stdout.contains("openai/m2"));

    let received = server.received_requests().await.expect("recorded requests");
    assert_eq!(received.len(), 1);
    assert_eq!(header_of(&received[0], "x-title"), None);
}

#[tokio::test(flavor = "multi_thread")]
async fn gemini_request_uses_model_path_and_key_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-2.0-flash:generateContent"))
        .and(header("x-goog-api-key", "gm-test"))
        .and(body_partial_json(json!({
            "generationConfig": {"maxOutputTokens": 1400}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [{"text": VALID_REPLY}]}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tmp = tempdir().expect("tempdir");
    let mut cmd = reflect_cmd(tmp.path());
    cmd.env("GEMINI_API_KEY", "gm-test")
        .env("REFLECT_GEMINI_BASE_URL", server.uri())
        .args(["summary", "--user", "u1", "--month", "2024-03", "--json"]);
    let data = summary_data(&run(cmd).await);

    assert_eq!(data["provider"], "gemini");
    assert_eq!(data["model"], "gemini-2.0-flash");
    assert_eq!(data["closingQuestion"], "Which routine would you like to keep?");

    let received = server.received_requests().await.expect("recorded requests");
    assert_eq!(received.len(), 1);
    assert!(header_of(&received[0], "authorization").is_none());
    let body = body_of(&received[0]);
    assert!(body.get("model").is_none());
    assert!(
        body["systemInstruction"]["parts"][0]["text"]
            .as_str()
            .is_some_and(|s| s.contains("OVERVIEW:"))
    );
    assert_eq!(body["contents"][0]["role"], "user");
    assert!(
        body["contents"][0]["parts"][0]["text"]
            .as_str()
            .is_some_and(|s| s.contains("Entries written: 0."))
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn slow_model_times_out_and_next_model_answers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"model": "slow"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion(VALID_REPLY))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"model": "fast"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(VALID_REPLY)))
        .mount(&server)
        .await;

    let tmp = tempdir().expect("tempdir");
    let mut cmd = reflect_cmd(tmp.path());
    cmd.env("HF_TOKEN", "hf-test")
        .env("REFLECT_HUGGINGFACE_BASE_URL", server.uri())
        .env("REFLECT_HUGGINGFACE_MODELS", "slow,fast")
        .env("REFLECT_REQUEST_TIMEOUT_SECS", "1")
        .args(["summary", "--user", "u1", "--month", "2024-03"]);
    let output = run(cmd).await;
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("attempt huggingface/slow: timed out"));
    assert!(stdout.contains("provider=huggingface"));
    assert!(stdout.contains("model=fast"));
}
