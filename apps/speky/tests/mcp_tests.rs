//! # Query Server Integration Tests
//!
//! Drive the real line loop over in-memory input and output, on
//! specifications loaded from the sample files.

use serde_json::{Value, json};
use speky::mcp::{self, protocol};
use speky::sources::SourceSet;
use speky_core::Specification;
use std::path::PathBuf;

// =============================================================================
// HELPERS
// =============================================================================

fn sample(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("samples")
        .join(name)
}

fn load(documents: &[&str], comment_tables: &[&str]) -> Specification {
    let sources = SourceSet::new(
        documents.iter().map(|name| sample(name)).collect(),
        comment_tables.iter().map(|name| sample(name)).collect(),
    );
    sources.load().expect("samples load and validate").0
}

fn simple() -> Specification {
    load(
        &[
            "simple_requirements.yaml",
            "simple_tests.yaml",
            "simple_comments.yaml",
        ],
        &[],
    )
}

fn complex() -> Specification {
    load(
        &[
            "simple_requirements.yaml",
            "simple_tests.yaml",
            "simple_comments.yaml",
            "more_requirements.yaml",
            "more_tests.yaml",
            "more_comments.yaml",
        ],
        &[],
    )
}

/// Feed raw bytes to a fresh server and collect every response line.
async fn exchange_bytes(spec: &Specification, input: &[u8]) -> Vec<Value> {
    let mut output = Vec::new();
    mcp::run_server(spec, input, &mut output)
        .await
        .expect("in-memory i/o");

    String::from_utf8(output)
        .expect("utf-8 output")
        .lines()
        .map(|line| serde_json::from_str(line).expect("one JSON object per line"))
        .collect()
}

async fn exchange_lines(spec: &Specification, lines: &[String]) -> Vec<Value> {
    exchange_bytes(spec, lines.join("\n").as_bytes()).await
}

async fn exchange(spec: &Specification, messages: &[Value]) -> Vec<Value> {
    let lines: Vec<String> = messages.iter().map(Value::to_string).collect();
    exchange_lines(spec, &lines).await
}

fn initialize() -> Value {
    json!({"jsonrpc": "2.0", "id": 0, "method": "initialize", "params": {}})
}

fn call(id: i64, name: &str, arguments: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": {"name": name, "arguments": arguments},
    })
}

/// Initialize, then make one tool call; returns the call's response.
async fn call_once(spec: &Specification, name: &str, arguments: Value) -> Value {
    let responses = exchange(spec, &[initialize(), call(1, name, arguments)]).await;
    assert_eq!(responses.len(), 2);
    responses[1].clone()
}

fn ids(listing: &Value) -> Vec<&str> {
    listing
        .as_array()
        .expect("array")
        .iter()
        .map(|item| item["id"].as_str().expect("id"))
        .collect()
}

// =============================================================================
// SESSION LIFECYCLE
// =============================================================================

#[tokio::test]
async fn initialize_returns_descriptor() {
    let responses = exchange(&simple(), &[initialize()]).await;

    assert_eq!(responses.len(), 1);
    let response = &responses[0];
    assert_eq!(response["jsonrpc"], "2.0");
    assert_eq!(response["id"], 0);
    assert_eq!(response["result"]["protocolVersion"], protocol::PROTOCOL_VERSION);
    assert_eq!(response["result"]["serverInfo"]["name"], "speky-mcp");
    assert_eq!(response["result"]["capabilities"], json!({"tools": {}}));
}

#[tokio::test]
async fn calls_before_initialize_are_rejected_without_state_change() {
    let responses = exchange(
        &simple(),
        &[
            call(1, "get_requirement", json!({"id": "RF01"})),
            call(2, "get_requirement", json!({"id": "RF01"})),
            initialize(),
            call(3, "get_requirement", json!({"id": "RF01"})),
        ],
    )
    .await;

    assert_eq!(responses.len(), 4);
    for rejected in &responses[..2] {
        assert_eq!(rejected["error"]["code"], protocol::SERVER_NOT_INITIALIZED);
        assert_eq!(rejected["error"]["message"], "Server not initialized");
        assert!(rejected.get("result").is_none());
    }
    assert_eq!(responses[3]["id"], 3);
    assert_eq!(responses[3]["result"]["structuredContent"]["id"], "RF01");
}

#[tokio::test]
async fn acknowledgement_gets_no_response() {
    let responses = exchange(
        &simple(),
        &[
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
            initialize(),
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
            call(1, "list_all_tags", json!({})),
        ],
    )
    .await;

    let ids: Vec<&Value> = responses.iter().map(|r| &r["id"]).collect();
    assert_eq!(ids, [&json!(0), &json!(1)]);
}

#[tokio::test]
async fn responses_follow_request_order() {
    let responses = exchange(
        &complex(),
        &[
            initialize(),
            call(10, "list_all_ids", json!({})),
            call(11, "get_test", json!({"id": "T01"})),
            call(12, "list_all_tags", json!({})),
        ],
    )
    .await;

    let ids: Vec<&Value> = responses.iter().map(|r| &r["id"]).collect();
    assert_eq!(ids, [&json!(0), &json!(10), &json!(11), &json!(12)]);
}

#[tokio::test]
async fn malformed_line_does_not_end_the_session() {
    let lines = [
        "{this is not json".to_string(),
        String::new(),
        initialize().to_string(),
        call(1, "list_all_ids", json!({})).to_string(),
    ];
    let responses = exchange_lines(&simple(), &lines).await;

    assert_eq!(responses.len(), 3);
    assert_eq!(responses[0]["error"]["code"], protocol::PARSE_ERROR);
    assert_eq!(responses[0]["id"], Value::Null);
    assert_eq!(
        responses[2]["result"]["structuredContent"],
        json!({"requirements": ["RF01", "RF02"], "tests": ["T01"]})
    );
}

#[tokio::test]
async fn non_utf8_line_gets_a_parse_error() {
    let mut input = initialize().to_string().into_bytes();
    input.push(b'\n');
    input.extend_from_slice(&[0xff, 0xfe, b'{', b'}', b'\n']);
    input.extend_from_slice(call(1, "list_all_tags", json!({})).to_string().as_bytes());
    input.push(b'\n');

    let responses = exchange_bytes(&simple(), &input).await;

    assert_eq!(responses.len(), 3);
    assert_eq!(responses[0]["id"], 0);
    assert_eq!(responses[1]["error"]["code"], protocol::PARSE_ERROR);
    assert_eq!(responses[1]["id"], Value::Null);
    assert_eq!(responses[2]["id"], 1);
    assert!(responses[2]["result"]["structuredContent"]["tags"].is_array());
}

#[tokio::test]
async fn unknown_method_and_tool_are_protocol_errors() {
    let responses = exchange(
        &simple(),
        &[
            initialize(),
            json!({"jsonrpc": "2.0", "id": 1, "method": "prompts/list"}),
            call(2, "delete_everything", json!({})),
        ],
    )
    .await;

    assert_eq!(responses[1]["error"]["code"], protocol::METHOD_NOT_FOUND);
    assert_eq!(responses[1]["error"]["message"], "Method not found: prompts/list");
    assert_eq!(responses[2]["error"]["code"], protocol::METHOD_NOT_FOUND);
    assert_eq!(responses[2]["error"]["message"], "Tool not found: delete_everything");
}

#[tokio::test]
async fn domain_failure_keeps_the_loop_running() {
    let responses = exchange(
        &simple(),
        &[
            initialize(),
            call(1, "get_requirement", json!({"id": "NOTFOUND"})),
            call(2, "get_requirement", json!({"id": "RF02"})),
        ],
    )
    .await;

    let failure = &responses[1];
    assert!(failure.get("error").is_none());
    assert_eq!(failure["result"]["isError"], true);
    assert_eq!(
        failure["result"]["structuredContent"],
        json!({"error": "Requirement NOTFOUND not found"})
    );
    assert_eq!(responses[2]["result"]["structuredContent"]["id"], "RF02");
}

// =============================================================================
// TOOLS
// =============================================================================

#[tokio::test]
async fn get_simple_requirement() {
    let response = call_once(&simple(), "get_requirement", json!({"id": "RF01"})).await;
    let content = &response["result"]["structuredContent"];

    assert_eq!(content["id"], "RF01");
    assert_eq!(content["category"], "functional");
    assert_eq!(content["long"], "The first requirement");
    assert_eq!(ids(&content["tested_by"]), ["T01"]);
    assert_eq!(
        content["comments"],
        json!([{
            "date": "01/01/2025",
            "external": false,
            "from": "Some Person",
            "text": "The first comment",
        }])
    );
    assert!(content.get("short").is_none());
    assert!(content.get("ref").is_none());
}

#[tokio::test]
async fn get_requirement_with_all_fields() {
    let response = call_once(&complex(), "get_requirement", json!({"id": "RF03"})).await;
    let content = &response["result"]["structuredContent"];

    assert_eq!(content["category"], "non-functional");
    assert_eq!(content["long"], "The third requirement !");
    assert_eq!(content["short"], "Number 3");
    assert_eq!(content["tags"], json!(["foo", "bar:baz"]));
    assert_eq!(content["client_statement"], "I want a requirement will all fields");
    assert_eq!(content["properties"], json!({"author": "Mr. Author"}));
    assert_eq!(ids(&content["ref"]), ["RF04"]);
    assert_eq!(ids(&content["referenced_by"]), ["RF04"]);
    assert_eq!(ids(&content["tested_by"]), ["T03", "T04"]);

    let comments = content["comments"].as_array().expect("comments");
    let dates: Vec<&str> = comments
        .iter()
        .map(|c| c["date"].as_str().expect("date"))
        .collect();
    assert_eq!(dates, ["02/02/2025", "15/03/2025", "16/03/2025"]);
    assert_eq!(comments[0]["external"], true);
    assert_eq!(comments[1]["from"], "Mr. Author");
}

#[tokio::test]
async fn get_requirement_on_a_test() {
    let response = call_once(&simple(), "get_requirement", json!({"id": "T01"})).await;
    assert_eq!(response["result"]["isError"], true);
    assert_eq!(
        response["result"]["structuredContent"]["error"],
        "T01 is a test, not a requirement"
    );
}

#[tokio::test]
async fn get_simple_test() {
    let response = call_once(&simple(), "get_test", json!({"id": "T01"})).await;
    let content = &response["result"]["structuredContent"];

    assert_eq!(content["category"], "functional");
    assert_eq!(
        content["long"],
        "The first test, that validates the first requirement"
    );
    assert_eq!(ids(&content["ref"]), ["RF01"]);
    assert_eq!(content["steps"], json!([{"action": "The only step"}]));
    assert!(content.get("prereq").is_none());
}

#[tokio::test]
async fn get_test_with_all_fields() {
    let response = call_once(&complex(), "get_test", json!({"id": "T04"})).await;
    let content = &response["result"]["structuredContent"];

    assert_eq!(content["category"], "non-functional");
    assert_eq!(content["short"], "Yet another test");
    assert_eq!(content["initial"], "Requires ls and cat");
    assert_eq!(ids(&content["prereq"]), ["T03"]);
    assert_eq!(ids(&content["ref"]), ["RF03"]);
    assert_eq!(content["steps"][1]["sample_lang"], "markdown");
}

#[tokio::test]
async fn get_test_failures() {
    let spec = simple();
    let missing = call_once(&spec, "get_test", json!({"id": "NOTFOUND"})).await;
    assert_eq!(
        missing["result"]["structuredContent"]["error"],
        "Test NOTFOUND not found"
    );
    let wrong = call_once(&spec, "get_test", json!({"id": "RF01"})).await;
    assert_eq!(
        wrong["result"]["structuredContent"]["error"],
        "RF01 is a requirement, not a test"
    );
}

#[tokio::test]
async fn search_requirements() {
    let spec = complex();

    let all = call_once(&spec, "search_requirements", json!({})).await;
    let listing = &all["result"]["structuredContent"]["requirements"];
    assert_eq!(ids(listing), ["RF01", "RF02", "RF03", "RF04"]);
    assert!(listing.as_array().expect("array").iter().all(|r| r.get("category").is_some()));

    let foo = call_once(&spec, "search_requirements", json!({"tag": "foo"})).await;
    assert_eq!(ids(&foo["result"]["structuredContent"]["requirements"]), ["RF03"]);

    let nothing = call_once(&spec, "search_requirements", json!({"tag": "nonexistent"})).await;
    assert!(nothing["result"].get("isError").is_none());
    assert!(ids(&nothing["result"]["structuredContent"]["requirements"]).is_empty());

    let functional =
        call_once(&spec, "search_requirements", json!({"category": "functional"})).await;
    assert_eq!(
        ids(&functional["result"]["structuredContent"]["requirements"]),
        ["RF01", "RF02"]
    );

    let unknown = call_once(&spec, "search_requirements", json!({"category": "legal"})).await;
    assert_eq!(
        unknown["result"]["structuredContent"]["error"],
        "Category 'legal' not found"
    );
}

#[tokio::test]
async fn search_tests() {
    let spec = complex();

    let all = call_once(&spec, "search_tests", json!({})).await;
    assert_eq!(
        ids(&all["result"]["structuredContent"]["tests"]),
        ["T01", "T02", "T03", "T04"]
    );

    let of_rf03 = call_once(
        &spec,
        "search_tests",
        json!({"tester_of": "RF03", "category": "non-functional"}),
    )
    .await;
    assert_eq!(ids(&of_rf03["result"]["structuredContent"]["tests"]), ["T03", "T04"]);

    let mixed = call_once(
        &spec,
        "search_tests",
        json!({"tester_of": "RF03", "category": "functional"}),
    )
    .await;
    assert!(ids(&mixed["result"]["structuredContent"]["tests"]).is_empty());
}

#[tokio::test]
async fn reverse_lookups() {
    let spec = complex();

    let testers = call_once(&spec, "list_testers_of", json!({"id": "RF03"})).await;
    let tests = &testers["result"]["structuredContent"]["tests"];
    assert_eq!(ids(tests), ["T03", "T04"]);
    assert_eq!(tests[1]["category"], "non-functional");
    assert_eq!(tests[1]["short"], "Yet another test");

    let referrers = call_once(&spec, "list_references_to", json!({"id": "RF04"})).await;
    assert_eq!(
        ids(&referrers["result"]["structuredContent"]["requirements"]),
        ["RF03"]
    );

    let unknown = call_once(&spec, "list_references_to", json!({"id": "RF99"})).await;
    assert_eq!(
        unknown["result"]["structuredContent"]["error"],
        "Requirement RF99 not found"
    );
}

#[tokio::test]
async fn untested_requirements() {
    let simple_untested = call_once(&simple(), "list_untested_requirements", json!({})).await;
    assert_eq!(
        ids(&simple_untested["result"]["structuredContent"]["requirements"]),
        ["RF02"]
    );

    let complex_untested = call_once(&complex(), "list_untested_requirements", json!({})).await;
    assert_eq!(
        ids(&complex_untested["result"]["structuredContent"]["requirements"]),
        ["RF04"]
    );
}

#[tokio::test]
async fn global_listings() {
    let spec = complex();

    let tags = call_once(&spec, "list_all_tags", json!({})).await;
    assert_eq!(
        tags["result"]["structuredContent"],
        json!({"tags": ["bar:baz", "foo"]})
    );

    let all = call_once(&spec, "list_all_ids", json!({})).await;
    assert_eq!(
        all["result"]["structuredContent"],
        json!({
            "requirements": ["RF01", "RF02", "RF03", "RF04"],
            "tests": ["T01", "T02", "T03", "T04"],
        })
    );
}

#[tokio::test]
async fn tools_list_exposes_schemas() {
    let responses = exchange(
        &simple(),
        &[initialize(), json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"})],
    )
    .await;

    let tools = responses[1]["result"]["tools"].as_array().expect("tools");
    let names: Vec<&str> = tools
        .iter()
        .map(|t| t["name"].as_str().expect("name"))
        .collect();
    assert_eq!(
        names,
        [
            "get_requirement",
            "get_test",
            "search_requirements",
            "list_testers_of",
            "search_tests",
            "list_references_to",
            "list_untested_requirements",
            "list_all_tags",
            "list_all_ids",
        ]
    );
    assert_eq!(tools[0]["inputSchema"]["required"], json!(["id"]));
}

#[tokio::test]
async fn comments_from_a_table() {
    let spec = load(
        &[
            "simple_requirements.yaml",
            "simple_tests.yaml",
            "simple_comments.yaml",
        ],
        &["comments.csv"],
    );

    let response = call_once(&spec, "get_requirement", json!({"id": "RF02"})).await;
    assert_eq!(
        response["result"]["structuredContent"]["comments"],
        json!([{
            "date": "10/04/2025",
            "external": true,
            "from": "Client",
            "text": "Why is RF02 untested, still ?",
        }])
    );
}
