mod backend;
mod config;

use anyhow::{Context, Result};
use serde_json::{json, Value as JsonValue};
use std::io::{self, BufRead, BufReader, Read, Write};
use til_board::{view, Controller, FactBoard, FactForm, Intent};
use til_store::{CategoryFilter, FactId, VoteKind};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use backend::Backend;
use config::Config;

const MAX_MESSAGE_BYTES: usize = 1_048_576; // 1 MiB
const MAX_FIELD_BYTES: usize = 8 * 1024; // 8 KiB

struct AppState {
    board: FactBoard<Backend>,
}

impl AppState {
    fn open(config: &Config) -> Result<Self> {
        let backend = Backend::open(config)?;
        let controller = Controller::new(Default::default(), config.response_ordering);
        Ok(Self {
            board: FactBoard::with_controller(backend, controller),
        })
    }
}

fn main() -> Result<()> {
    // stdout carries the protocol; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let config = Config::load().context("invalid configuration")?;
    let mut state = AppState::open(&config).context("failed to open fact table")?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start runtime")?;

    let loaded = runtime.block_on(state.board.dispatch(Intent::Load)).facts.len();
    match state.board.take_notice() {
        Some(notice) => warn!(%notice, "initial load failed"),
        None => info!(facts = loaded, "board loaded"),
    }

    let stdin = io::stdin();
    let mut reader = BufReader::new(stdin.lock());
    let stdout = io::stdout();
    let mut writer = stdout.lock();

    loop {
        let maybe = match read_message(&mut reader) {
            Ok(m) => m,
            Err(e) => {
                // Bad framing answers -32700 and the loop keeps reading.
                let err_resp = json!({
                    "jsonrpc": "2.0",
                    "id": null,
                    "error": { "code": -32700, "message": format!("Parse error: {e}") }
                });
                write_message(&mut writer, &err_resp)?;
                continue;
            }
        };
        let Some(request) = maybe else {
            break;
        };
        if let Some(response) = runtime.block_on(handle_request(&mut state, &request)) {
            write_message(&mut writer, &response)?;
        }
    }

    Ok(())
}

fn read_message<R: BufRead>(reader: &mut R) -> Result<Option<JsonValue>> {
    let mut content_length: Option<usize> = None;

    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line)?;
        if n == 0 {
            return Ok(None);
        }

        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            break;
        }

        if let Some((name, value)) = trimmed.split_once(':') {
            if name.eq_ignore_ascii_case("Content-Length") {
                content_length = Some(
                    value
                        .trim()
                        .parse::<usize>()
                        .context("invalid Content-Length")?,
                );
            }
        }
    }

    let len = content_length.context("missing Content-Length header")?;
    if len > MAX_MESSAGE_BYTES {
        // Skip the body so the next frame starts at a header.
        io::copy(&mut reader.by_ref().take(len as u64), &mut io::sink())?;
        anyhow::bail!(
            "Content-Length {} exceeds max allowed {} bytes",
            len,
            MAX_MESSAGE_BYTES
        );
    }
    let mut payload = vec![0_u8; len];
    reader.read_exact(&mut payload)?;
    let value: JsonValue = serde_json::from_slice(&payload).context("invalid JSON payload")?;
    Ok(Some(value))
}

fn write_message<W: Write>(writer: &mut W, value: &JsonValue) -> Result<()> {
    let payload = serde_json::to_vec(value)?;
    write!(writer, "Content-Length: {}\r\n\r\n", payload.len())?;
    writer.write_all(&payload)?;
    writer.flush()?;
    Ok(())
}

async fn handle_request(state: &mut AppState, req: &JsonValue) -> Option<JsonValue> {
    let id = req.get("id").cloned();
    let method = req.get("method").and_then(JsonValue::as_str)?;

    match method {
        "initialize" => id.map(|id_val| {
            json!({
                "jsonrpc": "2.0",
                "id": id_val,
                "result": {
                    "protocolVersion": "2024-11-05",
                    "capabilities": { "tools": {} },
                    "serverInfo": { "name": "til-mcp", "version": env!("CARGO_PKG_VERSION") }
                }
            })
        }),
        "notifications/initialized" => None,
        "tools/list" => id.map(|id_val| {
            json!({
                "jsonrpc": "2.0",
                "id": id_val,
                "result": { "tools": tools_schema() }
            })
        }),
        "tools/call" => {
            let id_val = id?;
            let response = match call_tool(state, req.get("params")).await {
                Ok(tool_result) => json!({
                    "jsonrpc": "2.0",
                    "id": id_val,
                    "result": tool_result
                }),
                Err(err) => json!({
                    "jsonrpc": "2.0",
                    "id": id_val,
                    "result": {
                        "content": [{ "type": "text", "text": format!("tool error: {err}") }],
                        "isError": true
                    }
                }),
            };
            Some(response)
        }
        "ping" => id.map(|id_val| json!({ "jsonrpc": "2.0", "id": id_val, "result": {} })),
        _ => id.map(|id_val| {
            json!({
                "jsonrpc": "2.0",
                "id": id_val,
                "error": {
                    "code": -32601,
                    "message": format!("method not found: {method}")
                }
            })
        }),
    }
}

fn tools_schema() -> Vec<JsonValue> {
    let vote_kinds: Vec<&str> = VoteKind::ALL.iter().map(|k| k.column()).collect();
    vec![
        json!({
            "name": "list_facts",
            "description": "List facts, most interesting first. Optionally filter by category (\"all\" for every category).",
            "inputSchema": {
                "type": "object",
                "properties": { "category": {"type": "string"} }
            }
        }),
        json!({
            "name": "categories",
            "description": "List the categories and their tag colors.",
            "inputSchema": { "type": "object", "properties": {} }
        }),
        json!({
            "name": "share_fact",
            "description": "Share a new fact (at most 200 characters) with an http(s) source and a category.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "text": {"type": "string"},
                    "source": {"type": "string"},
                    "category": {"type": "string"}
                },
                "required": ["text", "source", "category"]
            }
        }),
        json!({
            "name": "vote",
            "description": "Cast one vote on a listed fact.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "fact_id": {"type": "integer"},
                    "vote": {"type": "string", "enum": vote_kinds}
                },
                "required": ["fact_id", "vote"]
            }
        }),
        json!({
            "name": "toggle_form",
            "description": "Open or close the share-a-fact form.",
            "inputSchema": { "type": "object", "properties": {} }
        }),
        json!({
            "name": "view",
            "description": "Render the whole board as text.",
            "inputSchema": { "type": "object", "properties": {} }
        }),
    ]
}

async fn call_tool(state: &mut AppState, params: Option<&JsonValue>) -> Result<JsonValue> {
    let name = params
        .and_then(|v| v.get("name"))
        .and_then(JsonValue::as_str)
        .context("missing tool name")?;
    let args = params
        .and_then(|v| v.get("arguments"))
        .cloned()
        .unwrap_or_else(|| json!({}));
    let board = &mut state.board;

    match name {
        "list_facts" => {
            let requested = args
                .get("category")
                .and_then(JsonValue::as_str)
                .map(CategoryFilter::from);
            if let Some(name) = requested.as_ref().and_then(CategoryFilter::category) {
                if !board.categories().contains(name) {
                    anyhow::bail!("unknown category: {name}");
                }
            }
            let intent = match requested {
                Some(filter) if filter != board.state().filter => Intent::SelectCategory(filter),
                _ => Intent::Load,
            };
            board.dispatch(intent).await;
            if let Some(notice) = board.take_notice() {
                anyhow::bail!("{notice}");
            }
            let state = board.state();
            Ok(json!({
                "content": [{ "type": "text", "text": view::render_facts(state, board.categories()) }],
                "structuredContent": {
                    "filter": state.filter.to_string(),
                    "facts": state.facts
                }
            }))
        }
        "categories" => {
            let categories: Vec<JsonValue> = board
                .categories()
                .iter()
                .map(|c| json!({ "name": c.name, "color": c.color }))
                .collect();
            let state = board.state();
            Ok(json!({
                "content": [{ "type": "text", "text": view::render_categories(state, board.categories()) }],
                "structuredContent": { "categories": categories }
            }))
        }
        "share_fact" => {
            let form = FactForm {
                text: string_arg(&args, "text")?,
                source: string_arg(&args, "source")?,
                category: string_arg(&args, "category")?,
            };
            if !board.state().form.open {
                board.dispatch(Intent::ToggleForm).await;
            }
            let before = board.state().facts.len();
            board.dispatch(Intent::Submit(form)).await;
            if let Some(notice) = board.take_notice() {
                anyhow::bail!("{notice}");
            }
            let state = board.state();
            if state.facts.len() <= before {
                anyhow::bail!("the store did not accept the fact");
            }
            let created = &state.facts[0];
            Ok(json!({
                "content": [{ "type": "text", "text": format!("shared fact {}", created.id) }],
                "structuredContent": { "fact": created }
            }))
        }
        "vote" => {
            let fact_id = fact_id_arg(&args)?;
            let kind: VoteKind = args
                .get("vote")
                .and_then(JsonValue::as_str)
                .context("vote is required")?
                .parse()
                .map_err(anyhow::Error::msg)?;
            let before = board
                .state()
                .fact(fact_id)
                .with_context(|| format!("fact {fact_id} is not on the board; call list_facts first"))?
                .votes(kind);
            board.dispatch(Intent::Vote { fact_id, kind }).await;
            let fact = board
                .state()
                .fact(fact_id)
                .with_context(|| format!("fact {fact_id} left the board"))?;
            if fact.votes(kind) == before {
                anyhow::bail!("vote on fact {fact_id} was not recorded");
            }
            Ok(json!({
                "content": [{ "type": "text", "text": view::render_fact(fact, board.categories(), false) }],
                "structuredContent": { "fact": fact }
            }))
        }
        "toggle_form" => {
            let state = board.dispatch(Intent::ToggleForm).await;
            let open = state.form.open;
            let text = format!(
                "{}\n{}",
                view::render_header(board.state()),
                view::render_form(board.state(), None, board.categories())
            );
            Ok(json!({
                "content": [{ "type": "text", "text": text.trim_end() }],
                "structuredContent": { "open": open }
            }))
        }
        "view" => {
            let state = board.state();
            Ok(json!({
                "content": [{ "type": "text", "text": board.render() }],
                "structuredContent": {
                    "filter": state.filter.to_string(),
                    "loading": state.loading,
                    "form_open": state.form.open,
                    "facts": state.facts
                }
            }))
        }
        _ => anyhow::bail!("unknown tool: {name}"),
    }
}

fn string_arg(args: &JsonValue, key: &str) -> Result<String> {
    let value = args
        .get(key)
        .and_then(JsonValue::as_str)
        .with_context(|| format!("{key} is required"))?;
    if value.len() > MAX_FIELD_BYTES {
        anyhow::bail!("{key} exceeds max allowed size ({MAX_FIELD_BYTES} bytes)");
    }
    Ok(value.to_string())
}

fn fact_id_arg(args: &JsonValue) -> Result<FactId> {
    match args.get("fact_id") {
        Some(JsonValue::Number(n)) => n.as_i64().map(FactId).context("fact_id must be an integer"),
        Some(JsonValue::String(s)) => s.parse().context("fact_id must be an integer"),
        _ => anyhow::bail!("fact_id is required"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::NamedTempFile;
    use til_store::LocalFactStore;

    fn temp_state() -> (AppState, NamedTempFile) {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_string_lossy().to_string();
        let state = AppState {
            board: FactBoard::new(Backend::Local(LocalFactStore::open(&path).unwrap())),
        };
        (state, file)
    }

    async fn call(state: &mut AppState, name: &str, arguments: JsonValue) -> Result<JsonValue> {
        call_tool(state, Some(&json!({ "name": name, "arguments": arguments }))).await
    }

    async fn share(state: &mut AppState, text: &str, category: &str) -> i64 {
        let out = call(
            state,
            "share_fact",
            json!({ "text": text, "source": "https://example.com", "category": category }),
        )
        .await
        .unwrap();
        out["structuredContent"]["fact"]["id"].as_i64().unwrap()
    }

    #[tokio::test]
    async fn share_then_list_returns_facts() {
        let (mut state, _tmp) = temp_state();
        let id = share(&mut state, "Sloths can hold their breath for 40 minutes", "science").await;
        assert_eq!(id, 1);
        assert!(!state.board.state().form.open, "form closes after sharing");

        let out = call(&mut state, "list_facts", json!({})).await.unwrap();
        let facts = out["structuredContent"]["facts"].as_array().unwrap();
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0]["votesInteresting"], 0);
    }

    #[tokio::test]
    async fn list_facts_filters_by_category() {
        let (mut state, _tmp) = temp_state();
        share(&mut state, "a", "science").await;
        share(&mut state, "b", "news").await;

        let out = call(&mut state, "list_facts", json!({ "category": "news" }))
            .await
            .unwrap();
        assert_eq!(out["structuredContent"]["filter"], "news");
        let facts = out["structuredContent"]["facts"].as_array().unwrap();
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0]["category"], "news");

        let err = call(&mut state, "list_facts", json!({ "category": "astrology" }))
            .await
            .expect_err("unknown category must fail");
        assert!(err.to_string().contains("unknown category"));
    }

    #[tokio::test]
    async fn share_fact_rejects_invalid_source() {
        let (mut state, _tmp) = temp_state();
        let err = call(
            &mut state,
            "share_fact",
            json!({ "text": "ok", "source": "not-a-url", "category": "science" }),
        )
        .await
        .expect_err("invalid source must fail");
        assert!(err.to_string().contains("http or https"));
        assert!(state.board.state().facts.is_empty());
    }

    #[tokio::test]
    async fn share_fact_rejects_oversized_field() {
        let (mut state, _tmp) = temp_state();
        let huge = "a".repeat(MAX_FIELD_BYTES + 1);
        let err = call(
            &mut state,
            "share_fact",
            json!({ "text": huge, "source": "https://x.com", "category": "science" }),
        )
        .await
        .expect_err("oversized text must fail");
        assert!(err.to_string().contains("text exceeds max"));
    }

    #[tokio::test]
    async fn vote_increments_one_counter() {
        let (mut state, _tmp) = temp_state();
        let id = share(&mut state, "Venus spins backwards", "science").await;

        let out = call(
            &mut state,
            "vote",
            json!({ "fact_id": id, "vote": "votesMindblowing" }),
        )
        .await
        .unwrap();
        assert_eq!(out["structuredContent"]["fact"]["votesMindblowing"], 1);
        assert_eq!(out["structuredContent"]["fact"]["votesInteresting"], 0);

        let out = call(
            &mut state,
            "vote",
            json!({ "fact_id": id.to_string(), "vote": "mindblowing" }),
        )
        .await
        .unwrap();
        assert_eq!(out["structuredContent"]["fact"]["votesMindblowing"], 2);
    }

    #[tokio::test]
    async fn vote_on_unknown_fact_fails() {
        let (mut state, _tmp) = temp_state();
        let err = call(&mut state, "vote", json!({ "fact_id": 99, "vote": "false" }))
            .await
            .expect_err("unknown fact must fail");
        assert!(err.to_string().contains("not on the board"));

        let err = call(&mut state, "vote", json!({ "fact_id": 1, "vote": "boring" }))
            .await
            .expect_err("unknown vote kind must fail");
        assert!(err.to_string().contains("unknown vote kind"));
    }

    #[tokio::test]
    async fn toggle_form_flips_open_state() {
        let (mut state, _tmp) = temp_state();
        let out = call(&mut state, "toggle_form", json!({})).await.unwrap();
        assert_eq!(out["structuredContent"]["open"], true);
        let text = out["content"][0]["text"].as_str().unwrap();
        assert!(text.starts_with("Today I Learned  [Close]"));
        assert!(text.contains("Share a fact with the world..."));
        assert!(!text.contains("characters left"));

        let out = call(&mut state, "toggle_form", json!({})).await.unwrap();
        assert_eq!(out["structuredContent"]["open"], false);
    }

    #[tokio::test]
    async fn categories_lists_the_default_table() {
        let (mut state, _tmp) = temp_state();
        let out = call(&mut state, "categories", json!({})).await.unwrap();
        let categories = out["structuredContent"]["categories"].as_array().unwrap();
        assert_eq!(categories.len(), 8);
        assert_eq!(categories[0]["name"], "technology");
        assert_eq!(categories[0]["color"], "#3b82f6");
    }

    #[tokio::test]
    async fn unknown_method_and_tool_are_reported() {
        let (mut state, _tmp) = temp_state();
        let resp = handle_request(
            &mut state,
            &json!({ "jsonrpc": "2.0", "id": 1, "method": "resources/list" }),
        )
        .await
        .unwrap();
        assert_eq!(resp["error"]["code"], -32601);

        let resp = handle_request(
            &mut state,
            &json!({
                "jsonrpc": "2.0",
                "id": 2,
                "method": "tools/call",
                "params": { "name": "delete_fact", "arguments": {} }
            }),
        )
        .await
        .unwrap();
        assert_eq!(resp["result"]["isError"], true);
    }

    #[tokio::test]
    async fn notifications_get_no_response() {
        let (mut state, _tmp) = temp_state();
        let resp = handle_request(
            &mut state,
            &json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }),
        )
        .await;
        assert!(resp.is_none());
    }

    #[test]
    fn read_message_rejects_oversized_frame() {
        let raw = format!("Content-Length: {}\r\n\r\n", MAX_MESSAGE_BYTES + 1);
        let mut cursor = Cursor::new(raw.into_bytes());
        let err = read_message(&mut cursor).expect_err("oversized frame must fail");
        assert!(err.to_string().contains("exceeds max allowed"));
    }

    #[test]
    fn oversized_frame_does_not_swallow_next_request() {
        let mut raw = format!("Content-Length: {}\r\n\r\n", MAX_MESSAGE_BYTES + 1).into_bytes();
        raw.extend(std::iter::repeat(b'x').take(MAX_MESSAGE_BYTES + 1));
        write_message(&mut raw, &json!({ "jsonrpc": "2.0", "id": 9, "method": "ping" })).unwrap();

        let mut cursor = Cursor::new(raw);
        let err = read_message(&mut cursor).expect_err("oversized frame must fail");
        assert!(err.to_string().contains("exceeds max allowed"));

        let next = read_message(&mut cursor).unwrap().unwrap();
        assert_eq!(next["id"], 9);
        assert_eq!(next["method"], "ping");
    }

    #[test]
    fn write_then_read_message_frames_payload() {
        let mut buf = Vec::new();
        write_message(&mut buf, &json!({ "jsonrpc": "2.0", "id": 5, "method": "ping" })).unwrap();
        let mut cursor = Cursor::new(buf);
        let msg = read_message(&mut cursor).unwrap().unwrap();
        assert_eq!(msg["method"], "ping");
        assert!(read_message(&mut cursor).unwrap().is_none());
    }
}
