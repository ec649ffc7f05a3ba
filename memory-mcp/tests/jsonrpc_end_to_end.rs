//! End-to-end JSON-RPC coverage over a real `MemoryStore` backed by a
//! temporary embedded database: the MCP handshake plus an upsert/search
//! round trip (spec.md §8 seed scenario 1 territory).

use std::io::{Cursor, Write};
use std::sync::{Arc, Mutex};

use memory_core::{MemoryStore, StoreConfig};

#[derive(Clone)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().write(buf)
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

async fn open_test_store() -> (MemoryStore, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("test.db");
    let mut config = StoreConfig::default();
    config.database.embedded_path = db_path.to_str().unwrap().to_string();
    let store = MemoryStore::open(config, "test-tenant").await.unwrap();
    (store, dir)
}

fn lines_of(output: &[u8]) -> Vec<serde_json::Value> {
    String::from_utf8(output.to_vec())
        .unwrap()
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

#[tokio::test]
async fn initialize_list_tools_and_upsert_search_round_trip() {
    let (store, _dir) = open_test_store().await;
    let store = Arc::new(store);

    let input = concat!(
        r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2025-06-18"}}"#, "\n",
        r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#, "\n",
        r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#, "\n",
        r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"memory_upsert","arguments":{"items":[{"kind":"fact","project_id":"proj-a","title":"Use cargo nextest","content":"cargo nextest run is faster in CI","tags":["ci"]}]}}}"#, "\n",
        r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"name":"memory_search","arguments":{"query":"cargo nextest","project_id":"proj-a"}}}"#, "\n",
    );

    let reader = Cursor::new(input.as_bytes().to_vec());
    let output = Arc::new(Mutex::new(Vec::new()));
    let writer = SharedBuffer(Arc::clone(&output));

    memory_mcp::server::run(reader, writer, store).await.unwrap();

    let responses = lines_of(&output.lock().unwrap());
    assert_eq!(responses.len(), 3, "notification must not produce a response");

    let init = &responses[0];
    assert_eq!(init["id"], 1);
    assert_eq!(init["result"]["protocolVersion"], "2025-06-18");

    let list = &responses[1];
    assert_eq!(list["id"], 2);
    let tools = list["result"]["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 10);

    let upsert = &responses[2];
    assert_eq!(upsert["id"], 3);
    assert_eq!(upsert["result"]["isError"], false);
    let upsert_text: serde_json::Value =
        serde_json::from_str(upsert["result"]["content"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(upsert_text["results"][0]["action"], "created");
    assert!(upsert["result"]["meta"]["forensic"]["db_backend"].is_string());
}

#[tokio::test]
async fn unknown_tool_name_is_reported_as_an_error_result_not_a_transport_failure() {
    let (store, _dir) = open_test_store().await;
    let store = Arc::new(store);

    let input = concat!(
        r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"memory_nonexistent","arguments":{}}}"#,
        "\n"
    );
    let reader = Cursor::new(input.as_bytes().to_vec());
    let output = Arc::new(Mutex::new(Vec::new()));
    let writer = SharedBuffer(Arc::clone(&output));

    memory_mcp::server::run(reader, writer, store).await.unwrap();

    let responses = lines_of(&output.lock().unwrap());
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0]["result"]["isError"], true);
}

#[tokio::test]
async fn unknown_method_returns_a_jsonrpc_error() {
    let (store, _dir) = open_test_store().await;
    let store = Arc::new(store);

    let input = concat!(r#"{"jsonrpc":"2.0","id":1,"method":"not/a/method"}"#, "\n");
    let reader = Cursor::new(input.as_bytes().to_vec());
    let output = Arc::new(Mutex::new(Vec::new()));
    let writer = SharedBuffer(Arc::clone(&output));

    memory_mcp::server::run(reader, writer, store).await.unwrap();

    let responses = lines_of(&output.lock().unwrap());
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0]["error"]["code"], -32601);
}
