//! End-to-end tests over real TCP: a server task per test, a line-oriented
//! JSON client, and the full shell → engine → store path underneath.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::FixedOffset;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};

use labslot::config::Catalog;
use labslot::engine::Scheduler;
use labslot::notify::NotifyHub;
use labslot::store::MemoryStore;
use labslot::wire::{self, Shell};

async fn spawn_server() -> SocketAddr {
    spawn_server_with_catalog(Catalog::builtin()).await
}

async fn spawn_server_with_catalog(catalog: Catalog) -> SocketAddr {
    let notify = Arc::new(NotifyHub::new());
    let scheduler = Arc::new(Scheduler::new(
        Arc::new(MemoryStore::new()),
        notify.clone(),
        FixedOffset::east_opt(0).unwrap(),
        Duration::from_secs(1),
    ));
    let shell = Arc::new(Shell {
        scheduler,
        catalog: Arc::new(catalog),
        notify,
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                break;
            };
            let shell = shell.clone();
            tokio::spawn(async move {
                let _ = wire::process_connection(socket, shell).await;
            });
        }
    });
    addr
}

struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Client {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read, writer) = stream.into_split();
        Self {
            reader: BufReader::new(read),
            writer,
        }
    }

    async fn send(&mut self, request: Value) {
        let line = format!("{request}\n");
        self.writer.write_all(line.as_bytes()).await.unwrap();
    }

    async fn recv(&mut self) -> Value {
        let mut line = String::new();
        self.reader.read_line(&mut line).await.unwrap();
        serde_json::from_str(&line).unwrap()
    }

    async fn roundtrip(&mut self, request: Value) -> Value {
        self.send(request).await;
        self.recv().await
    }
}

// Dates far in the future so "today" checks never interfere.
fn book(user: &str, equipment: &str, date: &str, start: &str, end: &str) -> Value {
    json!({
        "op": "book",
        "user": user,
        "equipment": equipment,
        "date": date,
        "start": start,
        "end": end,
    })
}

#[tokio::test]
async fn book_conflict_and_cancel_roundtrip() {
    let addr = spawn_server().await;
    let mut client = Client::connect(addr).await;

    let reply = client
        .roundtrip(book(
            "Alice",
            "PalmSens (4 Channels)",
            "2124-06-01",
            "09:00:00",
            "10:00:00",
        ))
        .await;
    assert_eq!(reply["status"], "booked");
    assert_eq!(reply["reservation"]["user"], "Alice");
    assert_eq!(reply["reservation"]["date"], "2124-06-01");

    // Overlap on the same equipment and date names the occupant.
    let reply = client
        .roundtrip(book(
            "Bob",
            "PalmSens (4 Channels)",
            "2124-06-01",
            "09:30:00",
            "10:30:00",
        ))
        .await;
    assert_eq!(reply["status"], "error");
    assert_eq!(reply["code"], "conflict");
    assert_eq!(reply["occupant"], "Alice");

    // Back-to-back is fine.
    let reply = client
        .roundtrip(book(
            "Bob",
            "PalmSens (4 Channels)",
            "2124-06-01",
            "10:00:00",
            "11:00:00",
        ))
        .await;
    assert_eq!(reply["status"], "booked");

    let reply = client.roundtrip(json!({ "op": "schedule" })).await;
    assert_eq!(reply["status"], "schedule");
    let rows = reply["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["user"], "Alice"); // sorted by (date, start)

    let reply = client
        .roundtrip(json!({
            "op": "cancel",
            "user": "Alice",
            "equipment": "PalmSens (4 Channels)",
            "date": "2124-06-01",
            "start": "09:00:00",
        }))
        .await;
    assert_eq!(reply["status"], "cancelled");

    let reply = client.roundtrip(json!({ "op": "schedule" })).await;
    let rows = reply["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["user"], "Bob");
}

#[tokio::test]
async fn validation_happens_before_the_engine() {
    let addr = spawn_server().await;
    let mut client = Client::connect(addr).await;

    let reply = client
        .roundtrip(book("", "Portable Pstat", "2124-06-01", "09:00:00", "10:00:00"))
        .await;
    assert_eq!(reply["code"], "missing_user");

    let reply = client
        .roundtrip(book("Alice", "SEM", "2124-06-01", "09:00:00", "10:00:00"))
        .await;
    assert_eq!(reply["code"], "unknown_equipment");

    let reply = client
        .roundtrip(book(
            "Alice",
            "Portable Pstat",
            "2000-01-01",
            "09:00:00",
            "10:00:00",
        ))
        .await;
    assert_eq!(reply["code"], "past_date");

    // Malformed window reaches the engine and comes back typed.
    let reply = client
        .roundtrip(book(
            "Carol",
            "DropSens (Old)",
            "2124-01-01",
            "08:00:00",
            "07:00:00",
        ))
        .await;
    assert_eq!(reply["code"], "invalid_window");
}

#[tokio::test]
async fn roster_limits_who_can_book() {
    let catalog = Catalog {
        team: vec!["Alice".into()],
        ..Catalog::builtin()
    };
    let addr = spawn_server_with_catalog(catalog).await;
    let mut client = Client::connect(addr).await;

    let reply = client
        .roundtrip(book(
            "Mallory",
            "Portable Pstat",
            "2124-06-01",
            "09:00:00",
            "10:00:00",
        ))
        .await;
    assert_eq!(reply["code"], "unknown_user");
}

#[tokio::test]
async fn unparseable_lines_get_a_typed_error() {
    let addr = spawn_server().await;
    let mut client = Client::connect(addr).await;

    client
        .writer
        .write_all(b"this is not json\n")
        .await
        .unwrap();
    let reply = client.recv().await;
    assert_eq!(reply["status"], "error");
    assert_eq!(reply["code"], "bad_request");

    // The connection survives a bad line.
    let reply = client.roundtrip(json!({ "op": "equipment" })).await;
    assert_eq!(reply["status"], "equipment");
    assert!(
        reply["equipment"]
            .as_array()
            .unwrap()
            .contains(&json!("Portable Pstat"))
    );
}

#[tokio::test]
async fn mine_lists_only_that_users_rows() {
    let addr = spawn_server().await;
    let mut client = Client::connect(addr).await;

    client
        .roundtrip(book(
            "Alice",
            "Portable Pstat",
            "2124-06-01",
            "09:00:00",
            "10:00:00",
        ))
        .await;
    client
        .roundtrip(book(
            "Bob",
            "Portable Pstat",
            "2124-06-01",
            "10:00:00",
            "11:00:00",
        ))
        .await;

    let reply = client.roundtrip(json!({ "op": "mine", "user": "Alice" })).await;
    assert_eq!(reply["status"], "mine");
    let rows = reply["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["user"], "Alice");
}

#[tokio::test]
async fn watchers_see_bookings_as_they_land() {
    let addr = spawn_server().await;

    let mut watcher = Client::connect(addr).await;
    let reply = watcher
        .roundtrip(json!({ "op": "watch", "equipment": "DropSens (Old)" }))
        .await;
    assert_eq!(reply["status"], "watching");

    let mut booker = Client::connect(addr).await;
    let reply = booker
        .roundtrip(book(
            "Alice",
            "DropSens (Old)",
            "2124-06-01",
            "09:00:00",
            "10:00:00",
        ))
        .await;
    assert_eq!(reply["status"], "booked");

    let event = watcher.recv().await;
    assert_eq!(event["status"], "event");
    assert_eq!(event["event"]["kind"], "booked");
    assert_eq!(event["event"]["reservation"]["user"], "Alice");

    // Watching does not block further requests on the same connection.
    let reply = watcher.roundtrip(json!({ "op": "schedule" })).await;
    assert_eq!(reply["status"], "schedule");
}

#[tokio::test]
async fn cancel_by_id_round_trips() {
    let addr = spawn_server().await;
    let mut client = Client::connect(addr).await;

    let reply = client
        .roundtrip(book(
            "Dana",
            "PalmSens (8 Channels)",
            "2124-06-01",
            "14:00:00",
            "15:00:00",
        ))
        .await;
    let id = reply["reservation"]["id"].as_str().unwrap().to_string();

    let reply = client
        .roundtrip(json!({ "op": "cancel_by_id", "id": id }))
        .await;
    assert_eq!(reply["status"], "cancelled");

    let reply = client.roundtrip(json!({ "op": "schedule" })).await;
    assert!(reply["rows"].as_array().unwrap().is_empty());
}
