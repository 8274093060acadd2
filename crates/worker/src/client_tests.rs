// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use cook_adapters::MemoryTransport;
use cook_director::protocol::{AbortItems, AssignItems};
use cook_engine::FakeExecutor;

fn configure(targets: &[&str]) -> Configure {
    Configure {
        targets: targets.iter().map(|t| TargetName::new(*t)).collect(),
        build_command: Some("true".to_string()),
        ..Configure::default()
    }
}

/// Worker and director ends of a fresh connection.
fn pair() -> (Box<dyn Transport>, Connection) {
    let (worker, director) = MemoryTransport::pair("director", "worker");
    (Box::new(worker), Connection::new(Box::new(director)))
}

async fn recv(connection: &mut Connection) -> Message {
    for _ in 0..400 {
        if let Some(msg) = connection.receive().unwrap() {
            return msg;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("no message arrived");
}

fn names(items: &[&str]) -> Vec<ItemName> {
    items.iter().map(|n| ItemName::new(*n)).collect()
}

/// A client that has completed its handshake, plus the director's end.
async fn connected(targets: &[&str]) -> (WorkerClient, Connection) {
    let (transport, mut director) = pair();
    director
        .send(&Message::Configure(configure(targets)))
        .unwrap();
    let client = WorkerClient::handshake(transport, 2, Some(Duration::from_secs(5)))
        .await
        .unwrap();
    assert_eq!(
        recv(&mut director).await,
        Message::WorkerConnect(WorkerConnect { remote_index: 2 })
    );
    (client, director)
}

/// Collect results until `count` items have been reported.
async fn results(director: &mut Connection, count: usize) -> Vec<ItemResult> {
    let mut items = Vec::new();
    while items.len() < count {
        match recv(director).await {
            Message::Results(results) => items.extend(results.items),
            other => panic!("expected results, got {other:?}"),
        }
    }
    items
}

#[tokio::test]
async fn handshake_receives_configuration() {
    let (client, _director) = connected(&["linux", "win64"]).await;

    assert_eq!(client.index(), 2);
    assert_eq!(client.configure().targets.len(), 2);
    assert_eq!(client.configure().build_command.as_deref(), Some("true"));
}

#[tokio::test]
async fn handshake_times_out_without_configuration() {
    let (transport, _director) = pair();

    let err = WorkerClient::handshake(transport, 0, Some(Duration::from_millis(50)))
        .await
        .err()
        .unwrap();

    assert!(matches!(err, ClientError::ConnectTimeout { .. }), "{err}");
}

#[tokio::test]
async fn handshake_rejects_other_first_message() {
    let (transport, mut director) = pair();
    director.send(&Message::assign(names(&["a"]))).unwrap();

    let err = WorkerClient::handshake(transport, 0, Some(Duration::from_secs(5)))
        .await
        .err()
        .unwrap();

    assert!(matches!(err, ClientError::UnexpectedMessage { .. }), "{err}");
}

#[tokio::test]
async fn handshake_fails_when_director_is_gone() {
    let (transport, director) = pair();
    drop(director);

    let result = WorkerClient::handshake(transport, 0, Some(Duration::from_secs(5))).await;

    assert!(result.is_err());
}

#[tokio::test]
async fn connect_gives_up_after_timeout() {
    // Port 1 on loopback refuses connections.
    let err = WorkerClient::connect("127.0.0.1:1", 0, Some(Duration::from_millis(50)))
        .await
        .err()
        .unwrap();

    assert!(matches!(err, ClientError::Connect { .. }), "{err}");
}

#[tokio::test]
async fn assigned_items_are_built_and_reported() {
    let (mut client, mut director) = connected(&["linux"]).await;
    let executor = FakeExecutor::new();
    director
        .send(&Message::assign(names(&["a", "b"])))
        .unwrap();

    let script = async {
        let items = results(&mut director, 2).await;
        director.send(&Message::abort_worker()).unwrap();
        let ack = recv(&mut director).await;
        (items, ack)
    };
    let (summary, (items, ack)) = tokio::join!(client.run(&executor), script);

    let summary = summary.unwrap();
    assert_eq!(summary.reason, StopReason::DirectorRequested);
    assert_eq!(summary.built, 2);
    assert_eq!(ack, Message::abort_worker());
    assert_eq!(items[0].name, "a");
    assert_eq!(items[1].name, "b");
    assert_eq!(items[0].per_target.len(), 1);
    assert!(items[0].per_target[0].succeeded);
    assert_eq!(items[0].suppress_reason, None);
}

#[tokio::test]
async fn failed_build_is_reported_not_raised() {
    let (mut client, mut director) = connected(&["linux", "win64"]).await;
    let executor = FakeExecutor::new();
    executor.fail_save("a", "win64");
    director.send(&Message::assign(names(&["a"]))).unwrap();

    let script = async {
        let items = results(&mut director, 1).await;
        director.send(&Message::abort_worker()).unwrap();
        items
    };
    let (summary, items) = tokio::join!(client.run(&executor), script);

    assert!(summary.is_ok());
    let builds = &items[0].per_target;
    assert_eq!(builds.len(), 2);
    assert_eq!(builds.iter().filter(|b| b.succeeded).count(), 1);
}

#[tokio::test]
async fn suppressed_item_carries_its_reason() {
    let (mut client, mut director) = connected(&["linux"]).await;
    let executor = FakeExecutor::new();
    executor.suppress("a", "editor only");
    director.send(&Message::assign(names(&["a"]))).unwrap();

    let script = async {
        let items = results(&mut director, 1).await;
        director.send(&Message::abort_worker()).unwrap();
        items
    };
    let (_, items) = tokio::join!(client.run(&executor), script);

    assert_eq!(items[0].suppress_reason.as_deref(), Some("editor only"));
    assert!(items[0].per_target.is_empty());
    assert_eq!(executor.loads_for("a"), 0);
}

#[tokio::test]
async fn aborted_items_are_not_built() {
    let (mut client, mut director) = connected(&["linux"]).await;
    let executor = FakeExecutor::new();
    director
        .send(&Message::assign(names(&["a", "b", "c"])))
        .unwrap();
    director
        .send(&Message::AbortItems(AbortItems {
            names: names(&["b"]),
        }))
        .unwrap();

    let script = async {
        let items = results(&mut director, 2).await;
        director.send(&Message::abort_worker()).unwrap();
        items
    };
    let (_, items) = tokio::join!(client.run(&executor), script);

    let reported: Vec<_> = items.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(reported, vec!["a", "c"]);
    assert_eq!(executor.loads_for("b"), 0);
}

#[tokio::test]
async fn duplicate_assignment_builds_once() {
    let (mut client, mut director) = connected(&["linux"]).await;
    let executor = FakeExecutor::new();
    director
        .send(&Message::AssignItems(AssignItems {
            names: names(&["a", "a"]),
        }))
        .unwrap();

    let script = async {
        let items = results(&mut director, 1).await;
        director.send(&Message::abort_worker()).unwrap();
        items
    };
    let (summary, _) = tokio::join!(client.run(&executor), script);

    assert_eq!(summary.unwrap().built, 1);
    assert_eq!(executor.loads_for("a"), 1);
}

#[tokio::test]
async fn closed_connection_ends_the_run() {
    let (mut client, director) = connected(&["linux"]).await;
    drop(director);

    let summary = client.run(&FakeExecutor::new()).await.unwrap();

    assert_eq!(summary.reason, StopReason::DirectorClosed);
    assert_eq!(summary.built, 0);
}

#[tokio::test]
async fn unexpected_message_is_an_error() {
    let (mut client, mut director) = connected(&["linux"]).await;
    director
        .send(&Message::WorkerConnect(WorkerConnect { remote_index: 9 }))
        .unwrap();

    let err = client.run(&FakeExecutor::new()).await.unwrap_err();

    assert!(matches!(err, ClientError::UnexpectedMessage { .. }), "{err}");
}

#[tokio::test]
async fn notify_shutdown_announces_abort() {
    let (mut client, mut director) = connected(&["linux"]).await;

    client.notify_shutdown().unwrap();

    assert_eq!(recv(&mut director).await, Message::abort_worker());
}
