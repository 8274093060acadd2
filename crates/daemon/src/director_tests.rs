// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::protocol::{AbortItems, AssignItems, Configure, ItemResult, ProtocolError, Results};
use cook_adapters::{FakeLauncher, MemoryAcceptor, MemoryConnector};
use cook_core::test_support::{targets, CompletionLog};
use cook_core::{CookOutcome, FakeClock, ItemState, TargetBuild, TargetName};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const STALL_AFTER: Duration = Duration::from_secs(5);

struct Harness {
    clock: FakeClock,
    launcher: FakeLauncher,
    connector: MemoryConnector,
    store: WorkItemStore,
    director: Director<FakeClock>,
    log: CompletionLog,
}

fn options(workers: u32) -> DirectorOptions {
    DirectorOptions {
        worker_count: workers,
        visibility: WorkerVisibility::SeparateLogs,
        shutdown_poll: Duration::from_millis(1),
        stall_warn_after: STALL_AFTER,
        stall_warn_interval: STALL_AFTER,
        server: WorkerServerConfig {
            connect_timeout: Some(CONNECT_TIMEOUT),
            disconnect_timeout: Some(Duration::from_secs(5)),
            liveness_interval: Duration::from_secs(1),
            configure: Configure {
                targets: vec![TargetName::new("linux")],
                ..Configure::default()
            },
        },
        ..DirectorOptions::default()
    }
}

fn harness_with(options: DirectorOptions) -> Harness {
    let clock = FakeClock::new();
    let launcher = FakeLauncher::new();
    let (acceptor, connector) = MemoryAcceptor::new();
    let director = Director::new(
        options,
        Box::new(acceptor),
        Box::new(launcher.clone()),
        clock.clone(),
    );
    Harness {
        clock,
        launcher,
        connector,
        store: WorkItemStore::new(),
        director,
        log: CompletionLog::new(),
    }
}

fn harness(workers: u32) -> Harness {
    harness_with(options(workers))
}

impl Harness {
    fn tick(&mut self) {
        self.director.tick(&mut self.store, false);
    }

    /// Request items and pop them, ready for assignment.
    fn request(&mut self, names: &[&str]) -> Vec<(ItemId, ItemName)> {
        let mut items = Vec::new();
        for name in names {
            let id = self.store.find_or_create(*name);
            self.store
                .set_request(id, targets(&["linux"]), false, Some(self.log.callback()))
                .unwrap();
            assert_eq!(self.store.pop_next_request(), Some(id));
            items.push((id, ItemName::new(*name)));
        }
        items
    }

    /// Assign popped items the way the runtime does.
    fn assign(&mut self, items: &[(ItemId, ItemName)]) -> Vec<WorkerId> {
        let decisions = self.director.assign_requests(items);
        for ((id, _), worker) in items.iter().zip(&decisions) {
            if !worker.is_local() {
                self.store.assign_to_worker(*id, *worker).unwrap();
            }
        }
        decisions
    }

    /// Open a connection and send a handshake; returns the worker's end.
    fn dial(&self, index: u32) -> Connection {
        let mut worker = Connection::new(Box::new(self.connector.connect()));
        worker
            .send(&Message::WorkerConnect(WorkerConnect {
                remote_index: index,
            }))
            .unwrap();
        worker
    }

    /// Complete the handshake for a launched slot.
    fn connect(&mut self, index: u32) -> Connection {
        let mut worker = self.dial(index);
        self.tick();
        assert_eq!(
            self.director.worker_status(index),
            Some(ConnectStatus::Connected)
        );
        assert!(matches!(
            worker.receive().unwrap(),
            Some(Message::Configure(_))
        ));
        worker
    }
}

fn remote(index: u32) -> WorkerId {
    WorkerId::remote(index)
}

#[test]
fn zero_workers_keeps_everything_local() {
    let mut h = harness(0);
    let items = h.request(&["a", "b", "c", "d", "e", "f", "g", "h", "i", "j"]);

    let decisions = h.assign(&items);

    assert_eq!(decisions, vec![WorkerId::Local; 10]);
    h.tick();
    assert!(h.launcher.launches().is_empty());
}

#[test]
fn striped_assignment_across_two_workers() {
    let mut h = harness(2);
    let items = h.request(&["a", "b", "c", "d", "e", "f", "g", "h", "i"]);

    let decisions = h.assign(&items);

    let local = WorkerId::Local;
    assert_eq!(
        decisions,
        vec![local, remote(0), remote(1), local, remote(0), remote(1), local, remote(0), remote(1)]
    );
    assert_eq!(h.director.active_indices(), vec![0, 1]);
}

#[test]
fn first_tick_launches_every_worker() {
    let mut h = harness(2);
    let items = h.request(&["a"]);
    h.assign(&items);

    h.tick();

    let launches = h.launcher.launches();
    assert_eq!(launches.len(), 2);
    let args = &launches[1].args;
    assert!(args.windows(2).any(|w| w == ["--worker-index", "1"]));
    assert!(args.windows(2).any(|w| w == ["--director", "memory"]));
    assert!(args.windows(2).any(|w| w == ["--visibility", "separate-logs"]));
    assert!(!args.contains(&"--no-timeouts".to_string()));
    assert_eq!(h.director.worker_status(0), Some(ConnectStatus::WaitForConnect));
}

#[test]
fn launch_command_carries_log_dir_and_no_timeouts() {
    let mut h = harness_with(DirectorOptions {
        log_dir: Some(PathBuf::from("/tmp/cook-logs")),
        no_timeouts: true,
        ..options(1)
    });
    let items = h.request(&["a"]);
    h.assign(&items);
    h.tick();

    let args = &h.launcher.launches()[0].args;
    assert!(args.windows(2).any(|w| w == ["--log-dir", "/tmp/cook-logs"]));
    assert!(args.contains(&"--no-timeouts".to_string()));
}

#[test]
fn staged_items_are_sent_after_the_handshake() {
    let mut h = harness(1);
    let items = h.request(&["a", "b", "c", "d"]);
    h.assign(&items);
    h.tick();
    let mut worker = h.connect(0);

    h.tick();

    match worker.receive().unwrap() {
        Some(Message::AssignItems(AssignItems { names })) => {
            assert_eq!(names, vec![ItemName::new("b"), ItemName::new("d")]);
        }
        other => panic!("expected assignments, got {other:?}"),
    }
}

#[test]
fn disconnected_worker_returns_its_items() {
    let mut h = harness(1);
    let items = h.request(&["w", "x"]);
    let decisions = h.assign(&items);
    assert_eq!(decisions[1], remote(0));
    let x = items[1].0;
    h.tick();
    let worker = h.connect(0);
    h.tick();

    drop(worker);
    h.tick();

    let item = h.store.item(x).unwrap();
    assert_eq!(item.state(), ItemState::Request);
    assert_eq!(item.assignment(), None);
    assert!(h.store.request_queue().is_queued(x));
    assert_eq!(h.director.worker_status(0), None);

    h.director.set_worker_count(0);
    assert_eq!(h.store.pop_next_request(), Some(x));
    let decisions = h.assign(&[items[1].clone()]);
    assert_eq!(decisions, vec![WorkerId::Local]);
}

#[test]
fn lost_connected_worker_is_replaced() {
    let mut h = harness(1);
    let items = h.request(&["a"]);
    h.assign(&items);
    h.tick();
    drop(h.connect(0));
    h.tick();
    assert_eq!(h.director.worker_count(), 1);

    let more = h.request(&["b", "c"]);
    let decisions = h.assign(&more);
    h.tick();

    assert_eq!(decisions, vec![WorkerId::Local, remote(0)]);
    assert_eq!(h.launcher.num_processes(), 2);
}

#[test]
fn launch_failure_closes_the_slot_for_the_session() {
    let mut h = harness(2);
    h.launcher.refuse_launches("no binary");
    let items = h.request(&["a", "b", "c"]);
    h.assign(&items);

    h.tick();

    assert_eq!(h.director.worker_count(), 0);
    assert!(h.director.active_indices().is_empty());
    for (id, _) in &items[1..] {
        assert_eq!(h.store.item(*id).unwrap().assignment(), None);
        assert!(h.store.request_queue().is_queued(*id));
    }

    let retry = items[1..].to_vec();
    for _ in &retry {
        h.store.pop_next_request();
    }
    assert_eq!(h.assign(&retry), vec![WorkerId::Local; 2]);
    assert_eq!(h.launcher.launches().len(), 2);
}

#[tokio::test]
async fn session_end_restores_the_worker_count() {
    let mut h = harness(2);
    h.launcher.refuse_launches("no binary");
    let items = h.request(&["a"]);
    h.assign(&items);
    h.tick();
    assert_eq!(h.director.worker_count(), 0);

    h.director.shutdown_session(&mut h.store).await;

    assert_eq!(h.director.worker_count(), 2);
}

#[test]
fn worker_that_never_connects_closes_its_slot() {
    let mut h = harness(1);
    let items = h.request(&["a", "b"]);
    h.assign(&items);
    h.tick();

    h.clock.advance(CONNECT_TIMEOUT);
    h.tick();

    assert_eq!(h.director.worker_count(), 0);
    assert!(h.launcher.process(0).unwrap().was_killed());
    assert_eq!(h.store.item(items[1].0).unwrap().assignment(), None);
}

#[test]
fn handshake_for_unknown_slot_is_dropped() {
    let mut h = harness(1);
    let items = h.request(&["a"]);
    h.assign(&items);
    h.tick();

    let mut stranger = h.dial(7);
    h.tick();

    assert_eq!(h.director.num_pending_connections(), 0);
    assert!(matches!(
        stranger.receive(),
        Err(ProtocolError::ConnectionClosed)
    ));
    assert_eq!(h.director.worker_status(0), Some(ConnectStatus::WaitForConnect));
}

#[test]
fn handshake_for_claimed_slot_is_dropped() {
    let mut h = harness(1);
    let items = h.request(&["a"]);
    h.assign(&items);
    h.tick();
    let _worker = h.connect(0);

    let mut impostor = h.dial(0);
    h.tick();

    assert!(matches!(
        impostor.receive(),
        Err(ProtocolError::ConnectionClosed)
    ));
    assert_eq!(h.director.worker_status(0), Some(ConnectStatus::Connected));
}

#[test]
fn non_handshake_first_message_is_dropped() {
    let mut h = harness(1);
    let items = h.request(&["a"]);
    h.assign(&items);
    h.tick();

    let mut confused = Connection::new(Box::new(h.connector.connect()));
    confused.send(&Message::abort_worker()).unwrap();
    h.tick();

    assert_eq!(h.director.num_pending_connections(), 0);
    assert!(confused.receive().is_err());
    assert_eq!(h.director.worker_status(0), Some(ConnectStatus::WaitForConnect));
}

#[test]
fn silent_connection_is_dropped_after_connect_timeout() {
    let mut h = harness(0);
    let _silent = h.connector.connect();
    h.tick();
    assert_eq!(h.director.num_pending_connections(), 1);

    h.clock.advance(CONNECT_TIMEOUT);
    h.tick();

    assert_eq!(h.director.num_pending_connections(), 0);
}

#[test]
fn lowering_worker_count_retires_highest_indices() {
    let mut h = harness(3);
    let items = h.request(&["a"]);
    h.assign(&items);
    h.tick();
    let _w0 = h.connect(0);

    h.director.set_worker_count(1);
    h.tick();

    assert_eq!(h.director.active_indices(), vec![0]);
    assert!(h.launcher.process(1).unwrap().was_killed());
    assert!(h.launcher.process(2).unwrap().was_killed());
    assert!(!h.launcher.process(0).unwrap().was_killed());
    assert_eq!(h.director.num_shutting_down(), 0);
    assert_eq!(h.director.worker_count(), 1);
}

#[test]
fn retiring_a_connected_worker_waits_for_it() {
    let mut h = harness(2);
    let items = h.request(&["a", "b", "c"]);
    h.assign(&items);
    h.tick();
    let _w0 = h.connect(0);
    let mut w1 = h.connect(1);
    h.tick();

    h.director.set_worker_count(1);
    h.tick();

    assert_eq!(h.director.active_indices(), vec![0]);
    assert_eq!(h.director.num_shutting_down(), 1);
    // Item "c" went back to the queue when its worker retired.
    let c = items[2].0;
    assert_eq!(h.store.item(c).unwrap().assignment(), None);

    let mut saw_abort = false;
    while let Ok(Some(msg)) = w1.receive() {
        saw_abort |= matches!(msg, Message::AbortWorker(_));
    }
    assert!(saw_abort);

    w1.send(&Message::abort_worker()).unwrap();
    h.tick();
    assert_eq!(h.director.num_shutting_down(), 0);
}

#[test]
fn raising_worker_count_fills_lowest_free_index() {
    let mut h = harness(1);
    let items = h.request(&["a"]);
    h.assign(&items);
    h.director.set_worker_count(3);

    let more = h.request(&["b", "c", "d", "e"]);
    let decisions = h.assign(&more);

    assert_eq!(h.director.active_indices(), vec![0, 1, 2]);
    assert_eq!(decisions, vec![WorkerId::Local, remote(0), remote(1), remote(2)]);
}

#[test]
fn remove_from_worker_aborts_and_requeues() {
    let mut h = harness(1);
    let items = h.request(&["a", "b"]);
    h.assign(&items);
    h.tick();
    let mut worker = h.connect(0);
    h.tick();
    assert!(matches!(
        worker.receive().unwrap(),
        Some(Message::AssignItems(_))
    ));
    let b = items[1].0;

    assert!(h.director.remove_from_worker(&mut h.store, b));

    assert_eq!(h.store.item(b).unwrap().assignment(), None);
    assert!(h.store.request_queue().is_queued(b));
    match worker.receive().unwrap() {
        Some(Message::AbortItems(AbortItems { names })) => {
            assert_eq!(names, vec![ItemName::new("b")]);
        }
        other => panic!("expected abort, got {other:?}"),
    }
}

#[test]
fn remove_from_worker_ignores_local_items() {
    let mut h = harness(1);
    let items = h.request(&["a", "b"]);
    h.assign(&items);

    assert!(!h.director.remove_from_worker(&mut h.store, items[0].0));
    assert!(!h.director.remove_from_worker(&mut h.store, ItemId(99)));
}

#[test]
fn stall_warning_is_rate_limited() {
    let mut h = harness(1);
    let items = h.request(&["a", "b"]);
    h.assign(&items);
    h.tick();
    let _worker = h.connect(0);

    h.director.tick(&mut h.store, true);
    assert_eq!(h.director.stall_warnings(), 0);

    h.clock.advance(STALL_AFTER);
    h.director.tick(&mut h.store, true);
    assert_eq!(h.director.stall_warnings(), 1);

    h.clock.advance(Duration::from_secs(1));
    h.director.tick(&mut h.store, true);
    assert_eq!(h.director.stall_warnings(), 1);

    h.clock.advance(STALL_AFTER);
    h.director.tick(&mut h.store, true);
    assert_eq!(h.director.stall_warnings(), 2);
}

#[test]
fn busy_local_scheduler_is_not_a_stall() {
    let mut h = harness(1);
    let items = h.request(&["a", "b"]);
    h.assign(&items);
    h.tick();
    let _worker = h.connect(0);

    h.director.tick(&mut h.store, true);
    h.clock.advance(STALL_AFTER);
    h.director.tick(&mut h.store, false);
    h.clock.advance(STALL_AFTER);
    h.director.tick(&mut h.store, true);

    assert_eq!(h.director.stall_warnings(), 0);
}

#[tokio::test]
async fn shutdown_waits_for_acknowledgment() {
    let mut h = harness(1);
    let items = h.request(&["a", "b"]);
    h.assign(&items);
    h.tick();
    let mut worker = h.connect(0);
    h.tick();
    // The acknowledgment is already in flight when shutdown starts.
    worker.send(&Message::abort_worker()).unwrap();

    h.director.shutdown_session(&mut h.store).await;

    assert_eq!(h.director.num_shutting_down(), 0);
    assert!(h.director.active_indices().is_empty());
    let b = items[1].0;
    assert_eq!(h.store.item(b).unwrap().assignment(), None);
    assert!(h.store.request_queue().is_queued(b));
}

#[tokio::test]
async fn shutdown_kills_unresponsive_worker() {
    let mut h = harness_with(DirectorOptions {
        server: WorkerServerConfig {
            disconnect_timeout: Some(Duration::ZERO),
            ..options(1).server
        },
        ..options(1)
    });
    let items = h.request(&["a", "b"]);
    h.assign(&items);
    h.tick();
    let _worker = h.connect(0);

    h.director.shutdown_session(&mut h.store).await;

    assert_eq!(h.director.num_shutting_down(), 0);
    assert!(h.launcher.process(0).unwrap().was_killed());
}

#[tokio::test]
async fn shutdown_before_launch_is_immediate() {
    let mut h = harness(2);
    let items = h.request(&["a", "b", "c"]);
    h.assign(&items);

    h.director.shutdown_session(&mut h.store).await;

    assert!(h.launcher.launches().is_empty());
    for (id, _) in &items[1..] {
        assert!(h.store.request_queue().is_queued(*id));
    }
}

#[test]
fn distributor_trait_delegates() {
    let mut h = harness(1);
    let items = h.request(&["a", "b"]);
    let distributor: &mut dyn WorkDistributor = &mut h.director;

    let decisions = distributor.assign_requests(&items);

    assert_eq!(decisions, vec![WorkerId::Local, remote(0)]);
}

#[test]
fn only_session_targets_are_built_remotely() {
    let h = harness(1);
    let distributor: &dyn WorkDistributor = &h.director;

    assert!(distributor.can_build_remotely(&targets(&["linux"])));
    assert!(!distributor.can_build_remotely(&targets(&["linux", "ps5"])));
}

fn linux_result(name: ItemName) -> ItemResult {
    ItemResult {
        per_target: vec![TargetBuild {
            target: TargetName::new("linux"),
            succeeded: true,
            build_id: Some(format!("remote-{name}")),
            dependency_digest: None,
            side_messages: vec![],
        }],
        name,
        suppress_reason: None,
    }
}

/// Plays a well-behaved worker: succeeds every assigned item for `linux`.
/// Ignores aborts, so items withdrawn after assignment are answered anyway.
fn answer_assignments(worker: &mut Connection) {
    while let Some(msg) = worker.receive().unwrap() {
        if let Message::AssignItems(assign) = msg {
            let items = assign.names.into_iter().map(linux_result).collect();
            worker
                .send(&Message::Results(Results { items }))
                .unwrap();
        }
    }
}

/// No item is queued or in flight on two workers, and a settled holder is
/// the item's assigned worker in the store.
fn assert_single_holder(h: &Harness, names: &[&str]) {
    for name in names {
        let holders = h.director.holders(&ItemName::new(*name));
        assert!(holders.len() <= 1, "{name} held by workers {holders:?}");
        if let [index] = holders[..] {
            let id = h.store.find(name).unwrap();
            assert_eq!(h.store.item(id).unwrap().assignment(), Some(remote(index)));
        }
    }
}

#[test]
fn cancelled_item_rerequested_on_another_worker_has_one_owner() {
    let mut h = harness(2);
    let items = h.request(&["p", "x"]);
    assert_eq!(h.assign(&items), vec![WorkerId::Local, remote(0)]);
    let x = items[1].0;
    h.tick();
    let mut w0 = h.connect(0);
    let mut w1 = h.connect(1);
    assert_eq!(
        w0.receive().unwrap(),
        Some(Message::assign(vec![ItemName::new("x")]))
    );

    h.store.remove_session_target(&TargetName::new("linux"));
    assert_eq!(h.log.count_for("x"), 1);
    let again = h.request(&["p", "q", "x"]);
    assert_eq!(h.assign(&again), vec![WorkerId::Local, remote(0), remote(1)]);

    assert_eq!(h.director.holders(&ItemName::new("x")), vec![1]);
    assert_eq!(
        w0.receive().unwrap(),
        Some(Message::abort_items(vec![ItemName::new("x")]))
    );
    h.tick();
    assert_single_holder(&h, &["p", "q", "x"]);

    // The first worker finishes its withdrawn build anyway.
    w0.send(&Message::Results(Results {
        items: vec![linux_result(ItemName::new("x"))],
    }))
    .unwrap();
    h.tick();

    let item = h.store.item(x).unwrap();
    assert_eq!(item.state(), ItemState::Request);
    assert_eq!(item.assignment(), Some(remote(1)));
    assert!(item.completed_targets().is_empty());
    assert_eq!(h.log.count_for("x"), 1);
    h.store.verify_invariants().unwrap();

    answer_assignments(&mut w1);
    h.tick();
    assert_eq!(h.store.item(x).unwrap().state(), ItemState::Idle);
    assert_eq!(h.log.count_for("x"), 2);
    let last = h.log.entries().into_iter().rev().find(|c| c.name == "x").unwrap();
    assert_eq!(last.outcome, CookOutcome::Succeeded);
}

#[test]
fn cancelled_remote_item_is_aborted_on_its_worker() {
    let mut h = harness(1);
    let items = h.request(&["a", "b"]);
    h.assign(&items);
    h.tick();
    let mut worker = h.connect(0);
    assert!(matches!(
        worker.receive().unwrap(),
        Some(Message::AssignItems(_))
    ));

    h.store.remove_session_target(&TargetName::new("linux"));
    h.tick();

    assert!(h.director.holders(&ItemName::new("b")).is_empty());
    assert_eq!(
        worker.receive().unwrap(),
        Some(Message::abort_items(vec![ItemName::new("b")]))
    );
    assert_eq!(h.store.item(items[1].0).unwrap().state(), ItemState::Idle);
    h.store.verify_invariants().unwrap();
}

#[test]
fn abort_cancel_and_rerequest_keep_one_owner_per_item() {
    let names = ["a", "b", "c", "d", "e", "f"];
    let mut h = harness(3);
    let items = h.request(&names);
    assert_eq!(
        h.assign(&items),
        vec![WorkerId::Local, remote(0), remote(1), remote(2), WorkerId::Local, remote(0)]
    );
    h.tick();
    let mut workers = vec![h.connect(0), h.connect(1), h.connect(2)];
    h.tick();
    assert_single_holder(&h, &names);

    // Pull one item back and build it locally.
    let c = items[2].0;
    assert!(h.director.remove_from_worker(&mut h.store, c));
    assert_eq!(h.store.pop_next_request(), Some(c));
    assert_eq!(h.assign(&[items[2].clone()]), vec![WorkerId::Local]);
    assert_single_holder(&h, &names);

    // Cancel everything, then ask again in a different order.
    h.store.remove_session_target(&TargetName::new("linux"));
    for name in names {
        assert!(h.director.holders(&ItemName::new(name)).len() <= 1);
    }
    h.tick();
    for name in names {
        assert!(h.director.holders(&ItemName::new(name)).is_empty());
    }
    let again = h.request(&["f", "d", "b", "a"]);
    assert_eq!(
        h.assign(&again),
        vec![WorkerId::Local, remote(0), remote(1), remote(2)]
    );
    h.tick();
    assert_single_holder(&h, &names);

    // Every worker answers everything it was ever assigned, stale or not.
    for worker in &mut workers {
        answer_assignments(worker);
    }
    h.tick();
    assert_single_holder(&h, &names);

    for name in ["d", "b", "a"] {
        assert_eq!(h.log.count_for(name), 2, "{name}");
        let last = h.log.entries().into_iter().rev().find(|e| e.name == name).unwrap();
        assert_eq!(last.outcome, CookOutcome::Succeeded, "{name}");
    }
    let f = h.store.find("f").unwrap();
    assert_eq!(h.store.item(f).unwrap().state(), ItemState::Request);
    assert_eq!(h.log.count_for("f"), 1);
    h.store.verify_invariants().unwrap();
}

#[tokio::test]
async fn runtime_cooks_through_a_remote_worker() {
    use cook_engine::{CookRequest, FakeExecutor, Runtime, RuntimeConfig, SchedulerAction};

    let clock = FakeClock::new();
    let launcher = FakeLauncher::new();
    let (acceptor, connector) = MemoryAcceptor::new();
    let director = Director::new(
        options(1),
        Box::new(acceptor),
        Box::new(launcher.clone()),
        clock.clone(),
    );
    let executor = FakeExecutor::new();
    let mut runtime = Runtime::new(director, executor.clone(), clock, RuntimeConfig::default());
    let log = CompletionLog::new();
    for name in ["a", "b", "c", "d"] {
        runtime.submit(CookRequest {
            name: ItemName::new(name),
            targets: targets(&["linux"]),
            urgent: false,
            on_complete: Some(log.callback()),
        });
    }

    let mut worker: Option<Connection> = None;
    let mut finished = false;
    for _ in 0..200 {
        if runtime.tick().await.unwrap() == SchedulerAction::Done {
            finished = true;
            break;
        }
        if worker.is_none() && launcher.num_processes() == 1 {
            let mut connection = Connection::new(Box::new(connector.connect()));
            connection
                .send(&Message::WorkerConnect(WorkerConnect { remote_index: 0 }))
                .unwrap();
            worker = Some(connection);
        }
        if let Some(connection) = worker.as_mut() {
            answer_assignments(connection);
        }
    }

    assert!(finished);
    assert_eq!(log.len(), 4);
    assert!(log.entries().iter().all(|c| c.outcome == CookOutcome::Succeeded));
    assert_eq!(executor.loads_for("a"), 1);
    assert_eq!(executor.loads_for("c"), 1);
    assert_eq!(executor.loads_for("b"), 0);
    assert_eq!(executor.loads_for("d"), 0);

    drop(worker);
    assert_eq!(runtime.end_session().await, 0);
    assert!(runtime.distributor().active_indices().is_empty());
}
