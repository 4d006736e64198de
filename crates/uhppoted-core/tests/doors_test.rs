// Door state poller, door mutations and controller info.
#![allow(clippy::unwrap_used)]

mod common;

use std::time::Duration;

use pretty_assertions::assert_eq;
use uhppoted_core::{
    Command, CommandResult, ContextKey, CoreError, DoorId, DoorMode, DoorState, Uhppoted,
};

use common::{ALPHA, BRAVO, FakeApi, config};

fn engine(api: &FakeApi) -> Uhppoted<FakeApi> {
    Uhppoted::with_api(config(), api.clone()).unwrap()
}

fn front() -> DoorId {
    DoorId::new(ALPHA, 1)
}

// ── Polling ─────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn configured_doors_are_polled_on_first_tick() {
    let api = FakeApi::with_controllers(&[ALPHA, BRAVO]);
    api.controller(ALPHA, |c| {
        c.relays = 0x01;
        c.doors_open = [true, false, false, false];
        c.buttons = [false, false, true, false];
        c.controls[2] = (DoorMode::Locked, 7);
    });
    let engine = engine(&api);

    engine.refresh_doors().await.unwrap();

    let snapshot = engine.doors_snapshot();
    assert_eq!(
        snapshot.keys().copied().collect::<Vec<_>>(),
        vec![DoorId::new(ALPHA, 1), DoorId::new(ALPHA, 3)]
    );

    let entry = snapshot.get(&front()).unwrap().value.clone().unwrap();
    assert_eq!(entry.mode, DoorMode::Controlled);
    assert_eq!(entry.delay, 5);
    assert_eq!(
        entry.state,
        DoorState {
            open: Some(true),
            button: Some(false),
            locked: Some(false),
        }
    );
    assert_eq!(entry.state.describe(), "UNLOCKED OPEN");

    let garage = snapshot.get(&DoorId::new(ALPHA, 3)).unwrap().value.clone().unwrap();
    assert_eq!(garage.mode, DoorMode::Locked);
    assert_eq!(garage.delay, 7);
    assert_eq!(garage.state.describe(), "PRESSED LOCKED CLOSED");

    // One status call per controller, not per door.
    assert_eq!(api.calls().get_status, 1);
}

#[tokio::test(start_paused = true)]
async fn failing_controller_marks_only_its_doors_unavailable() {
    let api = FakeApi::with_controllers(&[ALPHA, BRAVO]);
    api.controller(BRAVO, |c| c.failing = true);
    let engine = engine(&api);
    engine.add_context(ContextKey::Door(DoorId::new(BRAVO, 2)));

    engine.refresh_doors().await.unwrap();

    let snapshot = engine.doors_snapshot();
    assert!(snapshot.get(&front()).unwrap().available);
    let bravo = snapshot.get(&DoorId::new(BRAVO, 2)).unwrap();
    assert!(!bravo.available);
    assert!(bravo.value.is_none());
}

#[tokio::test(start_paused = true)]
async fn door_context_added_later_is_seeded_then_polled() {
    let api = FakeApi::with_controllers(&[ALPHA, BRAVO]);
    let engine = engine(&api);
    engine.refresh_doors().await.unwrap();

    let door = DoorId::new(BRAVO, 4);
    let mut stream = engine.doors();
    engine.add_context(ContextKey::Door(door));

    let seeded = stream.changed().await.unwrap();
    assert!(!seeded.get(&door).unwrap().available);

    engine.refresh_doors().await.unwrap();
    let polled = stream.changed().await.unwrap();
    assert!(polled.get(&door).unwrap().available);
}

#[tokio::test(start_paused = true)]
async fn slow_controller_times_out_the_whole_tick() {
    let api = FakeApi::with_controllers(&[ALPHA, BRAVO]);
    let mut cfg = config();
    cfg.tick_timeout = Duration::from_millis(1500);
    let engine = Uhppoted::with_api(cfg, api.clone()).unwrap();
    engine.refresh_doors().await.unwrap();
    let before = engine.doors_snapshot();

    // Status then door control, each inside the per-call timeout.
    api.controller(ALPHA, |c| c.latency = Duration::from_millis(900));
    let result = engine.refresh_doors().await;

    assert!(matches!(result, Err(CoreError::TickTimeout { .. })));
    assert!(std::sync::Arc::ptr_eq(&before, &engine.doors_snapshot()));
}

// ── Mutations ───────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn set_mode_writes_combined_triple() {
    let api = FakeApi::with_controllers(&[ALPHA, BRAVO]);
    api.controller(ALPHA, |c| c.controls[0] = (DoorMode::Controlled, 9));
    let engine = engine(&api);
    engine.refresh_doors().await.unwrap();
    engine.start().await;

    let result = engine
        .execute(Command::SetDoorMode {
            door: front(),
            mode: DoorMode::Unlocked,
        })
        .await
        .unwrap();

    assert!(matches!(
        result,
        CommandResult::DoorControl(ref r) if r.mode == DoorMode::Unlocked && r.delay == 9
    ));
    assert_eq!(
        api.calls().set_door_control,
        vec![(ALPHA, 1, DoorMode::Unlocked, 9)]
    );

    // Published without waiting for the next tick.
    let entry = engine.door(front()).unwrap();
    assert_eq!(entry.value.unwrap().mode, DoorMode::Unlocked);

    engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn set_delay_is_validated_before_any_call() {
    let api = FakeApi::with_controllers(&[ALPHA, BRAVO]);
    let engine = engine(&api);
    engine.start().await;

    let result = engine
        .execute(Command::SetDoorDelay {
            door: front(),
            delay: 61,
        })
        .await;
    assert!(matches!(result, Err(CoreError::InvalidDelay { delay: 61 })));
    assert!(api.calls().set_door_control.is_empty());

    engine
        .execute(Command::SetDoorDelay {
            door: front(),
            delay: 30,
        })
        .await
        .unwrap();
    assert_eq!(
        api.calls().set_door_control,
        vec![(ALPHA, 1, DoorMode::Controlled, 30)]
    );

    engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn unlock_succeeds_with_a_single_call() {
    let api = FakeApi::with_controllers(&[ALPHA, BRAVO]);
    let engine = engine(&api);
    engine.start().await;

    let result = engine
        .execute(Command::UnlockDoorByName {
            name: "garage".to_owned(),
        })
        .await
        .unwrap();

    match result {
        CommandResult::Unlocked { door, reply } => {
            assert_eq!(door, DoorId::new(ALPHA, 3));
            assert!(reply.opened);
        }
        other => panic!("unexpected result {other:?}"),
    }
    assert_eq!(api.calls().open_door, 1);

    engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn unlock_not_opened_is_an_operation_failure() {
    let api = FakeApi::with_controllers(&[ALPHA, BRAVO]);
    api.controller(ALPHA, |c| c.opens = false);
    let engine = engine(&api);
    engine.start().await;

    let result = engine.execute(Command::UnlockDoor { door: front() }).await;

    assert!(matches!(result, Err(CoreError::OperationFailed { .. })));
    assert_eq!(api.calls().open_door, 1);
    engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn unlock_reply_from_wrong_controller_is_a_validation_failure() {
    let api = FakeApi::with_controllers(&[ALPHA, BRAVO]);
    api.controller(ALPHA, |c| c.impostor = Some(BRAVO));
    let engine = engine(&api);
    engine.start().await;

    let result = engine.execute(Command::UnlockDoor { door: front() }).await;

    assert!(matches!(result, Err(CoreError::ValidationFailed { .. })));
    assert_eq!(api.calls().open_door, 1);
    engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn unanswered_mutation_times_out() {
    let api = FakeApi::with_controllers(&[ALPHA, BRAVO]);
    let engine = engine(&api);
    engine.start().await;
    api.controller(ALPHA, |c| c.latency = Duration::from_secs(60));

    let result = engine.execute(Command::UnlockDoor { door: front() }).await;
    assert!(matches!(
        result,
        Err(CoreError::Timeout {
            controller: ALPHA,
            ..
        })
    ));

    let result = engine
        .execute(Command::SetDoorDelay {
            door: front(),
            delay: 30,
        })
        .await;
    assert!(matches!(result, Err(CoreError::Timeout { .. })));
    assert!(api.calls().set_door_control.is_empty());

    engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn unknown_door_name_is_not_found() {
    let api = FakeApi::with_controllers(&[ALPHA, BRAVO]);
    let engine = engine(&api);
    engine.start().await;

    let result = engine
        .execute(Command::UnlockDoorByName {
            name: "cellar".to_owned(),
        })
        .await;

    assert!(matches!(result, Err(CoreError::DoorNotFound { .. })));
    assert_eq!(api.calls().open_door, 0);
    engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn commands_need_a_running_engine() {
    let api = FakeApi::with_controllers(&[ALPHA, BRAVO]);
    let engine = engine(&api);

    let result = engine.execute(Command::UnlockDoor { door: front() }).await;
    assert!(matches!(result, Err(CoreError::Unavailable { .. })));
    assert_eq!(api.calls().open_door, 0);
}

// ── Controller info ─────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn controller_info_includes_clock() {
    let api = FakeApi::with_controllers(&[ALPHA, BRAVO]);
    api.controller(BRAVO, |c| c.failing = true);
    let engine = engine(&api);

    engine.refresh_info().await.unwrap();

    let snapshot = engine.info_snapshot();
    let alpha = snapshot.get(&ALPHA).unwrap().value.clone().unwrap();
    assert_eq!(alpha.serial, ALPHA);
    assert_eq!(alpha.firmware, "v8.92");
    assert_eq!(alpha.address.to_string(), "192.168.1.100");
    assert!(alpha.datetime.is_some());
    assert!(!snapshot.get(&BRAVO).unwrap().available);
}

#[tokio::test(start_paused = true)]
async fn door_entry_serializes_with_flattened_state() {
    let api = FakeApi::with_controllers(&[ALPHA, BRAVO]);
    api.controller(ALPHA, |c| c.relays = 0x01);
    let engine = engine(&api);
    tokio_test::assert_ok!(engine.refresh_doors().await);

    let json = serde_json::to_value(engine.door(front()).unwrap()).unwrap();
    assert_eq!(json["available"], true);
    assert_eq!(json["value"]["mode"], "controlled");
    assert_eq!(json["value"]["delay"], 5);
    assert_eq!(json["value"]["locked"], false);
    assert_eq!(json["value"]["open"], false);
}
