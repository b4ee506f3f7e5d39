// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event-store lazy prune under a small cap.

use fleet_core::{EventKind, OrchestratorEvent, SessionId};
use fleet_storage::{EventFilter, EventStore};

#[test]
fn lazy_prune_keeps_the_newest_ten() {
    let tmp = tempfile::tempdir().unwrap();
    let store = EventStore::new(tmp.path().join("events.jsonl"), 10);

    for i in 0..15u64 {
        let event = OrchestratorEvent::new(
            EventKind::SessionWorking,
            "demo",
            Some(SessionId::new("fc-1")),
            format!("tick {i}"),
            1_000_000 + i * 1_000,
        );
        store.append(&event).unwrap();
    }

    let raw = std::fs::read_to_string(tmp.path().join("events.jsonl")).unwrap();
    assert_eq!(raw.lines().count(), 10, "file holds exactly max_events lines");

    // Fixed-width ISO-8601 UTC strings order lexicographically.
    let all = store.read_all();
    let oldest_kept = &all.first().unwrap().timestamp;
    let dropped_newest = fleet_core::event::format_timestamp(1_000_000 + 4 * 1_000);
    assert!(
        *oldest_kept > dropped_newest,
        "every survivor ({oldest_kept}) is newer than every dropped event ({dropped_newest})"
    );

    let newest_first = store.query(&EventFilter::default());
    assert_eq!(newest_first.len(), 10);
    assert!(newest_first.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
    assert_eq!(newest_first[0].message, "tick 14");
    assert_eq!(newest_first[9].message, "tick 5");
}

#[test]
fn round_trip_by_id_after_prune() {
    let tmp = tempfile::tempdir().unwrap();
    let store = EventStore::new(tmp.path().join("events.jsonl"), 10);

    let event = OrchestratorEvent::new(
        EventKind::CiFailing,
        "demo",
        Some(SessionId::new("fc-2")),
        "ci failing",
        2_000_000,
    );
    store.append(&event).unwrap();

    let found = store.query(&EventFilter::default());
    assert!(found.iter().any(|e| e.id == event.id));
}
