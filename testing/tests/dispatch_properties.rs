//! Property tests for dispatch ordering and propagation.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code

use eventide_core::{Callback, EventBus, Params};
use eventide_testing::CallLog;
use eventide_testing::properties::{expected_order, priorities_with_stopper, priority_sets};
use proptest::prelude::*;

/// Attach one recorder per priority; each logs its registration index.
fn bus_with_recorders(priorities: &[i32], log: &CallLog) -> (EventBus, Vec<Callback>) {
    let mut bus = EventBus::new();
    let mut callbacks = Vec::with_capacity(priorities.len());
    for (index, &priority) in priorities.iter().enumerate() {
        let callback = log.recorder(&index.to_string());
        assert!(bus.attach_with_priority("event1", callback.clone(), priority));
        callbacks.push(callback);
    }
    (bus, callbacks)
}

fn logged_indices(log: &CallLog) -> Vec<usize> {
    log.entries()
        .iter()
        .map(|entry| entry.parse().unwrap())
        .collect()
}

proptest! {
    #[test]
    fn listeners_run_by_priority_then_registration(priorities in priority_sets()) {
        let log = CallLog::new();
        let (bus, _) = bus_with_recorders(&priorities, &log);

        bus.trigger("event1", None, Params::new()).unwrap();

        prop_assert_eq!(logged_indices(&log), expected_order(&priorities));
    }

    #[test]
    fn snapshot_matches_dispatch_order(priorities in priority_sets()) {
        let log = CallLog::new();
        let (bus, _) = bus_with_recorders(&priorities, &log);

        let snapshot: Vec<i32> = bus.listeners("event1").iter().map(|entry| entry.priority).collect();
        let expected: Vec<i32> = expected_order(&priorities).iter().map(|&i| priorities[i]).collect();

        prop_assert_eq!(snapshot, expected);
    }

    #[test]
    fn stopping_listener_is_the_last_to_run((priorities, stopper) in priorities_with_stopper()) {
        let log = CallLog::new();
        let mut bus = EventBus::new();
        for (index, &priority) in priorities.iter().enumerate() {
            let label = index.to_string();
            let callback = if index == stopper {
                log.stopper(&label)
            } else {
                log.recorder(&label)
            };
            bus.attach_with_priority("event1", callback, priority);
        }

        let mut event = eventide_core::Event::new("event1");
        let dispatch = bus.dispatch(&mut event).unwrap();

        let order = expected_order(&priorities);
        let stop_at = order.iter().position(|&i| i == stopper).unwrap();

        prop_assert!(dispatch.outcome.is_stopped());
        prop_assert!(event.is_propagation_stopped());
        prop_assert_eq!(dispatch.invoked, stop_at + 1);
        prop_assert_eq!(logged_indices(&log), order[..=stop_at].to_vec());
    }

    #[test]
    fn detach_removes_every_duplicate(
        priorities in priority_sets(),
        duplicates in prop::collection::vec(-8i32..8, 1..6),
    ) {
        let log = CallLog::new();
        let (mut bus, _) = bus_with_recorders(&priorities, &log);

        let duplicate = log.recorder("dup");
        for &priority in &duplicates {
            bus.attach_with_priority("event1", duplicate.clone(), priority);
        }
        prop_assert_eq!(bus.listener_count("event1"), priorities.len() + duplicates.len());

        prop_assert!(bus.detach("event1", &duplicate));
        prop_assert_eq!(bus.listener_count("event1"), priorities.len());
        prop_assert!(!bus.detach("event1", &duplicate));

        bus.trigger("event1", None, Params::new()).unwrap();
        prop_assert!(!log.entries().iter().any(|entry| entry == "dup"));
    }

    #[test]
    fn detaching_everything_removes_the_channel(priorities in priority_sets()) {
        let log = CallLog::new();
        let (mut bus, callbacks) = bus_with_recorders(&priorities, &log);

        for callback in &callbacks {
            prop_assert!(bus.detach("event1", callback));
        }

        prop_assert!(!bus.has_listeners("event1"));
        prop_assert!(bus.channels().is_empty());
        prop_assert!(bus.priorities("event1").is_empty());
    }
}
