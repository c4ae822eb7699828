//! Integration tests for the shared event bus
//!
//! Covers re-entrant dispatch, aggregates registered through the shared bus,
//! error propagation out of nested triggers, and concurrent use from several
//! threads.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use eventide_core::{
    Callback, Event, EventError, ListenerAggregate, ListenerResult, ListenerSink, Params,
};
use eventide_runtime::{DispatchConfig, SharedEventBus};
use eventide_testing::CallLog;
use eventide_testing::helpers::{init_test_tracing, params};
use serde_json::{Value, json};
use std::sync::Arc;
use std::thread;

// ============================================================================
// Test Fixtures
// ============================================================================

fn quiet_bus() -> SharedEventBus {
    init_test_tracing();
    SharedEventBus::with_config(DispatchConfig::builder().record_metrics(false).build())
}

/// Application-style aggregate: route, then render, then respond.
struct Application {
    log: CallLog,
}

impl Application {
    fn new(log: &CallLog) -> Arc<Self> {
        Arc::new(Self { log: log.clone() })
    }

    fn on_route(&self, event: &mut Event<'_>) -> ListenerResult {
        self.log.push("route");
        event.set_param("route", "home");
        Ok(json!("routed"))
    }

    fn on_render(&self, event: &mut Event<'_>) -> ListenerResult {
        self.log.push("render");
        let route = event.param_or("route", Value::Null);
        Ok(json!({ "view": route }))
    }
}

/// Holds bound callbacks for an [`Application`] so the handles stay stable
/// between attach and detach.
struct ApplicationListeners {
    handles: Vec<(&'static str, i32, Callback)>,
}

impl ApplicationListeners {
    fn for_app(app: &Arc<Application>) -> Self {
        Self {
            handles: vec![
                ("dispatch", 1, Callback::bound(app, Application::on_route).with_label("route")),
                ("dispatch", 2, Callback::bound(app, Application::on_render).with_label("render")),
            ],
        }
    }
}

impl ListenerAggregate for ApplicationListeners {
    fn attach(&self, events: &mut dyn ListenerSink) {
        for (event, priority, callback) in &self.handles {
            events.attach_listener(event, callback.clone(), *priority);
        }
    }

    fn detach(&self, events: &mut dyn ListenerSink) {
        for (event, _, callback) in &self.handles {
            events.detach_listener(event, callback);
        }
    }
}

// ============================================================================
// Re-entrancy
// ============================================================================

#[test]
fn nested_trigger_completes_before_outer_dispatch_continues() {
    let bus = quiet_bus();
    let log = CallLog::new();

    let inner = bus.clone();
    let outer_log = log.clone();
    bus.attach_with_priority(
        "outer",
        Callback::new(move |_| {
            outer_log.push("outer:1");
            inner.trigger("inner", None, Params::new())?;
            Ok(Value::Null)
        }),
        1,
    );
    bus.attach_with_priority("outer", log.recorder("outer:2"), 2);
    bus.attach_with_priority("inner", log.recorder("inner:1"), 1);
    bus.attach_with_priority("inner", log.recorder("inner:2"), 2);

    bus.trigger("outer", None, Params::new()).unwrap();

    assert_eq!(log.entries(), ["outer:1", "inner:1", "inner:2", "outer:2"]);
}

#[test]
fn nested_failure_aborts_outer_dispatch() {
    let bus = quiet_bus();
    let log = CallLog::new();

    let inner = bus.clone();
    bus.attach_with_priority(
        "outer",
        Callback::new(move |_| {
            inner.trigger("inner", None, Params::new())?;
            Ok(Value::Null)
        })
        .with_label("nested"),
        1,
    );
    bus.attach_with_priority("outer", log.recorder("after"), 2);
    bus.attach("inner", log.failer("inner", "template missing"));

    let err = bus.trigger("outer", None, Params::new()).unwrap_err();

    let EventError::ListenerFailed { event, listener, source, .. } = &err;
    assert_eq!(event, "outer");
    assert_eq!(listener.as_deref(), Some("nested"));
    assert!(source.message().contains("inner"));
    assert_eq!(log.entries(), ["inner"]);
}

#[test]
fn listener_renaming_event_does_not_redirect_dispatch() {
    let bus = quiet_bus();
    let log = CallLog::new();

    bus.attach_with_priority(
        "first",
        Callback::new(|event| {
            event.set_name("second");
            Ok(Value::Null)
        }),
        1,
    );
    bus.attach_with_priority("first", log.recorder("first:2"), 2);
    bus.attach("second", log.recorder("second"));

    let mut event = Event::new("first");
    bus.dispatch(&mut event).unwrap();
    assert_eq!(log.entries(), ["first:2"]);

    // The renamed event now selects the other channel
    bus.trigger_event(&mut event, None, Params::new()).unwrap();
    assert_eq!(log.entries(), ["first:2", "second"]);
}

// ============================================================================
// Aggregates
// ============================================================================

#[test]
fn aggregate_attaches_and_detaches_through_shared_bus() {
    let bus = quiet_bus();
    let log = CallLog::new();
    let app = Application::new(&log);
    let listeners = ApplicationListeners::for_app(&app);

    bus.attach_aggregate(&listeners);
    assert_eq!(bus.listener_count("dispatch"), 2);

    let mut event = Event::new("dispatch");
    let dispatch = bus.dispatch(&mut event).unwrap();
    assert_eq!(dispatch.last_result, Some(json!({ "view": "home" })));
    assert_eq!(log.entries(), ["route", "render"]);

    bus.detach_aggregate(&listeners);
    assert!(!bus.has_listeners("dispatch"));
}

#[test]
fn dropped_receiver_is_skipped_by_shared_bus() {
    let bus = quiet_bus();
    let log = CallLog::new();
    let app = Application::new(&log);
    let listeners = ApplicationListeners::for_app(&app);
    bus.attach_aggregate(&listeners);
    bus.attach_with_priority("dispatch", log.recorder("tail"), 3);

    drop(app);

    let mut event = Event::new("dispatch");
    let dispatch = bus.dispatch(&mut event).unwrap();
    assert_eq!(dispatch.invoked, 1);
    assert_eq!(log.entries(), ["tail"]);

    // Dead callbacks can no longer be detached either
    bus.detach_aggregate(&listeners);
    assert_eq!(bus.listener_count("dispatch"), 3);

    // Pruning is the explicit way to drop them
    assert_eq!(bus.prune_dead("dispatch"), 2);
    assert_eq!(bus.listener_count("dispatch"), 1);
    assert_eq!(bus.priorities("dispatch"), [3]);
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn concurrent_attach_and_trigger() {
    let bus = quiet_bus();
    let log = CallLog::new();

    let workers: Vec<_> = (0..4)
        .map(|worker| {
            let bus = bus.clone();
            let log = log.clone();
            thread::spawn(move || {
                for round in 0..25 {
                    bus.attach(&format!("worker{worker}"), log.recorder(&format!("{worker}:{round}")));
                    bus.trigger("shared", None, params([("worker", json!(worker))]))
                        .unwrap();
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().expect("worker panicked");
    }

    for worker in 0..4 {
        assert_eq!(bus.listener_count(&format!("worker{worker}")), 25);
    }
    // No listener on "shared": nothing logged
    assert!(log.is_empty());
}

#[test]
fn concurrent_triggers_see_consistent_registry() {
    let bus = quiet_bus();
    let log = CallLog::new();
    for index in 0..8 {
        bus.attach_with_priority("event1", log.recorder(&index.to_string()), index);
    }

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let bus = bus.clone();
            thread::spawn(move || {
                let mut event = Event::new("event1");
                bus.dispatch(&mut event).unwrap().invoked
            })
        })
        .collect();

    for worker in workers {
        assert_eq!(worker.join().expect("worker panicked"), 8);
    }
    assert_eq!(log.len(), 32);
}

#[test]
fn config_from_json() {
    let config: DispatchConfig = serde_json::from_value(json!({
        "default_priority": 5,
        "slow_listener_threshold_ms": 250,
        "record_metrics": false
    }))
    .unwrap();

    let bus = SharedEventBus::with_config(config);
    bus.attach("event1", Callback::new(|_| Ok(Value::Null)));
    assert_eq!(bus.listeners("event1")[0].priority, 5);
}
