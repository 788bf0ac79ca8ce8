//! Wire codec benchmark suite.
//!
//! Benchmarks the per-frame hot path of the read loop: envelope
//! classification, full typed decodes, and outbound serialization.
//!
//! Run with: cargo bench --bench codec
//! Results saved to: target/criterion/

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use serde_json::{Map, json};

use hass_companion::{
    Command, CommandFrame, Envelope, EventMessage, PushNotificationMessage, ResultMessage,
    SequenceId, ServiceTarget,
};

// ============================================================================
// Sample Frames
// ============================================================================

/// A typical `state_changed` delivery.
const EVENT_FRAME: &str = r#"{
  "id": 18,
  "type": "event",
  "event": {
    "event_type": "state_changed",
    "data": {
      "entity_id": "light.kitchen",
      "old_state": {
        "entity_id": "light.kitchen",
        "state": "off",
        "attributes": {"friendly_name": "Kitchen", "supported_features": 44},
        "last_changed": "2024-01-01T10:00:00.000000+00:00",
        "last_updated": "2024-01-01T10:00:00.000000+00:00"
      },
      "new_state": {
        "entity_id": "light.kitchen",
        "state": "on",
        "attributes": {"friendly_name": "Kitchen", "brightness": 128, "supported_features": 44},
        "last_changed": "2024-01-01T10:05:00.000000+00:00",
        "last_updated": "2024-01-01T10:05:00.000000+00:00"
      }
    },
    "origin": "LOCAL",
    "time_fired": "2024-01-01T10:05:00.000000+00:00"
  }
}"#;

/// A push notification delivered over the WebSocket channel.
const PUSH_FRAME: &str = r#"{
  "id": 2,
  "type": "event",
  "event": {
    "message": "Front door opened",
    "title": "Alarm",
    "data": {
      "tag": "front-door",
      "actions": [
        {"action": "dismiss", "title": "Dismiss"},
        {"action": "alarm_off", "title": "Disarm"}
      ]
    },
    "hass_confirm_id": "c0ffee"
  }
}"#;

/// A successful `call_service` result.
const RESULT_FRAME: &str =
    r#"{"id": 42, "type": "result", "success": true, "result": {"context": {"id": "01HV"}}}"#;

const PONG_FRAME: &str = r#"{"id": 7, "type": "pong"}"#;

// ============================================================================
// Benchmark: Envelope Classification
// ============================================================================

fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify");

    for (name, frame) in [
        ("event", EVENT_FRAME),
        ("result", RESULT_FRAME),
        ("pong", PONG_FRAME),
    ] {
        group.bench_with_input(BenchmarkId::new("envelope", name), &frame, |b, frame| {
            b.iter(|| Envelope::decode(black_box(frame)).expect("classify"));
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Typed Decode
// ============================================================================

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");

    group.bench_function("event", |b| {
        b.iter(|| serde_json::from_str::<EventMessage>(black_box(EVENT_FRAME)).expect("decode"));
    });

    group.bench_function("push_notification", |b| {
        b.iter(|| {
            let push: PushNotificationMessage =
                serde_json::from_str(black_box(PUSH_FRAME)).expect("decode");
            assert!(push.is_notification());
            push
        });
    });

    group.bench_function("result", |b| {
        b.iter(|| serde_json::from_str::<ResultMessage>(black_box(RESULT_FRAME)).expect("decode"));
    });

    group.finish();
}

// ============================================================================
// Benchmark: Outbound Serialization
// ============================================================================

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");

    let mut service_data = Map::new();
    service_data.insert("brightness".to_string(), json!(128));
    service_data.insert("transition".to_string(), json!(2));
    let call_service = CommandFrame::new(
        SequenceId::new(42),
        Command::CallService {
            domain: "light".to_string(),
            service: "turn_on".to_string(),
            service_data,
            target: Some(ServiceTarget::entity("light.kitchen")),
        },
    );
    group.bench_function("call_service", |b| {
        b.iter(|| serde_json::to_string(black_box(&call_service)).expect("serialize"));
    });

    let ping = CommandFrame::new(SequenceId::new(7), Command::ping());
    group.bench_function("ping", |b| {
        b.iter(|| serde_json::to_string(black_box(&ping)).expect("serialize"));
    });

    group.finish();
}

criterion_group!(benches, bench_classify, bench_decode, bench_encode);
criterion_main!(benches);
