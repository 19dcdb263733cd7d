mod common;

use std::future::poll_fn;
use std::pin::Pin;
use std::time::Duration;

use actix_web::{body::MessageBody, test, web, App};
use common::{producer_for, test_state, CountingSource, ScriptedDetector, Step};
use mitra_common::{BBox, Detection};
use mitra_perception::{api, camera::Frame, events::EventPayload, streaming::mjpeg_part};
use serde_json::{json, Value};

async fn next_chunk<B>(body: &mut Pin<Box<B>>) -> String
where
    B: MessageBody,
    B::Error: std::fmt::Debug,
{
    let chunk = tokio::time::timeout(Duration::from_secs(3), poll_fn(|cx| body.as_mut().poll_next(cx)))
        .await
        .expect("no chunk within 3s")
        .expect("body ended")
        .unwrap();
    String::from_utf8_lossy(&chunk).into_owned()
}

#[actix_rt::test]
async fn latest_detections_is_empty_before_first_cycle() {
    let state = web::Data::new(test_state());
    let app = test::init_service(App::new().app_data(state.clone()).configure(api::configure)).await;

    let req = test::TestRequest::get().uri("/latest_detections").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body, json!([]));
}

#[actix_rt::test]
async fn one_producer_cycle_reaches_polling_and_event_stream_consumers() {
    let state = web::Data::new(test_state());
    let app = test::init_service(App::new().app_data(state.clone()).configure(api::configure)).await;

    // Subscribe first so the detection event is not missed.
    let events = test::call_service(&app, test::TestRequest::get().uri("/events").to_request()).await;
    assert!(events.status().is_success());
    assert_eq!(
        events.headers().get("content-type").unwrap(),
        "text/event-stream"
    );
    let mut events_body = Box::pin(events.into_body());

    let detector = ScriptedDetector::new(vec![Step::Detect(vec![Detection::new(
        "person",
        0.91,
        BBox::new(1, 2, 3, 4),
    )])]);
    let mut producer = producer_for(&state, CountingSource::new(1), Some(detector));
    producer.run_cycle().unwrap();

    let req = test::TestRequest::get().uri("/latest_detections").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["class"], "person");
    assert!((body[0]["conf"].as_f64().unwrap() - 0.91).abs() < 1e-6);
    assert_eq!(body[0]["bbox"], json!([1, 2, 3, 4]));

    let record = next_chunk(&mut events_body).await;
    assert!(record.starts_with("data: DETECT|"), "got {:?}", record);
    assert!(record.ends_with("|person|0.910\n\n"), "got {:?}", record);
}

#[actix_rt::test]
async fn video_feed_waits_for_a_frame_then_streams_it() {
    let state = web::Data::new(test_state());
    let app = test::init_service(App::new().app_data(state.clone()).configure(api::configure)).await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/video_feed").to_request()).await;
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "multipart/x-mixed-replace; boundary=frame"
    );
    assert_eq!(resp.headers().get("cache-control").unwrap(), "no-cache");
    let mut body = Box::pin(resp.into_body());

    let live = state.live.clone();
    actix_rt::spawn(async move {
        actix_rt::time::sleep(Duration::from_millis(200)).await;
        live.update(Frame::new(&b"jpeg-bytes"[..], 2, 2, 1), Vec::new());
    });

    let part = next_chunk(&mut body).await;
    let expected = mjpeg_part(&Frame::new(&b"jpeg-bytes"[..], 2, 2, 1));
    assert_eq!(part.as_bytes(), expected.as_ref());

    drop(body);
    assert_eq!(state.metrics.mjpeg_clients.get(), 0);
}

#[actix_rt::test]
async fn update_status_merges_and_publishes_status_event() {
    let state = web::Data::new(test_state());
    let app = test::init_service(App::new().app_data(state.clone()).configure(api::configure)).await;
    let sub = state.bus.subscribe();

    let req = test::TestRequest::post()
        .uri("/update_status")
        .set_json(json!({"lat": 12.97, "temp": 31}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, json!({"ok": true}));

    let status = state.status.snapshot();
    assert_eq!(status["lat"], json!(12.97));
    assert_eq!(status["lon"], Value::Null);

    let event = sub.try_recv().expect("status event");
    assert!(matches!(event.payload, EventPayload::Status(_)));
    assert!(event.wire_payload().starts_with("STATUS|"));

    // Non-object bodies are accepted without changing the store.
    let req = test::TestRequest::post()
        .uri("/update_status")
        .set_payload("[1, 2]")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, json!({"ok": true}));
    assert_eq!(state.status.snapshot(), status);
}

#[actix_rt::test]
async fn chat_with_unreachable_assistant_returns_fallback_reply() {
    let state = web::Data::new(test_state());
    let app = test::init_service(App::new().app_data(state.clone()).configure(api::configure)).await;
    let sub = state.bus.subscribe();

    let req = test::TestRequest::post()
        .uri("/chat")
        .set_json(json!({"query": "what do you see?"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let body: Value = test::read_body_json(resp).await;

    let reply = body["reply"].as_str().unwrap();
    assert!(reply.starts_with("(assistant error)"), "got {}", reply);
    match &sub.try_recv().expect("assistant event").payload {
        EventPayload::Reply(text) => assert_eq!(text, reply),
        other => panic!("unexpected payload {:?}", other),
    }
}

#[actix_rt::test]
async fn health_and_metrics_report_node_state() {
    let state = web::Data::new(test_state());
    let app = test::init_service(App::new().app_data(state.clone()).configure(api::configure)).await;
    state.live.update(Frame::new(&b"x"[..], 1, 1, 1), Vec::new());

    let req = test::TestRequest::get().uri("/health").to_request();
    let health: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(health["has_frame"], json!(true));
    assert_eq!(health["subscribers"], json!(0));
    assert_eq!(health["state"], Value::Null);

    state.metrics.frames_captured.inc();
    let req = test::TestRequest::get().uri("/metrics").to_request();
    let text = test::call_and_read_body(&app, req).await;
    let text = String::from_utf8(text.to_vec()).unwrap();
    assert!(text.contains("mitra_frames_captured_total 1"));

    let req = test::TestRequest::get().uri("/").to_request();
    let page = test::call_and_read_body(&app, req).await;
    assert!(String::from_utf8_lossy(&page).contains("/video_feed"));
}
