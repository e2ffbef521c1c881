// Integration tests for the Inflow API
// Run with: cargo test --test integration_test -- --ignored
//
// Expects a running server (default dev credentials):
//   API_KEYS=dev_key_123=tenant_dev cargo run -p inflow-api

use serde_json::{json, Value};

const API_BASE_URL: &str = "http://localhost:8000";
const API_KEY: &str = "dev_key_123";

#[tokio::test]
#[ignore] // Run with: cargo test --test integration_test -- --ignored
async fn test_full_event_lifecycle() {
    let client = reqwest::Client::new();
    let idempotency_key = format!("it-{}", uuid_like());

    // Step 1: Ingest an event
    let create_response = client
        .post(format!("{API_BASE_URL}/v1/events"))
        .header("X-API-Key", API_KEY)
        .header("X-Idempotency-Key", &idempotency_key)
        .json(&json!({
            "source": "billing",
            "type": "invoice.paid",
            "topic": "finance",
            "payload": {"invoiceId": "inv_123", "amount": 4200, "currency": "USD"}
        }))
        .send()
        .await
        .expect("Failed to create event");
    assert_eq!(create_response.status(), 200);
    let created: Value = create_response.json().await.expect("Failed to parse event");
    assert_eq!(created["status"], "accepted");
    let event_id = created["id"].as_str().expect("missing event id").to_string();

    // Step 2: An identical retry conflicts and references the original
    let retry_response = client
        .post(format!("{API_BASE_URL}/v1/events"))
        .header("X-API-Key", API_KEY)
        .header("X-Idempotency-Key", &idempotency_key)
        .json(&json!({"payload": {}}))
        .send()
        .await
        .expect("Failed to retry event");
    assert_eq!(retry_response.status(), 409);
    let conflict: Value = retry_response.json().await.expect("Failed to parse conflict");
    assert_eq!(conflict["error"]["code"], "IDEMPOTENCY_CONFLICT");
    assert_eq!(conflict["error"]["existing_event_id"], event_id.as_str());

    // Step 3: The event shows up in the inbox
    let inbox_response = client
        .get(format!("{API_BASE_URL}/v1/inbox"))
        .header("X-API-Key", API_KEY)
        .query(&[("topic", "finance"), ("limit", "500")])
        .send()
        .await
        .expect("Failed to list inbox");
    assert_eq!(inbox_response.status(), 200);
    let inbox: Value = inbox_response.json().await.expect("Failed to parse inbox");
    let ids: Vec<&str> = inbox["events"]
        .as_array()
        .expect("missing events array")
        .iter()
        .filter_map(|event| event["id"].as_str())
        .collect();
    assert!(ids.contains(&event_id.as_str()));

    // Step 4: Acknowledge, twice (idempotent)
    for _ in 0..2 {
        let ack_response = client
            .post(format!("{API_BASE_URL}/v1/inbox/{event_id}/ack"))
            .header("X-API-Key", API_KEY)
            .send()
            .await
            .expect("Failed to acknowledge event");
        assert_eq!(ack_response.status(), 200);
    }

    // Step 5: Delete, then confirm the repeat conflicts
    let delete_response = client
        .delete(format!("{API_BASE_URL}/v1/inbox/{event_id}"))
        .header("X-API-Key", API_KEY)
        .send()
        .await
        .expect("Failed to delete event");
    assert_eq!(delete_response.status(), 200);

    let repeat_delete = client
        .delete(format!("{API_BASE_URL}/v1/inbox/{event_id}"))
        .header("X-API-Key", API_KEY)
        .send()
        .await
        .expect("Failed to repeat delete");
    assert_eq!(repeat_delete.status(), 409);
}

#[tokio::test]
#[ignore]
async fn test_health_endpoints() {
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{API_BASE_URL}/health"))
        .send()
        .await
        .expect("Failed to reach health endpoint");
    assert_eq!(response.status(), 200);

    let detailed: Value = client
        .get(format!("{API_BASE_URL}/health/detailed"))
        .send()
        .await
        .expect("Failed to reach detailed health endpoint")
        .json()
        .await
        .expect("Failed to parse detailed health");
    assert_eq!(detailed["components"]["storage"]["status"], "healthy");
}

/// Unique-enough suffix without pulling a uuid dev-dependency into the
/// integration harness.
fn uuid_like() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock before epoch")
        .as_nanos()
}
