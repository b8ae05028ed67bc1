//! Integration tests for the result listener over real HTTP

use challenge_runner::{OrchestratorError, ResultRendezvous};
use reqwest::StatusCode;
use std::net::SocketAddr;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

// ============================================================================
// TEST HELPERS
// ============================================================================

const SECRET: &str = "0f1e2d3c4b5a69788796a5b4c3d2e1f0";

async fn bind() -> (ResultRendezvous, String) {
    let rendezvous = ResultRendezvous::bind("127.0.0.1:0".parse::<SocketAddr>().unwrap())
        .await
        .unwrap()
        .with_secret(SECRET);
    let url = format!("http://{}", rendezvous.local_addr().unwrap());
    (rendezvous, url)
}

// ============================================================================
// TESTS
// ============================================================================

#[tokio::test]
async fn test_result_body_delivered_verbatim() {
    let (rendezvous, url) = bind().await;
    let waiter = tokio::spawn(rendezvous.receive(Some(Duration::from_secs(10))));

    let response = reqwest::Client::new()
        .post(format!("{}/", url))
        .header("X-Runner-Secret", SECRET)
        .body(r#"{"score": 100, "passed": true}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "OK");

    let request = assert_ok!(waiter.await.unwrap());
    assert_eq!(request.method, "POST");
    assert_eq!(
        request.json().unwrap(),
        serde_json::json!({"score": 100, "passed": true})
    );
}

#[tokio::test]
async fn test_any_method_and_path_accepted() {
    let (rendezvous, url) = bind().await;
    let waiter = tokio::spawn(rendezvous.receive(Some(Duration::from_secs(10))));

    let response = reqwest::Client::new()
        .put(format!("{}/tasks/42/result", url))
        .header("X-Runner-Secret", SECRET)
        .body("{}")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let request = assert_ok!(waiter.await.unwrap());
    assert_eq!(request.method, "PUT");
    assert_eq!(request.path, "/tasks/42/result");
}

#[tokio::test]
async fn test_request_without_secret_does_not_count() {
    let (rendezvous, url) = bind().await;
    let waiter = tokio::spawn(rendezvous.receive(Some(Duration::from_secs(10))));
    let client = reqwest::Client::new();

    let rejected = client
        .post(&url)
        .json(&serde_json::json!({"score": 0}))
        .send()
        .await
        .unwrap();
    assert_eq!(rejected.status(), StatusCode::UNAUTHORIZED);

    let wrong = client
        .post(&url)
        .header("X-Runner-Secret", "guess")
        .json(&serde_json::json!({"score": 1}))
        .send()
        .await
        .unwrap();
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    // Secret carried in the body instead of the header
    let accepted = client
        .post(&url)
        .json(&serde_json::json!({"score": 87, "secret": SECRET}))
        .send()
        .await
        .unwrap();
    assert_eq!(accepted.status(), StatusCode::OK);

    let request = assert_ok!(waiter.await.unwrap());
    assert_eq!(request.json().unwrap()["score"], 87);
}

#[tokio::test]
async fn test_only_one_of_concurrent_results_delivered() {
    let (rendezvous, url) = bind().await;
    let waiter = tokio::spawn(rendezvous.receive(Some(Duration::from_secs(10))));
    let client = reqwest::Client::new();

    let send = |n: u32| {
        let client = client.clone();
        let url = url.clone();
        async move {
            client
                .post(&url)
                .header("X-Runner-Secret", SECRET)
                .json(&serde_json::json!({"attempt": n}))
                .send()
                .await
                .map(|response| response.status())
        }
    };
    let (first, second) = tokio::join!(send(1), send(2));

    let accepted = [&first, &second]
        .iter()
        .filter(|status| matches!(status, Ok(StatusCode::OK)))
        .count();
    assert_eq!(accepted, 1);

    let request = assert_ok!(waiter.await.unwrap());
    let attempt = request.json().unwrap()["attempt"].as_u64().unwrap();
    let winner = if matches!(first, Ok(StatusCode::OK)) { 1 } else { 2 };
    assert_eq!(attempt, winner);
}

#[tokio::test]
async fn test_listener_closed_after_result() {
    let (rendezvous, url) = bind().await;
    let waiter = tokio::spawn(rendezvous.receive(Some(Duration::from_secs(10))));
    let client = reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .build()
        .unwrap();

    client
        .post(&url)
        .header("X-Runner-Secret", SECRET)
        .body("{}")
        .send()
        .await
        .unwrap();
    assert_ok!(waiter.await.unwrap());

    assert_err!(client.post(&url).body("{}").send().await);
}

#[tokio::test]
async fn test_silent_runner_times_out() {
    let (rendezvous, _url) = bind().await;
    let err = rendezvous
        .receive(Some(Duration::from_millis(100)))
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::RendezvousTimeout(d) if d == Duration::from_millis(100)));
}
