//! HTTP transport tests against a local server.

use std::io::Read;
use std::thread;

use percy_client::{
    Config, HttpConnection, PercyError, RetryPolicy, Transport, JSON_API_CONTENT_TYPE,
};
use serde_json::json;
use tiny_http::{Header, Response, Server};

/// A request as seen by the server.
struct Seen {
    method: String,
    url: String,
    headers: Vec<(String, String)>,
    body: String,
}

impl Seen {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Serve `responses` in order, one per request, and return what was seen.
fn serve(responses: Vec<(u16, &'static str)>) -> (String, thread::JoinHandle<Vec<Seen>>) {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let handle = thread::spawn(move || {
        let mut seen = Vec::new();
        for (status, body) in responses {
            let Ok(mut request) = server.recv() else {
                break;
            };
            let mut content = String::new();
            request.as_reader().read_to_string(&mut content).unwrap();
            seen.push(Seen {
                method: request.method().to_string(),
                url: request.url().to_string(),
                headers: request
                    .headers()
                    .iter()
                    .map(|h| (h.field.to_string(), h.value.to_string()))
                    .collect(),
                body: content,
            });
            let header = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap();
            let response = Response::from_string(body)
                .with_status_code(status)
                .with_header(header);
            request.respond(response).unwrap();
        }
        seen
    });
    (format!("http://{addr}"), handle)
}

fn connection(base: &str) -> HttpConnection {
    let config = Config::new()
        .with_api_url(&format!("{base}/api/v1"))
        .with_access_token("secret-token");
    HttpConnection::new(config, None)
        .unwrap()
        .with_retry_policy(RetryPolicy {
            max_attempts: 3,
            backoff_base_ms: 1,
        })
}

/// Test: POST carries auth, content type and the JSON body
#[test]
fn test_post_sends_headers_and_body() {
    let (base, handle) = serve(vec![(201, r#"{"data":{"id":"1"}}"#)]);
    let connection = connection(&base);

    let response = connection
        .post(&format!("{base}/api/v1/builds/1/finalize"), &json!({}))
        .unwrap();
    assert_eq!(response["data"]["id"], "1");

    let seen = handle.join().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].method, "POST");
    assert_eq!(seen[0].url, "/api/v1/builds/1/finalize");
    assert_eq!(seen[0].header("Authorization"), Some("Token token=secret-token"));
    assert_eq!(seen[0].header("Content-Type"), Some(JSON_API_CONTENT_TYPE));
    assert!(seen[0]
        .header("User-Agent")
        .unwrap()
        .starts_with("Percy/v1 percy-client-rust/"));
    assert_eq!(seen[0].body, "{}");
}

/// Test: GET retries transient statuses and then succeeds
#[test]
fn test_get_retries_transient_status() {
    let (base, handle) = serve(vec![(502, "bad gateway"), (503, "busy"), (200, r#"{"ok":true}"#)]);
    let connection = connection(&base);

    let response = connection.get(&format!("{base}/api/v1/builds/1")).unwrap();
    assert_eq!(response["ok"], true);
    assert_eq!(handle.join().unwrap().len(), 3);
}

/// Test: GET gives up after the configured attempts
#[test]
fn test_get_exhausts_retries() {
    let (base, handle) = serve(vec![(500, "a"), (500, "b"), (500, "c")]);
    let connection = connection(&base);

    let err = connection.get(&format!("{base}/api/v1/builds/1")).unwrap_err();
    assert!(matches!(err, PercyError::Api { status: 500, ref body } if body == "c"));
    assert_eq!(handle.join().unwrap().len(), 3);
}

/// Test: POST is not retried once the server has answered
#[test]
fn test_post_does_not_retry_status() {
    let (base, handle) = serve(vec![(503, "unavailable")]);
    let connection = connection(&base);

    let err = connection
        .post(&format!("{base}/api/v1/builds/1/finalize"), &json!({}))
        .unwrap_err();
    assert!(matches!(err, PercyError::Api { status: 503, .. }));
    assert_eq!(handle.join().unwrap().len(), 1);
}

/// Test: client errors surface status and body
#[test]
fn test_client_error_is_api_error() {
    let (base, handle) = serve(vec![(422, r#"{"errors":[{"detail":"bad"}]}"#)]);
    let connection = connection(&base);

    let err = connection.get(&format!("{base}/api/v1/builds/1")).unwrap_err();
    match err {
        PercyError::Api { status, body } => {
            assert_eq!(status, 422);
            assert!(body.contains("bad"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(handle.join().unwrap().len(), 1);
}

/// Test: connection refused surfaces as an HTTP error after retries
#[test]
fn test_connection_refused_is_http_error() {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    drop(server);
    let base = format!("http://{addr}");

    let err = connection(&base)
        .post(&format!("{base}/api/v1/builds/1/finalize"), &json!({}))
        .unwrap_err();
    assert!(matches!(err, PercyError::Http(_)));
}
