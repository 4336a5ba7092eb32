//! HTTP client construction and per-attempt request building

use std::time::Duration;

use reqwest::redirect::Policy;
use reqwest::{Client, RequestBuilder};

use crate::config::CheckState;
use crate::error::{Error, Result};

/// Redirect hops allowed when following is enabled
const MAX_REDIRECTS: usize = 10;

/// Build the engine's HTTP client from the latched state
///
/// The client is constructed once per engine. All attempts target one host,
/// so idle connections are capped at one and never reused across attempts
/// (the idle timeout is zero, which amounts to disabling keep-alive).
pub fn build_client(state: &CheckState) -> Result<Client> {
    let redirect = if state.follow_redirects {
        Policy::limited(MAX_REDIRECTS)
    } else {
        Policy::none()
    };

    let mut builder = Client::builder()
        .connect_timeout(state.connect_timeout)
        .timeout(state.read_timeout)
        .redirect(redirect)
        .pool_max_idle_per_host(1)
        .pool_idle_timeout(Duration::ZERO);

    if state.insecure_skip_verify {
        builder = builder.danger_accept_invalid_certs(true);
    }

    builder
        .build()
        .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))
}

/// Build one request attempt
///
/// Called once per ticket: the body and headers are cloned fresh so that a
/// consumed body can never leak into the next attempt.
pub fn build_request(client: &Client, state: &CheckState) -> RequestBuilder {
    let mut request = client
        .request(state.method.clone(), state.url.clone())
        .headers(state.headers.clone());
    if !state.body.is_empty() {
        request = request.body(state.body.clone());
    }
    request
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CheckConfig, CheckKind, CheckState};
    use reqwest::Method;
    use uuid::Uuid;

    fn state() -> CheckState {
        let config: CheckConfig = serde_json::from_value(serde_json::json!({
            "url": "http://localhost:8080/ping",
            "method": "POST",
            "body": "payload",
            "headers": [{"key": "X-Probe", "value": "1"}],
            "duration": 1000,
            "requestsPerSecond": 1
        }))
        .unwrap();
        CheckState::resolve(Uuid::new_v4(), CheckKind::Periodic, &config).unwrap()
    }

    #[test]
    fn test_build_client_succeeds() {
        assert!(build_client(&state()).is_ok());

        let mut insecure = state();
        insecure.insecure_skip_verify = true;
        insecure.follow_redirects = true;
        assert!(build_client(&insecure).is_ok());
    }

    #[test]
    fn test_build_request_fresh_per_attempt() {
        let state = state();
        let client = build_client(&state).unwrap();

        for _ in 0..2 {
            let request = build_request(&client, &state).build().unwrap();
            assert_eq!(request.method(), Method::POST);
            assert_eq!(request.url().as_str(), "http://localhost:8080/ping");
            assert_eq!(request.headers().get("x-probe").unwrap(), "1");
            assert!(request.body().is_some());
        }
    }

    #[test]
    fn test_build_request_omits_empty_body() {
        let mut state = state();
        state.body = String::new();
        let client = build_client(&state).unwrap();
        let request = build_request(&client, &state).build().unwrap();
        assert!(request.body().is_none());
    }
}
