//! Request plumbing shared by the vendor clients

use crate::error::{IntegrationError, IntegrationResult};
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;

pub(crate) fn build_client() -> IntegrationResult<Client> {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| IntegrationError::Http(e.to_string()))
}

/// Append path segments to a base URL, percent-encoding each one
pub(crate) fn endpoint(base: &str, segments: &[&str]) -> IntegrationResult<Url> {
    let mut url = Url::parse(base)
        .map_err(|e| IntegrationError::Config(format!("invalid base URL {}: {}", base, e)))?;
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| IntegrationError::Config(format!("base URL cannot take a path: {}", base)))?;
        path.pop_if_empty();
        path.extend(segments);
    }
    Ok(url)
}

/// Decode a 2xx body, or turn the status and body into an API error
pub(crate) async fn handle_response<T: DeserializeOwned>(response: Response) -> IntegrationResult<T> {
    let response = check_status(response).await?;
    response
        .json::<T>()
        .await
        .map_err(|e| IntegrationError::Parse(e.to_string()))
}

/// Like [`handle_response`] for endpoints that answer 204 / an ignored body
pub(crate) async fn handle_empty(response: Response) -> IntegrationResult<()> {
    check_status(response).await.map(|_| ())
}

async fn check_status(response: Response) -> IntegrationResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read error response".to_string());

    Err(IntegrationError::Api {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_encodes_segments() {
        let url = endpoint("https://example.atlassian.net/wiki", &["rest", "api", "content", "42"]).unwrap();
        assert_eq!(url.as_str(), "https://example.atlassian.net/wiki/rest/api/content/42");

        let url = endpoint("http://127.0.0.1:9000/", &["calendars", "team@example.com", "events"]).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:9000/calendars/team@example.com/events");

        let url = endpoint("http://127.0.0.1:9000", &["tickets", "a b.json"]).unwrap();
        assert_eq!(url.path(), "/tickets/a%20b.json");
    }

    #[test]
    fn test_endpoint_rejects_bad_base() {
        assert!(matches!(endpoint("not a url", &["x"]), Err(IntegrationError::Config(_))));
        assert!(matches!(endpoint("mailto:someone@example.com", &["x"]), Err(IntegrationError::Config(_))));
    }
}
