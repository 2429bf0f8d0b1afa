use crate::core::pagination::parse_link_header;
use crate::utils::error::{HubError, Result};
use reqwest::header::LINK;
use reqwest::{Client, Request};
use serde::de::DeserializeOwned;
use std::collections::HashMap;

/// A successful (2xx) vendor response, body already read.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    /// `rel` -> URL, from the `Link` header when present.
    pub links: HashMap<String, String>,
    /// Raw body bytes, exactly as sent.
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// The body as text, with invalid UTF-8 replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn next_link(&self) -> Option<&str> {
        self.links.get("next").map(String::as_str)
    }
}

/// Sends `request` and turns any non-2xx status into [`HubError::ApiError`]
/// carrying the status code and the response body.
pub async fn execute(client: &Client, service: &'static str, request: Request) -> Result<ApiResponse> {
    let url = request.url().to_string();
    tracing::debug!("{}: {} {}", service, request.method(), url);

    let response = client.execute(request).await?;
    let status = response.status();

    let links = response
        .headers()
        .get(LINK)
        .and_then(|value| value.to_str().ok())
        .map(parse_link_header)
        .unwrap_or_default();

    let body = response.bytes().await?.to_vec();
    tracing::debug!("{}: {} -> {} ({} bytes)", service, url, status.as_u16(), body.len());

    if !status.is_success() {
        return Err(HubError::ApiError {
            service,
            status: status.as_u16(),
            url,
            body: String::from_utf8_lossy(&body).into_owned(),
        });
    }

    Ok(ApiResponse {
        status: status.as_u16(),
        links,
        body,
    })
}

/// Fails fast before any I/O when a client was built without a token.
pub fn require_token(service: &'static str, token: &str) -> Result<()> {
    if token.is_empty() {
        return Err(HubError::MissingToken { service });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[tokio::test]
    async fn test_execute_success_reads_body_and_links() {
        let server = MockServer::start();
        let next = server.url("/items?page=2");

        let api_mock = server.mock(|when, then| {
            when.method(GET).path("/items");
            then.status(200)
                .header("Link", format!("<{}>; rel=\"next\"", next).as_str())
                .body("[1,2]");
        });

        let client = Client::new();
        let request = client.get(server.url("/items")).build().unwrap();
        let response = execute(&client, "Test", request).await.unwrap();

        api_mock.assert();
        assert_eq!(response.status, 200);
        assert_eq!(response.next_link(), Some(next.as_str()));
        let items: Vec<i32> = response.json().unwrap();
        assert_eq!(items, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_execute_keeps_binary_body_intact() {
        let server = MockServer::start();
        let bytes: Vec<u8> = vec![0x1f, 0x8b, 0x08, 0x00, 0xff, 0xc3, 0x28];

        server.mock(|when, then| {
            when.method(GET).path("/archive.gz");
            then.status(200).body(bytes.clone());
        });

        let client = Client::new();
        let request = client.get(server.url("/archive.gz")).build().unwrap();
        let response = execute(&client, "Test", request).await.unwrap();

        assert_eq!(response.body, bytes);
        assert!(response.text().contains('\u{FFFD}'));
    }

    #[tokio::test]
    async fn test_execute_non_success_becomes_api_error() {
        let server = MockServer::start();

        server.mock(|when, then| {
            when.method(GET).path("/missing");
            then.status(404).body("{\"message\":\"Not Found\"}");
        });

        let client = Client::new();
        let request = client.get(server.url("/missing")).build().unwrap();
        let err = execute(&client, "Test", request).await.unwrap_err();

        match err {
            HubError::ApiError {
                service,
                status,
                body,
                ..
            } => {
                assert_eq!(service, "Test");
                assert_eq!(status, 404);
                assert!(body.contains("Not Found"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_require_token() {
        assert!(require_token("Aha", "abc").is_ok());
        assert!(matches!(
            require_token("Aha", ""),
            Err(HubError::MissingToken { service: "Aha" })
        ));
    }
}
