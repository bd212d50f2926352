use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use serde::de::DeserializeOwned;
use url::Url;

use super::logs::browser_headers;
use crate::auth::Token;
use crate::error::{Result, ScanError};
use crate::providers::circleci::types::ProjectSlug;

const TOKEN_HEADER: &str = "Circle-Token";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApiVersion {
    #[default]
    V2,
    /// Legacy API, still the only one exposing step output URLs
    V1_1,
}

impl ApiVersion {
    fn path_segment(self) -> &'static str {
        match self {
            Self::V2 => "v2",
            Self::V1_1 => "v1.1",
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RequestOptions {
    pub version: ApiVersion,
    /// Leave out the `gh/org/repo` (or `github/org/repo`) segment
    pub skip_context: bool,
}

impl RequestOptions {
    pub fn without_context() -> Self {
        Self {
            skip_context: true,
            ..Self::default()
        }
    }

    pub fn legacy() -> Self {
        Self {
            version: ApiVersion::V1_1,
            ..Self::default()
        }
    }
}

pub struct CircleCiClient {
    pub(super) client: Client,
    pub(super) log_client: Client,
    pub base_url: Url,
    pub project: ProjectSlug,
    token: Option<Token>,
}

impl CircleCiClient {
    pub fn new(
        base_url: &str,
        project: ProjectSlug,
        token: Option<Token>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("ciflakes/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| ScanError::Config(format!("Failed to create HTTP client: {e}")))?;

        let log_client = Client::builder()
            .default_headers(browser_headers())
            .timeout(timeout)
            .build()
            .map_err(|e| ScanError::Config(format!("Failed to create log HTTP client: {e}")))?;

        let base_url = Url::parse(base_url)
            .map_err(|e| ScanError::Config(format!("Invalid base URL: {e}")))?;

        Ok(Self {
            client,
            log_client,
            base_url,
            project,
            token,
        })
    }

    pub fn auth_request(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(token) = &self.token {
            request.headers(token_header(token))
        } else {
            request
        }
    }

    /// Builds `<base>/api/<version>/<group>/[<context>/]<path>`.
    pub fn endpoint(&self, group: &str, path: &str, options: RequestOptions) -> Result<Url> {
        let mut segments = vec![
            "api".to_string(),
            options.version.path_segment().to_string(),
            group.to_string(),
        ];

        if !options.skip_context {
            segments.push(match options.version {
                ApiVersion::V2 => self.project.v2_context(),
                ApiVersion::V1_1 => self.project.v1_context(),
            });
        }
        segments.push(path.trim_start_matches('/').to_string());

        self.base_url
            .join(&segments.join("/"))
            .map_err(|e| ScanError::Config(format!("Invalid endpoint URL: {e}")))
    }

    /// GET an endpoint and return the body untouched.
    pub async fn get_text(
        &self,
        group: &str,
        path: &str,
        query: &[(&str, String)],
        options: RequestOptions,
    ) -> Result<String> {
        let url = self.endpoint(group, path, options)?;
        log::debug!("GET {url}");

        let response = self
            .auth_request(self.client.get(url).query(query))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(ScanError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.text().await?)
    }

    /// GET an endpoint and decode its JSON body.
    pub async fn get_json<T>(
        &self,
        group: &str,
        path: &str,
        query: &[(&str, String)],
        options: RequestOptions,
    ) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let body = self.get_text(group, path, query, options).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

fn token_header(token: &Token) -> HeaderMap {
    let mut headers = HeaderMap::new();
    match HeaderValue::from_str(token.as_str()) {
        Ok(mut value) => {
            value.set_sensitive(true);
            headers.insert(TOKEN_HEADER, value);
        }
        Err(_) => log::warn!("CircleCI token contains invalid header characters, sending request without it"),
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn client(base_url: &str, token: Option<&str>) -> CircleCiClient {
        CircleCiClient::new(
            base_url,
            ProjectSlug::new("gatsbyjs", "gatsby"),
            token.map(Token::from),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn builds_v2_endpoint_with_context() {
        let url = client("https://circleci.com", None)
            .endpoint("project", "pipeline", RequestOptions::default())
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://circleci.com/api/v2/project/gh/gatsbyjs/gatsby/pipeline"
        );
    }

    #[test]
    fn builds_legacy_endpoint_with_v1_context() {
        let url = client("https://circleci.com", None)
            .endpoint("project", "1234", RequestOptions::legacy())
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://circleci.com/api/v1.1/project/github/gatsbyjs/gatsby/1234"
        );
    }

    #[test]
    fn builds_endpoint_without_context() {
        let url = client("https://circleci.com", None)
            .endpoint("workflow", "abc-123/job", RequestOptions::without_context())
            .unwrap();
        assert_eq!(url.as_str(), "https://circleci.com/api/v2/workflow/abc-123/job");
    }

    #[test]
    fn rejects_invalid_base_url() {
        let result = CircleCiClient::new(
            "not a url",
            ProjectSlug::new("o", "r"),
            None,
            Duration::from_secs(1),
        );
        assert!(matches!(result, Err(ScanError::Config(_))));
    }

    #[tokio::test]
    async fn sends_token_and_query() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v2/project/gh/gatsbyjs/gatsby/pipeline")
            .match_header("circle-token", "secret")
            .match_query(Matcher::UrlEncoded("page-token".into(), "next".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"items": [], "next_page_token": null}"#)
            .create_async()
            .await;

        let body: serde_json::Value = client(&server.url(), Some("secret"))
            .get_json(
                "project",
                "pipeline",
                &[("page-token", "next".to_string())],
                RequestOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(body["items"], serde_json::json!([]));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_success_status_is_an_api_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v2/workflow/w1/job")
            .with_status(404)
            .with_body("Not Found")
            .create_async()
            .await;

        let result: Result<serde_json::Value> = client(&server.url(), None)
            .get_json("workflow", "w1/job", &[], RequestOptions::without_context())
            .await;

        match result {
            Err(ScanError::Api { status, message }) => {
                assert_eq!(status, 404);
                assert_eq!(message, "Not Found");
            }
            other => panic!("expected API error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_json_is_a_json_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v2/project/gh/gatsbyjs/gatsby/pipeline")
            .with_status(200)
            .with_body("<html>")
            .create_async()
            .await;

        let result: Result<serde_json::Value> = client(&server.url(), None)
            .get_json("project", "pipeline", &[], RequestOptions::default())
            .await;

        assert!(matches!(result, Err(ScanError::Json(_))));
    }
}
