use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, CONNECTION,
    PRAGMA, UPGRADE_INSECURE_REQUESTS, USER_AGENT,
};

use super::core::CircleCiClient;
use crate::error::{Result, ScanError};

const BROWSER_HEADERS: [(HeaderName, &str); 7] = [
    (
        ACCEPT,
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.9",
    ),
    (ACCEPT_LANGUAGE, "en-US,en;q=0.9"),
    (CACHE_CONTROL, "no-cache"),
    (CONNECTION, "keep-alive"),
    (PRAGMA, "no-cache"),
    (UPGRADE_INSECURE_REQUESTS, "1"),
    (
        USER_AGENT,
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/102.0.0.0 Safari/537.36",
    ),
];

/// Headers sent with every log download. Step output lives in a public object
/// store that serves mangled bodies to clients it does not recognise.
pub(super) fn browser_headers() -> HeaderMap {
    BROWSER_HEADERS
        .into_iter()
        .map(|(name, value)| (name, HeaderValue::from_static(value)))
        .collect()
}

impl CircleCiClient {
    /// Downloads a step output log without the CircleCI token.
    ///
    /// The body is returned byte for byte (no content decoding is negotiated),
    /// with invalid UTF-8 replaced rather than rejected.
    pub async fn fetch_log_body(&self, url: &str) -> Result<String> {
        let response = self.log_client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScanError::Api {
                status: status.as_u16(),
                message: format!("log download failed for {url}"),
            });
        }

        let bytes = response.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
