// Copyright (C) 2020-2026  The Blockhouse Technology Limited (TBTL).
//
// This program is free software: you can redistribute it and/or modify it
// under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or (at your
// option) any later version.
//
// This program is distributed in the hope that it will be useful, but
// WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public
// License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use std::{future::Future, time::Duration};

use bh_uri_utils::UriPathExtensions as _;
use bherror::{
    traits::{ErrorContext as _, ForeignError as _, PropagateError as _},
    Error,
};
use reqwest::{Client, ClientBuilder, StatusCode, Url};
use serde::{de::DeserializeOwned, Deserialize};

use super::{CertificateDirectory, CertificateRecord};
use crate::{DirectoryError, RetryPolicy};

type Result<T> = bherror::Result<T, DirectoryError>;

/// Configuration of a [`HttpCertificateDirectory`].
///
/// The `retry` policy is not applied by the directory itself; it is meant for
/// the [`SignatureVerifier`](crate::SignatureVerifier) wrapping it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DirectoryConfig {
    /// Base URL of the directory service.
    pub base_url: String,
    /// Timeout of a single request, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Retry policy for transient lookup failures.
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_timeout_secs() -> u64 {
    10
}

/// Interface providing functionality of sending HTTP GET request.
///
/// Allows the transport to be replaced, e.g. by a client restricted to known
/// hosts, or by a stub in tests.
pub trait HttpGetClient: Sync {
    /// Error type used by this trait.
    type Err: std::error::Error + Send + Sync + 'static;

    /// Performs a HTTP GET request with provided `url`.
    fn get(
        &self,
        url: &str,
    ) -> impl Future<Output = std::result::Result<reqwest::Response, Self::Err>> + Send;
}

/// [`HttpGetClient`] implementation using the [`reqwest`] crate.
pub struct ReqwestGetClient(Client);

impl ReqwestGetClient {
    /// Construct [`ReqwestGetClient`] from [`Client`].
    pub fn new(client: Client) -> Self {
        Self(client)
    }

    /// Construct [`ReqwestGetClient`] from [`ClientBuilder`].
    pub fn from_builder(builder: ClientBuilder) -> reqwest::Result<Self> {
        Ok(Self(builder.build()?))
    }
}

impl HttpGetClient for ReqwestGetClient {
    type Err = reqwest::Error;

    fn get(&self, url: &str) -> impl Future<Output = reqwest::Result<reqwest::Response>> {
        self.0.get(url).send()
    }
}

/// [`CertificateDirectory`] backed by the directory's HTTP API.
///
/// | query                     | request                                      |
/// |---------------------------|----------------------------------------------|
/// | by identifiers            | `GET {base}/certificates/{authority}/{cert}` |
/// | by provider name          | `GET {base}/certificates?provider={name}`    |
/// | by serial number          | `GET {base}/certificates/serial/{serial}`    |
/// | currently valid           | `GET {base}/certificates/valid`              |
///
/// A `404 Not Found` answer is a definitive miss. Transport failures, `429`
/// and `5xx` answers are transient.
pub struct HttpCertificateDirectory<C: HttpGetClient = ReqwestGetClient> {
    client: C,
    base_url: Url,
}

impl HttpCertificateDirectory<ReqwestGetClient> {
    /// Builds the directory, and its [`reqwest`] client, from configuration.
    pub fn from_config(config: &DirectoryConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .foreign_err(|| DirectoryError::InvalidUrl(config.base_url.clone()))?;

        let client = ReqwestGetClient::from_builder(
            ClientBuilder::new().timeout(Duration::from_secs(config.timeout_secs)),
        )
        .foreign_err(|| DirectoryError::Configuration("unable to build HTTP client".to_owned()))?;

        Ok(Self::new(client, base_url))
    }
}

impl<C: HttpGetClient> HttpCertificateDirectory<C> {
    /// Construct [`HttpCertificateDirectory`] from a [`HttpGetClient`] and
    /// the base URL of the service.
    pub fn new(client: C, base_url: Url) -> Self {
        Self { client, base_url }
    }

    /// Returns all certificates of the named provider.
    pub async fn by_provider(&self, provider_name: &str) -> Result<Vec<CertificateRecord>> {
        let mut url = self.url("/certificates")?;
        url.query_pairs_mut().append_pair("provider", provider_name);

        Ok(self.get_json(&url).await?.unwrap_or_default())
    }

    /// Returns the certificate with the given serial number.
    pub async fn by_serial(&self, serial_number: &str) -> Result<Option<CertificateRecord>> {
        let url = self.url(&format!("/certificates/serial/{serial_number}"))?;
        self.get_json(&url).await
    }

    /// Returns the certificates whose validity window contains the current
    /// time.
    pub async fn currently_valid(&self) -> Result<Vec<CertificateRecord>> {
        let url = self.url("/certificates/valid")?;
        Ok(self.get_json(&url).await?.unwrap_or_default())
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .clone()
            .add_path_suffix(path)
            .with_err(|| DirectoryError::InvalidUrl(path.to_owned()))
    }

    /// GETs and deserializes `url`, mapping `404` to [`None`].
    async fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<Option<T>> {
        let response = self
            .client
            .get(url.as_str())
            .await
            .foreign_err(|| DirectoryError::Unavailable("request failed".to_owned()))
            .ctx(|| format!("GET {url}"))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::root(DirectoryError::Unavailable(format!(
                "status code was {status}"
            ))));
        }
        if status != StatusCode::OK {
            return Err(Error::root(DirectoryError::InvalidResponse(format!(
                "status code was {status}, expected 200 OK"
            ))));
        }

        let body = response
            .json()
            .await
            .foreign_err(|| DirectoryError::InvalidResponse("body is not valid JSON".to_owned()))
            .ctx(|| format!("GET {url}"))?;

        Ok(Some(body))
    }
}

impl<C: HttpGetClient> CertificateDirectory for HttpCertificateDirectory<C> {
    async fn lookup(
        &self,
        authority_id: &str,
        certificate_id: &str,
    ) -> Result<Option<CertificateRecord>> {
        let url = self.url(&format!("/certificates/{authority_id}/{certificate_id}"))?;
        self.get_json(&url).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use assert_matches::assert_matches;
    use serde_json::{json, Value};

    use super::*;

    struct StubClient {
        requested: Mutex<Vec<String>>,
        status: u16,
        body: String,
    }

    impl StubClient {
        fn new(status: u16, body: Value) -> Self {
            Self {
                requested: Mutex::new(Vec::new()),
                status,
                body: body.to_string(),
            }
        }
    }

    impl HttpGetClient for StubClient {
        type Err = reqwest::Error;

        async fn get(&self, url: &str) -> reqwest::Result<reqwest::Response> {
            self.requested.lock().unwrap().push(url.to_owned());
            let response = http::Response::builder()
                .status(self.status)
                .header("Content-Type", "application/json")
                .body(self.body.clone())
                .unwrap();
            Ok(reqwest::Response::from(response))
        }
    }

    fn directory(client: StubClient) -> HttpCertificateDirectory<StubClient> {
        HttpCertificateDirectory::new(
            client,
            Url::parse("https://directory.example.com/api").unwrap(),
        )
    }

    fn record_json() -> Value {
        json!({
            "serial_number": "1A2B",
            "provider_name": "ANTS",
            "public_key": "BAEC",
            "key_type": "EC",
            "key_curve_name": "prime256v1",
            "not_valid_before": "2020-01-01T00:00:00Z",
            "not_valid_after": "2030-01-01T00:00:00Z",
        })
    }

    #[tokio::test]
    async fn test_lookup_found() {
        let directory = directory(StubClient::new(200, record_json()));

        let record = directory.lookup("FR00", "0001").await.unwrap().unwrap();

        assert_eq!(record.serial_number, "1A2B");
        assert_eq!(record.public_key_bytes, vec![0x04, 0x01, 0x02]);
        assert_eq!(
            directory.client.requested.lock().unwrap().as_slice(),
            ["https://directory.example.com/api/certificates/FR00/0001"]
        );
    }

    #[tokio::test]
    async fn test_lookup_not_found() {
        let directory = directory(StubClient::new(404, json!({"detail": "not found"})));

        assert_eq!(directory.lookup("FR00", "0001").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_lookup_server_error_is_transient() {
        let directory = directory(StubClient::new(503, json!({})));

        let err = directory.lookup("FR00", "0001").await.unwrap_err();

        assert_matches!(err.error, DirectoryError::Unavailable(_));
        assert!(err.error.is_retryable());
    }

    #[tokio::test]
    async fn test_lookup_unexpected_status_is_permanent() {
        let directory = directory(StubClient::new(403, json!({})));

        let err = directory.lookup("FR00", "0001").await.unwrap_err();

        assert_matches!(err.error, DirectoryError::InvalidResponse(_));
        assert!(!err.error.is_retryable());
    }

    #[tokio::test]
    async fn test_lookup_invalid_body() {
        let directory = directory(StubClient::new(200, json!({"serial_number": 1})));

        let err = directory.lookup("FR00", "0001").await.unwrap_err();

        assert_matches!(err.error, DirectoryError::InvalidResponse(_));
    }

    #[tokio::test]
    async fn test_by_provider_encodes_query() {
        let directory = directory(StubClient::new(200, json!([record_json()])));

        let records = directory.by_provider("Imprimerie Nationale").await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(
            directory.client.requested.lock().unwrap().as_slice(),
            ["https://directory.example.com/api/certificates?provider=Imprimerie+Nationale"]
        );
    }

    #[tokio::test]
    async fn test_by_serial_and_currently_valid() {
        let directory = directory(StubClient::new(200, record_json()));
        assert!(directory.by_serial("1A2B").await.unwrap().is_some());

        let directory = self::directory(StubClient::new(404, json!({})));
        assert!(directory.currently_valid().await.unwrap().is_empty());
    }

    #[test]
    fn test_config_defaults() {
        let config: DirectoryConfig =
            serde_json::from_value(json!({"base_url": "https://directory.example.com"})).unwrap();

        assert_eq!(config.timeout_secs, 10);
        assert_eq!(config.retry, RetryPolicy::default());
        assert!(HttpCertificateDirectory::from_config(&config).is_ok());
    }

    #[test]
    fn test_config_invalid_url() {
        let config = DirectoryConfig {
            base_url: "not a url".to_owned(),
            timeout_secs: 1,
            retry: RetryPolicy::none(),
        };

        let err = HttpCertificateDirectory::from_config(&config).err().unwrap();
        assert_matches!(err.error, DirectoryError::InvalidUrl(_));
    }
}
