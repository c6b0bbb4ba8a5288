use async_trait::async_trait;
use futures_util::TryStreamExt;
use tokio_util::io::StreamReader;
use tracing::debug;

use np_core::release::{
    parse_package_info, parse_package_list, parse_release_info, parse_release_list,
};
use np_core::{Error, PackageInfo, ReleaseInfo, ReleaseSet};

use crate::traits::{ArchiveStream, ReleaseClient, TransportError};

pub const DEFAULT_BASE_URL: &str = "https://pecl.php.net/rest";

/// Client for the PECL REST interface.
pub struct PeclClient {
    base_url: String,
    client: reqwest::Client,
}

/// What a 404 from a given endpoint means.
enum Missing<'a> {
    Package(&'a str),
    Release(&'a str, &'a str),
    Category(&'a str),
    Resource,
}

impl Missing<'_> {
    fn into_error(self, url: &str) -> Error {
        match self {
            Missing::Package(name) => Error::PackageNotFound {
                name: name.to_string(),
            },
            Missing::Release(name, version) => Error::ReleaseNotFound {
                name: name.to_string(),
                version: version.to_string(),
            },
            Missing::Category(category) => Error::CategoryNotFound {
                category: category.to_string(),
            },
            Missing::Resource => Error::ProtocolFailure {
                message: format!("nothing found at {}", url),
            },
        }
    }
}

impl PeclClient {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL.to_string())
    }

    pub fn with_base_url(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("notpecl/", env!("CARGO_PKG_VERSION")))
            .pool_max_idle_per_host(8)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Every package the registry publishes.
    pub async fn list_packages(&self) -> Result<Vec<String>, Error> {
        let url = format!("{}/p/packages.xml", self.base_url);
        let body = self.get_text(&url, Missing::Resource).await?;
        parse_package_list(&body)
    }

    pub async fn list_packages_in_category(&self, category: &str) -> Result<Vec<String>, Error> {
        let url = format!("{}/c/{}/packages.xml", self.base_url, category);
        let body = self.get_text(&url, Missing::Category(category)).await?;
        parse_package_list(&body)
    }

    pub async fn describe_package(&self, name: &str) -> Result<PackageInfo, Error> {
        let url = format!("{}/p/{}/info.xml", self.base_url, name.to_lowercase());
        let body = self.get_text(&url, Missing::Package(name)).await?;
        parse_package_info(&body)
    }

    async fn send(&self, url: &str, missing: Missing<'_>) -> Result<reqwest::Response, Error> {
        debug!(url, "GET");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::NetworkFailure {
                message: e.to_string(),
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(missing.into_error(url));
        }
        if status != reqwest::StatusCode::OK {
            return Err(Error::ProtocolFailure {
                message: format!("unexpected HTTP {} from {}", status, url),
            });
        }

        Ok(response)
    }

    async fn get_text(&self, url: &str, missing: Missing<'_>) -> Result<String, Error> {
        let response = self.send(url, missing).await?;
        response.text().await.map_err(|e| Error::NetworkFailure {
            message: format!("failed to read response body: {e}"),
        })
    }
}

impl Default for PeclClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReleaseClient for PeclClient {
    async fn list_releases(&self, name: &str) -> Result<ReleaseSet, Error> {
        let url = format!("{}/r/{}/allreleases.xml", self.base_url, name.to_lowercase());
        let body = self.get_text(&url, Missing::Package(name)).await?;
        parse_release_list(&body)
    }

    async fn describe_release(&self, name: &str, version: &str) -> Result<ReleaseInfo, Error> {
        let url = format!("{}/r/{}/{}.xml", self.base_url, name.to_lowercase(), version);
        let body = self
            .get_text(&url, Missing::Release(name, version))
            .await?;
        parse_release_info(&body)
    }

    async fn download_release(&self, release: &ReleaseInfo) -> Result<ArchiveStream, Error> {
        let url = release.archive_url().ok_or_else(|| Error::ProtocolFailure {
            message: format!(
                "release {} of '{}' has no archive location",
                release.version, release.package
            ),
        })?;

        let response = self.send(&url, Missing::Resource).await?;
        let stream = response.bytes_stream().map_err(TransportError::io);

        Ok(Box::pin(StreamReader::new(stream)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use np_core::Stability;
    use tokio::io::AsyncReadExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ALL_RELEASES: &str = include_str!("../../np_core/fixtures/allreleases_redis.xml");
    const RELEASE: &str = include_str!("../../np_core/fixtures/release_redis_5.1.1.xml");

    async fn mount(server: &MockServer, at: &str, template: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(template)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn lists_releases_from_mock_server() {
        let server = MockServer::start().await;
        mount(
            &server,
            "/r/redis/allreleases.xml",
            ResponseTemplate::new(200).set_body_string(ALL_RELEASES),
        )
        .await;

        let client = PeclClient::with_base_url(server.uri());
        let releases = client.list_releases("redis").await.unwrap();

        assert_eq!(releases.len(), 4);
        assert_eq!(releases.stability("5.3.7"), Some(Stability::Stable));
    }

    #[tokio::test]
    async fn package_names_are_lowercased_in_urls() {
        let server = MockServer::start().await;
        mount(
            &server,
            "/r/redis/allreleases.xml",
            ResponseTemplate::new(200).set_body_string(ALL_RELEASES),
        )
        .await;

        let client = PeclClient::with_base_url(format!("{}/", server.uri()));
        assert_eq!(client.list_releases("Redis").await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn missing_package_is_not_found() {
        let server = MockServer::start().await;
        mount(&server, "/r/nope/allreleases.xml", ResponseTemplate::new(404)).await;

        let client = PeclClient::with_base_url(server.uri());
        let err = client.list_releases("nope").await.unwrap_err();

        assert!(matches!(err, Error::PackageNotFound { name } if name == "nope"));
    }

    #[tokio::test]
    async fn server_error_is_protocol_failure() {
        let server = MockServer::start().await;
        mount(&server, "/r/redis/allreleases.xml", ResponseTemplate::new(500)).await;

        let client = PeclClient::with_base_url(server.uri());
        let err = client.list_releases("redis").await.unwrap_err();

        assert!(matches!(err, Error::ProtocolFailure { .. }));
    }

    #[tokio::test]
    async fn malformed_body_is_protocol_failure() {
        let server = MockServer::start().await;
        mount(
            &server,
            "/r/redis/allreleases.xml",
            ResponseTemplate::new(200).set_body_string("<a><r><v>1.0</r>"),
        )
        .await;

        let client = PeclClient::with_base_url(server.uri());
        let err = client.list_releases("redis").await.unwrap_err();

        assert!(matches!(err, Error::ProtocolFailure { .. }));
    }

    #[tokio::test]
    async fn unreachable_registry_is_network_failure() {
        let client = PeclClient::with_base_url("http://127.0.0.1:1".to_string());
        let err = client.list_releases("redis").await.unwrap_err();

        assert!(matches!(err, Error::NetworkFailure { .. }));
    }

    #[tokio::test]
    async fn describes_release() {
        let server = MockServer::start().await;
        mount(
            &server,
            "/r/redis/5.1.1.xml",
            ResponseTemplate::new(200).set_body_string(RELEASE),
        )
        .await;

        let client = PeclClient::with_base_url(server.uri());
        let info = client.describe_release("redis", "5.1.1").await.unwrap();

        assert_eq!(info.package, "redis");
        assert_eq!(info.version, "5.1.1");
    }

    #[tokio::test]
    async fn missing_release_is_not_found() {
        let server = MockServer::start().await;
        mount(&server, "/r/redis/9.9.9.xml", ResponseTemplate::new(404)).await;

        let client = PeclClient::with_base_url(server.uri());
        let err = client.describe_release("redis", "9.9.9").await.unwrap_err();

        assert_eq!(
            err,
            Error::ReleaseNotFound {
                name: "redis".to_string(),
                version: "9.9.9".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn streams_archive_bytes() {
        let server = MockServer::start().await;
        let payload = vec![0x1f, 0x8b, 0x08, 0x00, 0x01, 0x02, 0x03];
        mount(
            &server,
            "/get/redis-5.1.1.tgz",
            ResponseTemplate::new(200).set_body_bytes(payload.clone()),
        )
        .await;

        let release = ReleaseInfo {
            package: "redis".to_string(),
            version: "5.1.1".to_string(),
            archive_base: format!("{}/get/redis-5.1.1", server.uri()),
            ..Default::default()
        };

        let client = PeclClient::with_base_url(server.uri());
        let mut stream = client.download_release(&release).await.unwrap();
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).await.unwrap();

        assert_eq!(buf, payload);
    }

    #[tokio::test]
    async fn release_without_archive_location_is_protocol_failure() {
        let client = PeclClient::with_base_url("http://127.0.0.1:1".to_string());
        let release = ReleaseInfo {
            package: "redis".to_string(),
            version: "5.1.1".to_string(),
            ..Default::default()
        };

        let err = match client.download_release(&release).await {
            Ok(_) => panic!("expected an error"),
            Err(e) => e,
        };
        assert!(matches!(err, Error::ProtocolFailure { .. }));
    }

    #[tokio::test]
    async fn lists_packages_in_category() {
        let server = MockServer::start().await;
        let body = r#"<l xmlns:xlink="http://www.w3.org/1999/xlink">
 <p xlink:href="/rest/p/mongodb">mongodb</p>
 <p xlink:href="/rest/p/redis">redis</p>
</l>"#;
        mount(
            &server,
            "/c/Database/packages.xml",
            ResponseTemplate::new(200).set_body_string(body),
        )
        .await;
        mount(&server, "/c/Nothing/packages.xml", ResponseTemplate::new(404)).await;

        let client = PeclClient::with_base_url(server.uri());
        assert_eq!(
            client.list_packages_in_category("Database").await.unwrap(),
            vec!["mongodb", "redis"]
        );

        let err = client.list_packages_in_category("Nothing").await.unwrap_err();
        assert!(matches!(err, Error::CategoryNotFound { category } if category == "Nothing"));
    }

    #[tokio::test]
    async fn lists_all_packages() {
        let server = MockServer::start().await;
        let body = r#"<a><p>apcu</p><p>redis</p><p>xdebug</p></a>"#;
        mount(
            &server,
            "/p/packages.xml",
            ResponseTemplate::new(200).set_body_string(body),
        )
        .await;

        let client = PeclClient::with_base_url(server.uri());
        assert_eq!(
            client.list_packages().await.unwrap(),
            vec!["apcu", "redis", "xdebug"]
        );
    }

    #[tokio::test]
    async fn describes_package() {
        let server = MockServer::start().await;
        let body = r#"<p xmlns:xlink="http://www.w3.org/1999/xlink">
 <n>apcu</n>
 <ca xlink:href="/rest/c/Caching">Caching</ca>
 <l>PHP</l>
 <s>APCu - APC User Cache</s>
 <d>APCu is an in-memory key-value store for PHP.</d>
</p>"#;
        mount(
            &server,
            "/p/apcu/info.xml",
            ResponseTemplate::new(200).set_body_string(body),
        )
        .await;

        let client = PeclClient::with_base_url(server.uri());
        let info = client.describe_package("apcu").await.unwrap();

        assert_eq!(info.name, "apcu");
        assert_eq!(info.category, "Caching");
        assert_eq!(info.summary, "APCu - APC User Cache");
    }
}
