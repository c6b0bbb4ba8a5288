//! Test utilities for notpecl
//!
//! - `TestContext` - Wraps TempDir and a MockServer standing in for the registry
//! - Registry fixtures - Release lists, release descriptions, package.xml
//! - Source archives - `.tgz` files laid out like PECL releases, built in memory
//!
//! # Example
//!
//! ```ignore
//! use np_io::test_utils::TestContext;
//!
//! #[tokio::test]
//! async fn test_download() {
//!     let ctx = TestContext::new().await;
//!     ctx.mount_package("apcu", &[("5.1.22", "stable")]).await;
//!
//!     let path = ctx.fetcher().download("apcu", "5.1.22", &ctx.download_dir()).await.unwrap();
//!     assert!(path.join("config.m4").exists());
//! }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use flate2::Compression;
use flate2::write::GzEncoder;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::api::PeclClient;
use crate::fetch::ArchiveFetcher;
use crate::resolver::VersionResolver;

// ============================================================================
// Registry fixtures
// ============================================================================

/// `allreleases.xml` body for `releases` given as (version, stability).
pub fn mock_allreleases_xml(name: &str, releases: &[(&str, &str)]) -> String {
    let entries: String = releases
        .iter()
        .map(|(version, stability)| format!(" <r><v>{version}</v><s>{stability}</s></r>\n"))
        .collect();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8" ?>
<a xmlns="http://pear.php.net/dtd/rest.allreleases" xmlns:xlink="http://www.w3.org/1999/xlink">
 <p>{name}</p>
 <c>pecl.php.net</c>
{entries}</a>"#
    )
}

/// `{version}.xml` release description pointing at `archive_base`.
pub fn mock_release_xml(name: &str, version: &str, stability: &str, archive_base: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" ?>
<r xmlns="http://pear.php.net/dtd/rest.release" xmlns:xlink="http://www.w3.org/1999/xlink">
 <p xlink:href="/rest/p/{name}">{name}</p>
 <c>pecl.php.net</c>
 <v>{version}</v>
 <st>{stability}</st>
 <l>PHP</l>
 <m>tester</m>
 <s>{name} test extension</s>
 <d>Extension used in tests.</d>
 <da>2024-01-01 00:00:00</da>
 <n>Initial release</n>
 <g>{archive_base}</g>
 <x xlink:href="package.{version}.xml"/>
</r>"#
    )
}

/// `info.xml` package description.
pub fn mock_package_info_xml(name: &str, category: &str, summary: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" ?>
<p xmlns="http://pear.php.net/dtd/rest.package" xmlns:xlink="http://www.w3.org/1999/xlink">
 <n>{name}</n>
 <c>pecl.php.net</c>
 <ca xlink:href="/rest/c/{category}">{category}</ca>
 <l>PHP</l>
 <s>{summary}</s>
 <d>{summary}</d>
 <r xlink:href="/rest/r/{name}"/>
</p>"#
    )
}

/// Minimal `package.xml` with the given configure options as (name, default).
pub fn mock_package_xml(name: &str, version: &str, options: &[(&str, &str)]) -> String {
    let options: String = options
        .iter()
        .map(|(option, default)| {
            format!(
                "  <configureoption name=\"{option}\" default=\"{default}\" prompt=\"{option}?\"/>\n"
            )
        })
        .collect();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package packagerversion="1.10.1" version="2.0" xmlns="http://pear.php.net/dtd/package-2.0">
 <name>{name}</name>
 <channel>pecl.php.net</channel>
 <summary>{name} test extension</summary>
 <version><release>{version}</release><api>{version}</api></version>
 <stability><release>stable</release><api>stable</api></stability>
 <license>PHP</license>
 <dependencies>
  <required>
   <php><min>7.0.0</min></php>
   <pearinstaller><min>1.4.0</min></pearinstaller>
  </required>
 </dependencies>
 <providesextension>{name}</providesextension>
 <extsrcrelease>
{options} </extsrcrelease>
</package>"#
    )
}

/// Gzipped tarball of `files` given as (path inside the archive, content).
pub fn mock_tarball(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));

    for (file_path, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_path(file_path).unwrap();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append(&header, *content).unwrap();
    }

    builder.into_inner().unwrap().finish().unwrap()
}

/// Source archive laid out like a PECL release: `package.xml` at the root
/// and the sources under `<name>-<version>/`.
pub fn mock_source_tarball(name: &str, version: &str, options: &[(&str, &str)]) -> Vec<u8> {
    let package_xml = mock_package_xml(name, version, options);
    let config_m4 = format!("PHP_ARG_ENABLE({name}, whether to enable {name}, [ --enable-{name} ])\n");
    let source = format!("/* {name} {version} */\n");

    let config_path = format!("{name}-{version}/config.m4");
    let source_path = format!("{name}-{version}/{name}.c");

    mock_tarball(&[
        ("package.xml", package_xml.as_bytes()),
        (config_path.as_str(), config_m4.as_bytes()),
        (source_path.as_str(), source.as_bytes()),
    ])
}

// ============================================================================
// TestContext - Main test infrastructure
// ============================================================================

/// Test context that wraps common test setup.
///
/// Provides:
/// - Temporary directory for downloads and installs
/// - Mock server serving the registry under `/rest` and archives under `/get`
pub struct TestContext {
    tmp: TempDir,
    server: MockServer,
}

impl TestContext {
    pub async fn new() -> Self {
        Self {
            tmp: TempDir::new().unwrap(),
            server: MockServer::start().await,
        }
    }

    pub fn path(&self) -> &Path {
        self.tmp.path()
    }

    pub fn download_dir(&self) -> PathBuf {
        self.tmp.path().join("downloads")
    }

    pub fn server(&self) -> &MockServer {
        &self.server
    }

    /// Base URL to hand to `PeclClient::with_base_url` or `--registry`.
    pub fn registry_url(&self) -> String {
        format!("{}/rest", self.server.uri())
    }

    pub fn client(&self) -> Arc<PeclClient> {
        Arc::new(PeclClient::with_base_url(self.registry_url()))
    }

    pub fn resolver(&self) -> VersionResolver {
        VersionResolver::new(self.client())
    }

    pub fn fetcher(&self) -> ArchiveFetcher {
        ArchiveFetcher::new(self.client())
    }

    async fn mount(&self, at: String, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }

    /// Serve the release list of `name`.
    pub async fn mount_releases(&self, name: &str, releases: &[(&str, &str)]) {
        self.mount(
            format!("/rest/r/{name}/allreleases.xml"),
            ResponseTemplate::new(200).set_body_string(mock_allreleases_xml(name, releases)),
        )
        .await;
    }

    /// Serve the description of one release and `archive` as its `.tgz`.
    pub async fn mount_release(&self, name: &str, version: &str, stability: &str, archive: Vec<u8>) {
        let archive_base = format!("{}/get/{name}-{version}", self.server.uri());
        self.mount(
            format!("/rest/r/{name}/{version}.xml"),
            ResponseTemplate::new(200)
                .set_body_string(mock_release_xml(name, version, stability, &archive_base)),
        )
        .await;
        self.mount(
            format!("/get/{name}-{version}.tgz"),
            ResponseTemplate::new(200).set_body_bytes(archive),
        )
        .await;
    }

    /// Serve a package with every listed release downloadable.
    pub async fn mount_package(&self, name: &str, releases: &[(&str, &str)]) {
        self.mount_releases(name, releases).await;
        for (version, stability) in releases {
            let archive = mock_source_tarball(name, version, &[]);
            self.mount_release(name, version, stability, archive).await;
        }
    }

    pub async fn mount_package_info(&self, name: &str, category: &str, summary: &str) {
        self.mount(
            format!("/rest/p/{name}/info.xml"),
            ResponseTemplate::new(200)
                .set_body_string(mock_package_info_xml(name, category, summary)),
        )
        .await;
    }

    /// Answer every request about `name` with 404.
    pub async fn mount_missing(&self, name: &str) {
        self.mount(format!("/rest/r/{name}/allreleases.xml"), ResponseTemplate::new(404))
            .await;
        self.mount(format!("/rest/p/{name}/info.xml"), ResponseTemplate::new(404))
            .await;
    }
}
