//! Capability traits for the collaborators of the install pipeline.
//!
//! The resolver, fetcher and build orchestrator only talk to the registry,
//! the manifest, the user and the PHP runtime through these traits, so tests
//! can swap in mocks that simulate missing packages, broken archives or a
//! runtime without the right extensions.

use std::fmt;
use std::io;
use std::path::Path;
use std::pin::Pin;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tokio::io::AsyncRead;

use np_core::{Error, Manifest, ReleaseInfo, ReleaseSet};

/// Raw archive bytes as they come off the wire.
///
/// Transport failures surface as `io::Error`s carrying a [`TransportError`]
/// so they survive the decompressor and tar reader unchanged.
pub type ArchiveStream = Pin<Box<dyn AsyncRead + Send>>;

/// Connection lost while an [`ArchiveStream`] was being read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError(pub String);

impl TransportError {
    pub fn io(err: impl fmt::Display) -> io::Error {
        io::Error::other(TransportError(err.to_string()))
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for TransportError {}

/// Typed access to the package registry.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ReleaseClient: Send + Sync {
    /// Every published version of `name` with its stability.
    async fn list_releases(&self, name: &str) -> Result<ReleaseSet, Error>;

    /// Details of a single release, including where its archive lives.
    async fn describe_release(&self, name: &str, version: &str) -> Result<ReleaseInfo, Error>;

    /// Open the archive of a described release.
    async fn download_release(&self, release: &ReleaseInfo) -> Result<ArchiveStream, Error>;
}

/// Loads the build manifest shipped with a source package.
#[cfg_attr(test, automock)]
pub trait ManifestLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<Manifest, Error>;
}

/// Asks the user for a value, offering a default.
#[cfg_attr(test, automock)]
pub trait Prompt: Send + Sync {
    fn prompt(&self, question: &str, default: &str) -> Result<String, Error>;
}

/// Introspection of the PHP runtime extensions are built against.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RuntimeProbe: Send + Sync {
    async fn version(&self) -> Result<String, Error>;

    async fn is_extension_enabled(&self, name: &str) -> Result<bool, Error>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn mock_release_client_reports_missing_package() {
        let mut mock = MockReleaseClient::new();
        mock.expect_list_releases().times(1).returning(|name| {
            Err(Error::PackageNotFound {
                name: name.to_string(),
            })
        });

        let err = mock.list_releases("nope").await.unwrap_err();
        assert!(matches!(err, Error::PackageNotFound { name } if name == "nope"));
    }

    #[tokio::test]
    async fn mock_release_client_streams_archive_bytes() {
        use tokio::io::AsyncReadExt;

        let mut mock = MockReleaseClient::new();
        mock.expect_download_release()
            .returning(|_| Ok(Box::pin(std::io::Cursor::new(vec![0x1f, 0x8b, 0x08]))));

        let mut stream = mock
            .download_release(&ReleaseInfo::default())
            .await
            .unwrap();
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, vec![0x1f, 0x8b, 0x08]);
    }

    #[test]
    fn mock_manifest_loader_sees_requested_path() {
        let mut mock = MockManifestLoader::new();
        mock.expect_load()
            .withf(|path| path.ends_with("package.xml"))
            .times(1)
            .returning(|_| {
                Ok(Manifest {
                    name: "apcu".to_string(),
                    ..Default::default()
                })
            });

        let manifest = mock.load(&PathBuf::from("/src/apcu/package.xml")).unwrap();
        assert_eq!(manifest.name, "apcu");
    }

    #[test]
    fn mock_prompt_as_trait_object() {
        let mut mock = MockPrompt::new();
        mock.expect_prompt()
            .returning(|_, default| Ok(default.to_string()));

        let prompt: Box<dyn Prompt> = Box::new(mock);
        assert_eq!(prompt.prompt("enable x?", "no").unwrap(), "no");
    }

    #[tokio::test]
    async fn mock_runtime_probe_reports_extensions() {
        let mut mock = MockRuntimeProbe::new();
        mock.expect_version().returning(|| Ok("8.2.10".to_string()));
        mock.expect_is_extension_enabled()
            .returning(|name| Ok(name.to_string() == "json"));

        assert_eq!(mock.version().await.unwrap(), "8.2.10");
        assert!(mock.is_extension_enabled("json").await.unwrap());
        assert!(!mock.is_extension_enabled("igbinary").await.unwrap());
    }

    #[test]
    fn mocks_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MockReleaseClient>();
        assert_send_sync::<MockManifestLoader>();
        assert_send_sync::<MockPrompt>();
        assert_send_sync::<MockRuntimeProbe>();
    }
}
