use std::fs::{self, File};
use std::io::{self, Cursor, Read, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use flate2::read::GzDecoder;
use fs4::fs_std::FileExt;
use tokio::io::AsyncReadExt;
use tokio_util::io::SyncIoBridge;
use tracing::debug;

use np_core::Error;

use crate::traits::{ArchiveStream, ReleaseClient, TransportError};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const SNIFF_LEN: u64 = 512;

/// Downloads release archives and unpacks them into
/// `<destination>/<name>-<version>`.
#[derive(Clone)]
pub struct ArchiveFetcher {
    client: Arc<dyn ReleaseClient>,
}

impl ArchiveFetcher {
    pub fn new(client: Arc<dyn ReleaseClient>) -> Self {
        Self { client }
    }

    /// Directory a release is unpacked into.
    pub fn target_dir(destination: &Path, name: &str, version: &str) -> PathBuf {
        destination.join(release_key(name, version))
    }

    /// Fetch and unpack `name` at `version`, returning the extracted
    /// directory. An existing directory is returned as is, without touching
    /// the network.
    pub async fn download(
        &self,
        name: &str,
        version: &str,
        destination: &Path,
    ) -> Result<PathBuf, Error> {
        self.fetch(name, version, destination)
            .await
            .map_err(|e| e.context("download", format!("{} {}", name, version)))
    }

    async fn fetch(&self, name: &str, version: &str, destination: &Path) -> Result<PathBuf, Error> {
        let target = Self::target_dir(destination, name, version);
        if target.exists() {
            debug!(path = %target.display(), "already downloaded");
            return Ok(target);
        }

        let release = self.client.describe_release(name, version).await?;
        let mut stream = self.client.download_release(&release).await?;

        let prefix = sniff(&mut stream).await?;
        check_signature(&prefix)?;

        // Sync reader over the whole stream, sniffed bytes included. Must be
        // created on the runtime.
        let reader = SyncIoBridge::new(AsyncReadExt::chain(Cursor::new(prefix), stream));
        let destination = destination.to_path_buf();
        let key = release_key(name, version);

        tokio::task::spawn_blocking(move || unpack_release(reader, &destination, &key))
            .await
            .map_err(|e| Error::FileSystem {
                path: target.clone(),
                message: format!("extraction task failed: {e}"),
            })?
    }
}

fn release_key(name: &str, version: &str) -> String {
    format!("{}-{}", name, version)
}

async fn sniff(stream: &mut ArchiveStream) -> Result<Vec<u8>, Error> {
    let mut prefix = Vec::with_capacity(SNIFF_LEN as usize);
    AsyncReadExt::take(stream, SNIFF_LEN)
        .read_to_end(&mut prefix)
        .await
        .map_err(|e| Error::NetworkFailure {
            message: format!("failed to read archive: {e}"),
        })?;
    Ok(prefix)
}

/// Reject anything that does not start like a gzip stream, naming what it
/// looks like instead.
fn check_signature(prefix: &[u8]) -> Result<(), Error> {
    if prefix.starts_with(&GZIP_MAGIC) {
        return Ok(());
    }

    let detected = if prefix.is_empty() {
        "empty"
    } else {
        let text = String::from_utf8_lossy(prefix).to_ascii_lowercase();
        let text = text.trim_start();
        if text.starts_with("<!doctype html") || text.contains("<html") {
            "HTML"
        } else if text.starts_with('<') {
            "XML"
        } else {
            "unknown"
        }
    };

    Err(Error::UnsupportedContent {
        detected: detected.to_string(),
    })
}

/// Unpack into `<destination>/<key>` under an exclusive per-release lock.
/// The tree is built in a temporary sibling and renamed into place, so a
/// failed extraction never leaves a directory behind.
fn unpack_release<R: Read>(reader: R, destination: &Path, key: &str) -> Result<PathBuf, Error> {
    let target = destination.join(key);
    let locks_dir = destination.join(".locks");
    fs::create_dir_all(&locks_dir).map_err(|e| Error::fs(&locks_dir, e))?;

    let lock_path = locks_dir.join(format!("{key}.lock"));
    let lock_file = File::create(&lock_path).map_err(|e| Error::fs(&lock_path, e))?;
    lock_file
        .lock_exclusive()
        .map_err(|e| Error::fs(&lock_path, format!("failed to acquire lock: {e}")))?;

    // Another task may have finished while we waited
    if target.exists() {
        return Ok(target);
    }

    let tmp_dir = destination.join(format!(".{key}.tmp.{}", std::process::id()));
    if tmp_dir.exists() {
        let _ = fs::remove_dir_all(&tmp_dir);
    }
    fs::create_dir_all(&tmp_dir).map_err(|e| Error::fs(&tmp_dir, e))?;

    if let Err(e) = unpack(reader, &tmp_dir, key) {
        let _ = fs::remove_dir_all(&tmp_dir);
        return Err(e);
    }

    if let Err(e) = fs::rename(&tmp_dir, &target) {
        let _ = fs::remove_dir_all(&tmp_dir);
        return Err(Error::fs(&target, e));
    }

    Ok(target)
}

fn corrupt(err: io::Error) -> Error {
    if let Some(failure) = transport_failure(&err) {
        return failure;
    }
    Error::ProtocolFailure {
        message: format!("corrupt archive: {err}"),
    }
}

/// `NetworkFailure` when `err` carries a [`TransportError`] anywhere in its
/// chain. The decompressor passes read errors through and tar may wrap them.
fn transport_failure(err: &io::Error) -> Option<Error> {
    let mut current: Option<&(dyn std::error::Error + 'static)> =
        err.get_ref().map(|e| e as &(dyn std::error::Error + 'static));

    while let Some(e) = current {
        if let Some(transport) = e.downcast_ref::<TransportError>() {
            return Some(Error::NetworkFailure {
                message: format!("archive download interrupted: {transport}"),
            });
        }
        // io::Error::source skips its own payload
        current = match e.downcast_ref::<io::Error>() {
            Some(inner) => inner
                .get_ref()
                .map(|e| e as &(dyn std::error::Error + 'static)),
            None => e.source(),
        };
    }
    None
}

/// Write every regular file of a gzipped tarball below `root`, stripping the
/// leading `<strip>/` directory. Returns the number of files written.
fn unpack<R: Read>(reader: R, root: &Path, strip: &str) -> Result<usize, Error> {
    let mut archive = tar::Archive::new(GzDecoder::new(reader));
    let mut count = 0;

    for entry in archive.entries().map_err(corrupt)? {
        let mut entry = entry.map_err(corrupt)?;
        if !entry.header().entry_type().is_file() {
            continue;
        }

        let raw = entry.path().map_err(corrupt)?.into_owned();
        let Some(relative) = entry_destination(&raw, strip)? else {
            continue;
        };

        let out_path = root.join(&relative);
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::fs(parent, e))?;
        }

        let expected = entry.header().size().map_err(corrupt)?;
        let mut file = File::create(&out_path).map_err(|e| Error::fs(&out_path, e))?;
        copy_entry(&mut entry, &mut file, expected, &relative, &out_path)?;

        debug!(path = %relative.display(), bytes = expected, "unpacked");
        count += 1;
    }

    Ok(count)
}

/// Path of an archive member relative to the extraction root, or `None` when
/// nothing is left after stripping.
fn entry_destination(raw: &Path, strip: &str) -> Result<Option<PathBuf>, Error> {
    let stripped = raw.strip_prefix(strip).unwrap_or(raw);

    let mut relative = PathBuf::new();
    for component in stripped.components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(Error::UnsafeEntryPath {
                    path: raw.display().to_string(),
                });
            }
        }
    }

    Ok((!relative.as_os_str().is_empty()).then_some(relative))
}

/// Copy exactly `expected` bytes. Running out of input early is a truncated
/// entry; a lost connection or undecodable data is reported as such.
fn copy_entry<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    expected: u64,
    relative: &Path,
    out_path: &Path,
) -> Result<(), Error> {
    let mut buf = vec![0u8; 64 * 1024];
    let mut written = 0u64;

    while written < expected {
        let want = (expected - written).min(buf.len() as u64) as usize;
        let n = match reader.read(&mut buf[..want]) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e)
                if e.kind() == io::ErrorKind::UnexpectedEof
                    && transport_failure(&e).is_none() =>
            {
                debug!(path = %relative.display(), error = %e, "archive ended early");
                break;
            }
            Err(e) => return Err(corrupt(e)),
        };
        writer
            .write_all(&buf[..n])
            .map_err(|e| Error::fs(out_path, e))?;
        written += n as u64;
    }

    if written != expected {
        return Err(Error::TruncatedEntry {
            path: relative.display().to_string(),
            expected,
            actual: written,
        });
    }

    Ok(())
}
