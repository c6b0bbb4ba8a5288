//! Build command implementation.

use std::path::{Path, PathBuf};
use std::time::Instant;

use np_core::Error;
use np_io::{BuildRequest, Builder};

use crate::display::{done, format_elapsed, step};

const MANIFEST: &str = "package.xml";

/// Assemble a build request for an unpacked source tree.
pub fn request(
    source: PathBuf,
    xml: Option<PathBuf>,
    install_dir: Option<PathBuf>,
    cleanup: bool,
    parallel: usize,
    configure_args: Vec<String>,
) -> Result<BuildRequest, Error> {
    let manifest_path = match xml {
        Some(path) => path,
        None => find_manifest(&source)?,
    };

    Ok(BuildRequest {
        source_dir: source,
        install_dir,
        manifest_path,
        configure_args,
        parallel,
        cleanup,
    })
}

/// `package.xml` in `source`, else in its parent.
fn find_manifest(source: &Path) -> Result<PathBuf, Error> {
    let absolute = std::path::absolute(source).map_err(|e| Error::fs(source, e))?;

    std::iter::once(absolute.as_path())
        .chain(absolute.parent())
        .map(|dir| dir.join(MANIFEST))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| Error::ManifestFailure {
            path: absolute.join(MANIFEST),
            message: "not found in the source directory or its parent (use --xml)".to_string(),
        })
}

pub async fn run(builder: &Builder, mut request: BuildRequest) -> Result<(), Error> {
    let start = Instant::now();
    step(format!("Building {}", request.source_dir.display()));

    let report = builder.build(&mut request).await?;

    if report.compiled {
        done(format!("compiled and installed {}", report.package));
    } else {
        done(format!("installed existing build of {}", report.package));
    }
    step(format!("Finished in {}", format_elapsed(start.elapsed())));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn manifest_found_in_source_dir() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("package.xml"), "<package/>").unwrap();

        let found = find_manifest(tmp.path()).unwrap();
        assert_eq!(found, tmp.path().join("package.xml"));
    }

    #[test]
    fn manifest_found_in_parent_dir() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("redis-5.1.1");
        std::fs::create_dir(&source).unwrap();
        std::fs::write(tmp.path().join("package.xml"), "<package/>").unwrap();

        let found = find_manifest(&source).unwrap();
        assert_eq!(found, tmp.path().join("package.xml"));
    }

    #[test]
    fn missing_manifest_is_reported() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("src");
        std::fs::create_dir(&source).unwrap();

        let err = find_manifest(&source).unwrap_err();
        assert!(matches!(err, Error::ManifestFailure { ref path, .. } if path == &source.join("package.xml")));
    }

    #[test]
    fn explicit_xml_skips_lookup() {
        let req = request(
            PathBuf::from("/nonexistent/src"),
            Some(PathBuf::from("/elsewhere/package.xml")),
            None,
            true,
            4,
            vec!["--enable-foo".to_string()],
        )
        .unwrap();

        assert_eq!(req.manifest_path, PathBuf::from("/elsewhere/package.xml"));
        assert_eq!(req.parallel, 4);
        assert!(req.cleanup);
        assert_eq!(req.configure_args, vec!["--enable-foo"]);
    }
}
