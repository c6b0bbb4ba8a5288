//! Integration tests for the info and build commands and top-level flags.

use std::process::Output;

use assert_cmd::Command;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

use np_io::test_utils::TestContext;

#[allow(deprecated)]
fn notpecl() -> Command {
    let mut cmd = Command::cargo_bin("notpecl").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

async fn run(ctx: &TestContext, args: &[&str]) -> Output {
    let mut cmd = notpecl();
    cmd.env("NOTPECL_REGISTRY", ctx.registry_url());
    let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
    tokio::task::spawn_blocking(move || cmd.args(args).output().unwrap())
        .await
        .unwrap()
}

mod info {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn lists_releases_newest_first() {
        let ctx = TestContext::new().await;
        ctx.mount_package_info("demo", "Tools", "Demo extension").await;
        ctx.mount_releases(
            "demo",
            &[("1.0.0", "stable"), ("1.2.0RC1", "beta"), ("1.1.0", "stable")],
        )
        .await;

        let output = run(&ctx, &["info", "demo"]).await;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        output
            .assert()
            .success()
            .stdout(predicate::str::contains("Demo extension"))
            .stdout(predicate::str::contains("[Tools]"))
            .stdout(predicate::str::contains("beta"));

        let newest = stdout.find("1.2.0RC1").unwrap();
        let middle = stdout.find("1.1.0").unwrap();
        let oldest = stdout.find("1.0.0").unwrap();
        assert!(newest < middle && middle < oldest);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn missing_package_fails() {
        let ctx = TestContext::new().await;
        ctx.mount_missing("ghost").await;

        run(&ctx, &["info", "ghost"])
            .await
            .assert()
            .failure()
            .stderr(predicate::str::contains("not found"));
    }
}

mod build {
    use super::*;

    #[test]
    fn source_without_manifest_fails_before_running_anything() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("src");
        std::fs::create_dir(&source).unwrap();

        notpecl()
            .arg("build")
            .arg(&source)
            .assert()
            .failure()
            .stderr(predicate::str::contains("package.xml"));
    }

    #[test]
    fn invalid_manifest_is_reported() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("package.xml"),
            r#"<package version="2.0"><summary>no name</summary></package>"#,
        )
        .unwrap();

        notpecl()
            .arg("build")
            .arg(tmp.path())
            .assert()
            .failure()
            .stderr(predicate::str::contains("failed to load"));
    }
}

mod cli {
    use super::*;

    #[test]
    fn help_lists_commands() {
        notpecl()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("download"))
            .stdout(predicate::str::contains("install"))
            .stdout(predicate::str::contains("build"))
            .stdout(predicate::str::contains("info"));
    }

    #[test]
    fn version_flag() {
        notpecl()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("notpecl"));
    }

    #[test]
    fn install_requires_a_package() {
        notpecl().arg("install").assert().failure();
    }
}
