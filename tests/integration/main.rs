//! Integration tests for buildcache

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::Path;
    use tempfile::TempDir;

    /// Command isolated from any user config, run inside `project`
    fn buildcache(project: &Path) -> Command {
        let mut cmd = cargo_bin_cmd!("buildcache");
        cmd.current_dir(project)
            .env("BUILDCACHE_CONFIG", project.join("no-such-config.toml"))
            .arg("--no-local");
        cmd
    }

    fn write_native_config(project: &Path) {
        std::fs::write(
            project.join("no-such-config.toml"),
            "[cache]\ncopy_strategies = [\"native\"]\n",
        )
        .unwrap();
    }

    #[test]
    fn help_displays() {
        let temp = TempDir::new().unwrap();
        buildcache(temp.path())
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Local build artifact cache"));
    }

    #[test]
    fn version_displays() {
        let temp = TempDir::new().unwrap();
        buildcache(temp.path())
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("buildcache"));
    }

    #[test]
    fn resolve_miss_exits_nonzero_without_writes() {
        let temp = TempDir::new().unwrap();
        buildcache(temp.path())
            .args([
                "resolve",
                "--fingerprint",
                "nonexistent",
                "--platform",
                "android",
            ])
            .assert()
            .failure()
            .stdout(predicate::str::is_empty())
            .stderr(predicate::str::contains("Cache miss"));

        assert!(!temp.path().join(".expo").exists());
    }

    #[test]
    fn upload_apk_then_resolve() {
        let temp = TempDir::new().unwrap();
        let apk = temp.path().join("app.apk");
        std::fs::write(&apk, b"apk-bytes").unwrap();
        let expected = temp.path().join(".expo/cache/android_abc123.apk");

        buildcache(temp.path())
            .args(["upload", "--fingerprint", "abc123", "--platform", "android"])
            .arg(&apk)
            .assert()
            .success()
            .stdout(predicate::str::contains("android_abc123.apk"));

        assert_eq!(std::fs::read(&expected).unwrap(), b"apk-bytes");

        buildcache(temp.path())
            .args([
                "resolve",
                "--fingerprint",
                "abc123",
                "--platform",
                "android",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("android_abc123.apk"));
    }

    #[test]
    fn upload_app_bundle_then_list() {
        let temp = TempDir::new().unwrap();
        write_native_config(temp.path());
        let bundle = temp.path().join("build/MyApp.app");
        std::fs::create_dir_all(&bundle).unwrap();
        std::fs::write(bundle.join("Info.plist"), b"<plist/>").unwrap();

        buildcache(temp.path())
            .args(["upload", "--fingerprint", "xyz", "--platform", "ios"])
            .arg(&bundle)
            .assert()
            .success()
            .stdout(predicate::str::contains("ios_xyz.app"));

        assert!(temp
            .path()
            .join(".expo/cache/ios_xyz.app/Info.plist")
            .is_file());

        buildcache(temp.path())
            .args(["list", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains("ios_xyz.app"));
    }

    #[test]
    fn upload_missing_source_fails() {
        let temp = TempDir::new().unwrap();
        buildcache(temp.path())
            .args(["upload", "--fingerprint", "abc", "--platform", "android"])
            .arg(temp.path().join("missing.apk"))
            .assert()
            .failure()
            .stderr(predicate::str::contains("Build artifact not found"));

        assert!(!temp.path().join(".expo").exists());
    }

    #[test]
    fn unknown_platform_rejected() {
        let temp = TempDir::new().unwrap();
        buildcache(temp.path())
            .args(["resolve", "--fingerprint", "abc", "--platform", "web"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unsupported platform: web"));
    }

    #[test]
    fn project_flag_sets_cache_location() {
        let temp = TempDir::new().unwrap();
        let project = temp.path().join("app");
        std::fs::create_dir_all(&project).unwrap();
        let apk = temp.path().join("app.apk");
        std::fs::write(&apk, b"apk").unwrap();

        buildcache(temp.path())
            .arg("--project")
            .arg(&project)
            .args(["upload", "--fingerprint", "p1", "--platform", "android"])
            .arg(&apk)
            .assert()
            .success();

        assert!(project.join(".expo/cache/android_p1.apk").is_file());
    }

    #[test]
    fn list_empty() {
        let temp = TempDir::new().unwrap();
        buildcache(temp.path())
            .arg("list")
            .assert()
            .success()
            .stdout(predicate::str::contains("No cached builds"));
    }

    #[test]
    fn config_path() {
        let temp = TempDir::new().unwrap();
        buildcache(temp.path())
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("no-such-config.toml"));
    }

    #[test]
    fn config_show() {
        let temp = TempDir::new().unwrap();
        buildcache(temp.path())
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[cache]"));
    }
}
