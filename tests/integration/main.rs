//! Integration tests for envmirror

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn envmirror() -> Command {
        let mut cmd = cargo_bin_cmd!("envmirror");
        cmd.env_remove("ENVMIRROR_CONFIG");
        cmd
    }

    /// Config file using the memory backend with a few seeded keys
    fn memory_config(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[store]
backend = "memory"

[store.seed]
"env/color" = "12"
"env.display/width" = "640"
"junk/x" = "1"
"environment/color" = "3"

[mirror]
pattern = "*"

[sketch]
fps = 200
"#,
        )
        .unwrap();
        path
    }

    #[test]
    fn help_displays() {
        envmirror()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("into a live local cache"))
            .stdout(predicate::str::contains("dump"));
    }

    #[test]
    fn version_displays() {
        envmirror()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("envmirror"));
    }

    #[test]
    fn check_accepts_env_keys() {
        envmirror()
            .args(["check", "env/color", "env.display/width"])
            .assert()
            .success()
            .stdout(predicate::str::contains("env.display/width"));
    }

    #[test]
    fn check_rejects_other_keys() {
        envmirror()
            .args(["check", "env/color", "environment/color", "ENV/color"])
            .assert()
            .failure()
            .stdout(predicate::str::contains("not an env key"))
            .stderr(predicate::str::contains("2 of 3 keys would be rejected"));
    }

    #[test]
    fn config_show() {
        let dir = TempDir::new().unwrap();
        envmirror()
            .arg("--config")
            .arg(dir.path().join("missing.toml"))
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[store]"))
            .stdout(predicate::str::contains("env*"));
    }

    #[test]
    fn config_set_writes_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        envmirror()
            .arg("--config")
            .arg(&path)
            .args(["config", "set", "store.port", "6380"])
            .assert()
            .success();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("port = 6380"));
    }

    #[test]
    fn dump_lists_only_env_keys() {
        let dir = TempDir::new().unwrap();
        let config = memory_config(&dir);

        envmirror()
            .arg("--config")
            .arg(&config)
            .args(["dump", "--json"])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""env/color": "12""#))
            .stdout(predicate::str::contains(r#""env.display/width": "640""#))
            .stdout(predicate::str::contains("junk/x").not())
            .stdout(predicate::str::contains("environment/color").not());
    }

    #[test]
    fn run_renders_requested_frames() {
        let dir = TempDir::new().unwrap();
        let config = memory_config(&dir);

        envmirror()
            .arg("--config")
            .arg(&config)
            .args(["run", "--frames", "3"])
            .assert()
            .success()
            .stdout(predicate::str::contains("color   12.00*"))
            .stdout(predicate::str::contains("Rendered 3 frames"));
    }

    #[test]
    fn unreachable_store_fails_with_hint() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        // Port 1 on localhost is reserved and refuses connections
        std::fs::write(
            &path,
            "[store]\nhost = \"127.0.0.1\"\nport = 1\nconnect_timeout_ms = 500\n",
        )
        .unwrap();

        envmirror()
            .arg("--config")
            .arg(&path)
            .arg("dump")
            .assert()
            .failure()
            .stderr(predicate::str::contains("unavailable"))
            .stderr(predicate::str::contains("Hint:"));
    }
}
