use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

fn regionfeedctl(dir: &TempDir) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("regionfeedctl");
    cmd.env_clear()
        .current_dir(dir.path())
        .arg("--env-file")
        .arg(dir.path().join("missing.env"));
    cmd
}

#[test]
fn help_lists_subcommands() {
    let mut cmd = cargo_bin_cmd!("regionfeedctl");
    let output = cmd
        .arg("--help")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8_lossy(&output);
    for subcommand in
        ["run", "serve", "cache-stats", "test-notify", "check-config"]
    {
        assert!(text.contains(subcommand), "help missing {subcommand}");
    }
}

#[test]
fn test_notify_help_mentions_channel() {
    let mut cmd = cargo_bin_cmd!("regionfeedctl");
    cmd.arg("test-notify")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--channel"));
}

#[test]
fn serve_help_mentions_listen_address() {
    let mut cmd = cargo_bin_cmd!("regionfeedctl");
    cmd.arg("serve")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--listen"))
        .stdout(predicate::str::contains("127.0.0.1:8080"));
}

#[test]
fn run_without_providers_prints_empty_report() {
    let dir = TempDir::new().unwrap();
    regionfeedctl(&dir)
        .arg("run")
        .assert()
        .success()
        .stdout("{}\n")
        .stderr(predicate::str::contains("No providers configured"));
}

#[test]
fn check_config_masks_webhook() {
    let dir = TempDir::new().unwrap();
    regionfeedctl(&dir)
        .arg("check-config")
        .env(
            "SLACK_WEBHOOK_URL",
            "https://hooks.slack.com/services/T000/B000/supersecretvalue",
        )
        .assert()
        .success()
        .stdout(predicate::str::contains("https://ho***etvalue"))
        .stdout(predicate::str::contains("supersecret").not());
}

#[test]
fn invalid_config_fails_with_context() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("regionfeed.toml"),
        "[orchestrator]\nmax_concurrency = 0\n",
    )
    .unwrap();

    regionfeedctl(&dir)
        .arg("check-config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load configuration"));
}

#[test]
fn unopenable_database_degrades_to_in_memory_cache() {
    let dir = TempDir::new().unwrap();
    let database_url = format!(
        "sqlite://{}",
        dir.path().join("no-such-dir").join("regions.db").display()
    );

    regionfeedctl(&dir)
        .arg("run")
        .env("DATABASE_URL", &database_url)
        .assert()
        .success()
        .stdout("{}\n")
        .stderr(predicate::str::contains("falling back to in-memory cache"));
}

#[test]
fn cache_stats_fails_when_database_is_unopenable() {
    let dir = TempDir::new().unwrap();
    let database_url = format!(
        "sqlite://{}",
        dir.path().join("no-such-dir").join("regions.db").display()
    );

    regionfeedctl(&dir)
        .arg("cache-stats")
        .env("DATABASE_URL", &database_url)
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "failed to open region cache database",
        ));
}

#[test]
fn test_notify_requires_webhook() {
    let dir = TempDir::new().unwrap();
    regionfeedctl(&dir)
        .arg("test-notify")
        .assert()
        .failure()
        .stderr(predicate::str::contains("SLACK_WEBHOOK_URL"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn run_caches_regions_in_sqlite() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/hetzner.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            serde_json::json!({
                "storage": {"fsn1": "Falkenstein"},
                "compute": {"nbg1": "Nuremberg"}
            }),
        ))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("regionfeed.toml"),
        format!(
            "[[providers]]\nname = \"Hetzner\"\nurl = \"{}/hetzner.json\"\n",
            server.uri()
        ),
    )
    .unwrap();
    let database_url =
        format!("sqlite://{}", dir.path().join("regions.db").display());

    let output = regionfeedctl(&dir)
        .arg("run")
        .env("DATABASE_URL", &database_url)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let report: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(report["Hetzner"]["storage"]["fsn1"], "Falkenstein");
    assert_eq!(report["Hetzner"]["compute"]["nbg1"], "Nuremberg");

    regionfeedctl(&dir)
        .arg("cache-stats")
        .env("DATABASE_URL", &database_url)
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Hetzner")
                .and(predicate::str::contains("Valid")),
        );
}
