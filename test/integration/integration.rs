//! Live end-to-end test against an ephemeral service deployment.
//!
//! For each declared template under `integration/`:
//!
//! 1. Push the template to a throwaway service container
//! 2. Create a workspace from it; the template writes a JSON artifact
//! 3. Fetch the artifact and compare it against the expected patterns
//!
//! Requires a Docker daemon and the provider binary built at the repository
//! root, so it is ignored by default.
//!
//! ## Running
//!
//! ```bash
//! cargo test -p provider-e2e-integration --test integration -- --ignored
//! ```
//!
//! `CODER_IMAGE`, `CODER_VERSION` and `TIMEOUT_MINS` select the image and
//! the run deadline. The test is skipped while `TF_ACC=1`.

use std::path::PathBuf;

use provider_e2e::expect::{host_arch, host_os};
use provider_e2e::{run_against_docker, Expectations, HarnessConfig, TestCase};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,provider_e2e=debug,testcontainers=warn".into()),
        )
        .with_test_writer()
        .try_init();
}

fn repo_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../..")
}

fn test_cases() -> Vec<TestCase> {
    let data_source = Expectations::from_pairs([
        ("provisioner.arch", host_arch()),
        ("provisioner.id", r"[a-zA-Z0-9-]+"),
        ("provisioner.os", host_os()),
        ("workspace.access_port", r"\d+"),
        ("workspace.access_url", r"https?://\D+:\d+"),
        ("workspace.id", r"[a-zA-z0-9-]+"),
        ("workspace.name", r"test-data-source"),
        ("workspace.owner", r"testing"),
        ("workspace.owner_email", r"testing@coder\.com"),
        ("workspace.owner_groups", r"\[\]"),
        ("workspace.owner_id", r"[a-zA-Z0-9]+"),
        ("workspace.owner_name", r"default"),
        // No OIDC integration in the test deployment.
        ("workspace.owner_oidc_access_token", r"^$"),
        ("workspace.owner_session_token", r"[a-zA-Z0-9-]+"),
        ("workspace.start_count", r"1"),
        ("workspace.template_id", r"[a-zA-Z0-9-]+"),
        ("workspace.template_name", r"test-data-source"),
        ("workspace.template_version", r".+"),
        ("workspace.transition", r"start"),
        ("workspace_owner.email", r"testing@coder\.com"),
        ("workspace_owner.full_name", r"default"),
        ("workspace_owner.groups", r"\[\]"),
        ("workspace_owner.id", r"[a-zA-Z0-9-]+"),
        ("workspace_owner.name", r"testing"),
        ("workspace_owner.oidc_access_token", r"^$"),
        ("workspace_owner.session_token", r".+"),
        // Keys are not generated for the first user yet.
        ("workspace_owner.ssh_private_key", r"^$"),
        ("workspace_owner.ssh_public_key", r"^$"),
    ])
    .expect("expected output patterns must compile");

    vec![TestCase::new("test-data-source", data_source)]
}

#[test]
fn test_cases_are_well_formed() {
    let cases = test_cases();
    provider_e2e::scenario::ensure_unique_templates(&cases).unwrap();
    assert_eq!(cases[0].expected.len(), 28);
}

#[tokio::test]
#[ignore = "requires a Docker daemon and a built provider binary"]
async fn integration() {
    init_tracing();

    let mut config = HarnessConfig::from_env().expect("invalid harness configuration");
    if config.skip_live {
        eprintln!("Skipping integration tests during acceptance tests");
        return;
    }
    if std::env::var_os("E2E_SRC_DIR").is_none() {
        config.src_dir = repo_root();
    }

    let report = run_against_docker(&config, &test_cases())
        .await
        .expect("environment setup failed");

    println!("{report}");
    assert!(report.passed(), "{} scenarios failed", report.failed_count());
}
