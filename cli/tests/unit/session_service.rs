//! Tests for the `run_session` application service.
//!
//! Every host interaction goes through [`RecordingBackend`], so these cover
//! stage ordering, argument synthesis and failure handling without spawning
//! anything.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use transient_cli::application::services::session::{
    SHUTDOWN_COMMAND_TIMEOUT, provision_images, run_session,
};
use transient_cli::domain::config::{RawOptions, RunConfig, Schema};
use transient_cli::domain::session::GUEST_SHUTDOWN_COMMAND;
use transient_cli::domain::{ConsolePolicy, SessionError};
use transient_common::SessionStage;

use crate::mocks::{RecordingBackend, RecordingReporter};

fn run_config(src: &str) -> RunConfig {
    let raw: RawOptions = src.parse().expect("toml");
    RunConfig::from_config(&Schema::run().validate(&raw).expect("valid"))
}

fn session_error(err: &anyhow::Error) -> &SessionError {
    err.downcast_ref::<SessionError>()
        .unwrap_or_else(|| panic!("not a session error: {err:#}"))
}

// ── Provisioning ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn prepare_only_provisions_in_order_and_never_launches() {
    let config = run_config(
        r#"
        image = ["centos/7:2004.01", "data"]
        name = "db"
        prepare_only = true
        "#,
    );
    let backend = RecordingBackend::default();
    let reporter = RecordingReporter::default();

    let code = run_session(&config, &backend, &reporter).await.expect("session");

    assert_eq!(code, 0);
    assert_eq!(
        backend.calls(),
        ["create:centos/7:2004.01:0", "create:data:1"]
    );
    assert!(!backend.called("start"));
    assert_eq!(
        *reporter.successes.lock().unwrap(),
        [SessionStage::Prepared.description()]
    );
}

#[tokio::test]
async fn provisioning_failure_aborts_before_launch() {
    let config = run_config(r#"image = ["base", "missing", "never"]"#);
    let backend = RecordingBackend {
        fail_image: Some("missing".to_string()),
        ..RecordingBackend::default()
    };

    let err = run_session(&config, &backend, &RecordingReporter::default())
        .await
        .expect_err("should fail");

    assert_eq!(
        *session_error(&err),
        SessionError::Provisioning {
            image: "missing".to_string(),
            index: 1
        }
    );
    assert_eq!(backend.calls(), ["create:base:0", "create:missing:1"]);
}

#[tokio::test]
async fn provisioned_images_carry_their_index() {
    let backend = RecordingBackend::default();
    let names = vec!["a".to_string(), "b".to_string(), "a".to_string()];
    let images = provision_images(&backend, &names, "s").await.expect("images");
    let indices: Vec<usize> = images.iter().map(|i| i.index).collect();
    assert_eq!(indices, [0, 1, 2]);
    assert_ne!(images[0].path, images[2].path);
}

// ── Plain launch ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn plain_launch_inherits_console_and_returns_vm_code() {
    let config = run_config(
        r#"
        image = ["base"]
        qemu_args = ["-m", "1G"]
        "#,
    );
    let backend = RecordingBackend {
        vm_code: 7,
        ..RecordingBackend::default()
    };

    let code = run_session(&config, &backend, &RecordingReporter::default())
        .await
        .expect("session");

    assert_eq!(code, 7);
    assert_eq!(backend.started_policy(), ConsolePolicy::Inherit);
    let args = backend.started_args();
    assert_eq!(args[0], "-drive");
    assert!(args[1].starts_with("file=/front/"), "got: {args:?}");
    assert!(!args.contains(&"-nographic".to_string()), "got: {args:?}");
    assert_eq!(args[args.len() - 2..], ["-m", "1G"]);
    assert!(!backend.called("allocate"));
    assert!(backend.called("vm.wait:none"));
}

#[tokio::test]
async fn launch_failure_is_reported_as_launch_error() {
    let config = run_config(r#"image = ["base"]"#);
    let backend = RecordingBackend {
        fail_start: true,
        ..RecordingBackend::default()
    };

    let err = run_session(&config, &backend, &RecordingReporter::default())
        .await
        .expect_err("should fail");

    assert_eq!(*session_error(&err), SessionError::Launch);
    assert!(!backend.called("terminate"));
}

// ── SSH console ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn ssh_console_without_port_allocates_and_forwards_one() {
    let config = run_config(
        r#"
        image = ["base"]
        ssh_console = true
        "#,
    );
    let backend = RecordingBackend::default();

    run_session(&config, &backend, &RecordingReporter::default())
        .await
        .expect("session");

    assert!(backend.called("allocate"));
    assert_eq!(backend.started_policy(), ConsolePolicy::Quiet);
    let args = backend.started_args();
    assert!(args.contains(&"-nographic".to_string()), "got: {args:?}");
    assert!(
        args.iter()
            .any(|a| a.contains("hostfwd=tcp::40123-:22")),
        "got: {args:?}"
    );
    assert!(backend.called("connect:40123:<shell>"));
}

#[tokio::test]
async fn configured_port_is_used_as_is() {
    let config = run_config(
        r#"
        image = ["base"]
        ssh_console = true
        ssh_port = 2222
        "#,
    );
    let backend = RecordingBackend::default();

    run_session(&config, &backend, &RecordingReporter::default())
        .await
        .expect("session");

    assert!(!backend.called("allocate"));
    assert!(
        backend
            .started_args()
            .iter()
            .any(|a| a.contains("hostfwd=tcp::2222-:22"))
    );
}

#[tokio::test]
async fn ssh_with_serial_keeps_console_until_connected() {
    let config = run_config(
        r#"
        image = ["base"]
        ssh_with_serial = true
        "#,
    );
    let backend = RecordingBackend::default();

    run_session(&config, &backend, &RecordingReporter::default())
        .await
        .expect("session");

    assert_eq!(backend.started_policy(), ConsolePolicy::Silenceable);
    let connect = backend.position("connect:").expect("connect");
    let silence = backend.position("silence").expect("silence");
    let shell = backend.position("ssh.wait").expect("shell");
    assert!(connect < silence && silence < shell, "got: {:?}", backend.calls());
}

#[tokio::test]
async fn bridged_session_returns_ssh_exit_code() {
    let config = run_config(
        r#"
        image = ["base"]
        ssh_command = "make test"
        "#,
    );
    let backend = RecordingBackend {
        ssh_code: 3,
        vm_code: 0,
        ..RecordingBackend::default()
    };

    let code = run_session(&config, &backend, &RecordingReporter::default())
        .await
        .expect("session");

    assert_eq!(code, 3);
    assert!(backend.called("connect:40123:make test"));
}

#[tokio::test]
async fn guest_is_shut_down_after_the_shell_exits() {
    let config = run_config(
        r#"
        image = ["base"]
        ssh_console = true
        shutdown_timeout = 5
        "#,
    );
    let backend = RecordingBackend::default();
    let reporter = RecordingReporter::default();

    run_session(&config, &backend, &reporter).await.expect("session");

    let calls = backend.calls();
    let shell = backend.position("ssh.wait").expect("shell");
    let shutdown = backend
        .position(&format!("communicate:{GUEST_SHUTDOWN_COMMAND}"))
        .expect("shutdown");
    let grace = backend.position("vm.wait:5").expect("grace wait");
    assert!(shell < shutdown && shutdown < grace, "got: {calls:?}");
    assert!(!backend.called("terminate"));
    assert!(
        reporter
            .steps
            .lock()
            .unwrap()
            .contains(&SessionStage::Teardown.description().to_string())
    );
}

#[tokio::test]
async fn failed_shutdown_request_does_not_change_result() {
    let config = run_config(
        r#"
        image = ["base"]
        ssh_console = true
        "#,
    );
    let backend = RecordingBackend {
        fail_shutdown: true,
        ssh_code: 0,
        ..RecordingBackend::default()
    };

    let code = run_session(&config, &backend, &RecordingReporter::default())
        .await
        .expect("session");

    assert_eq!(code, 0);
    assert!(backend.called("connect_piped"));
    assert!(backend.called("vm.wait:20"));
}

#[tokio::test]
async fn connect_failure_terminates_vm() {
    let config = run_config(
        r#"
        image = ["base"]
        ssh_console = true
        "#,
    );
    let backend = RecordingBackend {
        fail_connect: true,
        ..RecordingBackend::default()
    };

    let err = run_session(&config, &backend, &RecordingReporter::default())
        .await
        .expect_err("should fail");

    assert_eq!(*session_error(&err), SessionError::Connect);
    assert!(backend.called("terminate"));
    assert!(!backend.called("ssh.wait"));
}

#[test]
fn shutdown_command_timeout_is_fifteen_seconds() {
    assert_eq!(SHUTDOWN_COMMAND_TIMEOUT.as_secs(), 15);
}

// ── Shared folders ────────────────────────────────────────────────────────────

#[tokio::test]
async fn shared_folders_mount_before_the_shell() {
    let config = run_config(
        r#"
        image = ["base"]
        ssh_console = true
        shared_folder = ["/srv/src:/mnt/src", "/srv/data:/mnt/data"]
        "#,
    );
    let backend = RecordingBackend::default();

    run_session(&config, &backend, &RecordingReporter::default())
        .await
        .expect("session");

    let first = backend
        .position("mount:/srv/src:/mnt/src:alice")
        .expect("first mount");
    let second = backend
        .position("mount:/srv/data:/mnt/data:alice")
        .expect("second mount");
    let connect = backend.position("connect:").expect("connect");
    assert!(first < second && second < connect, "got: {:?}", backend.calls());
}

#[tokio::test]
async fn shared_folder_without_console_waits_for_vm() {
    let config = run_config(
        r#"
        image = ["base"]
        shared_folder = ["/srv/src:/mnt/src"]
        "#,
    );
    let backend = RecordingBackend {
        vm_code: 4,
        ..RecordingBackend::default()
    };

    let code = run_session(&config, &backend, &RecordingReporter::default())
        .await
        .expect("session");

    assert_eq!(code, 4);
    assert_eq!(backend.started_policy(), ConsolePolicy::Inherit);
    assert!(backend.started_args().contains(&"-nographic".to_string()));
    assert!(backend.called("mount:/srv/src:/mnt/src:alice"));
    assert!(!backend.called("connect:"));
    assert!(backend.called("vm.wait:none"));
}

#[tokio::test]
async fn mount_failure_terminates_vm_and_reports_pair() {
    let config = run_config(
        r#"
        image = ["base"]
        ssh_console = true
        shared_folder = ["/srv/src:/mnt/src"]
        "#,
    );
    let backend = RecordingBackend {
        fail_mount: true,
        ..RecordingBackend::default()
    };

    let err = run_session(&config, &backend, &RecordingReporter::default())
        .await
        .expect_err("should fail");

    assert_eq!(
        *session_error(&err),
        SessionError::Mount {
            local: "/srv/src".to_string(),
            remote: "/mnt/src".to_string()
        }
    );
    assert!(backend.called("terminate"));
    assert!(!backend.called("connect:"));
}
