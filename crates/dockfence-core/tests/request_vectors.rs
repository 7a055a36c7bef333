//! Creation request decoding and structural validation.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::fs;

use dockfence_core::error::ClientCode;
use dockfence_core::model::{
    CommandLine, CreationRequest, MountMode, PortSpec, RestartPolicyName, VolumeConfig,
};

fn load(name: &str) -> String {
    fs::read_to_string(format!("tests/vectors/{name}")).unwrap()
}

fn parse(name: &str) -> CreationRequest {
    serde_json::from_str(&load(name)).unwrap()
}

#[test]
fn min_request_defaults_to_safe_values() {
    let req = parse("request_min.json");
    assert_eq!(req.image, "nginx:alpine");
    assert!(!req.privileged);
    assert!(req.network_mode.is_none());
    assert!(req.pid_mode.is_none());
    assert!(req.ipc_mode.is_none());
    assert!(req.cap_add.is_empty());
    assert!(req.devices.is_empty());
    assert!(req.volumes.is_empty());
    req.validate().unwrap();
}

#[test]
fn full_request_decodes_every_shape() {
    let req = parse("request_full.json");
    req.validate().unwrap();

    assert_eq!(req.name.as_deref(), Some("api-1"));
    assert_eq!(
        req.command.as_ref().unwrap().to_args().unwrap(),
        vec!["sh", "-c", "echo \"hi there\""]
    );
    assert!(matches!(req.entrypoint, Some(CommandLine::Exec(ref a)) if a.len() == 2));

    assert!(matches!(req.ports["80"], PortSpec::HostPort(8080)));
    let tls = req.ports["443/TCP"].bindings();
    assert_eq!(tls[0].host_ip, "127.0.0.1");
    assert_eq!(tls[0].host_port, 8443);
    let dns = req.ports["53/udp"].bindings();
    assert_eq!(dns.len(), 2);
    assert_eq!(dns[0].host_ip, "0.0.0.0");

    assert_eq!(req.volumes["/srv/api/data"].mode, MountMode::Ro);
    let rp = req.restart_policy.as_ref().unwrap();
    assert_eq!(rp.name, RestartPolicyName::OnFailure);
    assert_eq!(rp.maximum_retry_count, 3);
    assert_eq!(req.memory_bytes().unwrap(), Some(512 * 1024 * 1024));
}

#[test]
fn nulls_mean_absent() {
    let req = parse("request_nulls.json");
    assert!(req.name.is_none());
    assert!(!req.privileged);
    assert!(req.environment.is_empty());
    assert!(req.cap_add.is_empty());
    assert!(req.sysctls.is_empty());
}

#[test]
fn unknown_fields_are_rejected() {
    let res = serde_json::from_str::<CreationRequest>(&load("request_unknown_field.json"));
    assert!(res.is_err());
}

fn assert_bad_request(label: &str, mutate: impl FnOnce(&mut CreationRequest)) {
    let mut req = CreationRequest::for_image("nginx");
    mutate(&mut req);
    let err = req.validate().expect_err(label);
    assert_eq!(err.client_code(), ClientCode::BadRequest, "{label}");
}

fn volume(bind: &str) -> VolumeConfig {
    VolumeConfig {
        bind: bind.into(),
        mode: MountMode::Rw,
    }
}

#[test]
fn structural_errors_are_bad_request() {
    assert_bad_request("empty image", |r| r.image = " ".into());
    assert_bad_request("bad name", |r| r.name = Some("-leading".into()));
    assert_bad_request("bad port", |r| {
        r.ports.insert("http".into(), PortSpec::HostPort(80));
    });
    assert_bad_request("bad protocol", |r| {
        r.ports.insert("80/icmp".into(), PortSpec::HostPort(80));
    });
    assert_bad_request("zero host port", |r| {
        r.ports.insert("80".into(), PortSpec::HostPort(0));
    });
    assert_bad_request("bad mem", |r| r.mem_limit = Some("lots".into()));
    assert_bad_request("relative bind", |r| {
        r.volumes.insert("/srv".into(), volume("data"));
    });
    assert_bad_request("nul in host path", |r| {
        r.volumes.insert("/srv\0/x".into(), volume("/data"));
    });
}

#[test]
fn colons_in_volume_paths_are_bad_request() {
    assert_bad_request("colon in host path", |r| {
        r.volumes.insert("/srv:/etc".into(), volume("/data"));
    });
    assert_bad_request("colon in bind", |r| {
        r.volumes.insert("/srv".into(), volume("/data:ro"));
    });
}

#[test]
fn shell_command_with_unterminated_quote_fails() {
    let cmd = CommandLine::Shell("echo 'oops".into());
    assert!(cmd.to_args().is_err());
}
