#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::collections::BTreeMap;

use dockfence_core::model::{CreationRequest, VolumeConfig};
use dockfence_core::RejectReason;
use dockfence_gateway::config::SecuritySection;
use dockfence_gateway::policy::paths::{normalize_host_path, PathDenylist};
use dockfence_gateway::policy::{PolicyEngine, ValidationVerdict};

fn engine() -> PolicyEngine {
    PolicyEngine::new(&SecuritySection::default()).unwrap()
}

fn engine_with(images: &[&str], caps: &[&str]) -> PolicyEngine {
    let security = SecuritySection {
        allowed_images: images.iter().map(|s| s.to_string()).collect(),
        allowed_capabilities: caps.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    };
    PolicyEngine::new(&security).unwrap()
}

fn mount(host: &str) -> BTreeMap<String, VolumeConfig> {
    let mut v = BTreeMap::new();
    v.insert(
        host.to_string(),
        VolumeConfig {
            bind: "/data".into(),
            mode: Default::default(),
        },
    );
    v
}

fn rejected(engine: &PolicyEngine, req: CreationRequest) -> RejectReason {
    match engine.evaluate(req) {
        ValidationVerdict::Rejected(r) => r,
        ValidationVerdict::Accepted(_) => panic!("expected rejection"),
    }
}

#[test]
fn plain_request_is_accepted_unchanged() {
    let mut req = CreationRequest::for_image("nginx");
    req.labels.insert("team".into(), "web".into());
    let verdict = engine().evaluate(req.clone());
    assert!(verdict.rejection().is_none());
    let sanitized = verdict.into_result().unwrap();
    assert_eq!(sanitized.request(), &req);
}

#[test]
fn privileged_wins_over_everything_else() {
    let mut req = CreationRequest::for_image("not-allowed");
    req.privileged = true;
    req.network_mode = Some("host".into());
    req.devices = vec!["/dev/kvm".into()];
    req.cap_add = vec!["SYS_ADMIN".into()];
    req.volumes = mount("/");
    let e = engine_with(&["nginx"], &[]);
    assert_eq!(rejected(&e, req), RejectReason::PrivilegedRequested);
}

#[test]
fn rules_apply_in_order() {
    let e = engine_with(&["nginx"], &[]);

    let mut req = CreationRequest::for_image("nginx");
    req.pid_mode = Some("host".into());
    req.devices = vec!["/dev/fuse".into()];
    assert_eq!(rejected(&e, req), RejectReason::HostPidRequested);

    let mut req = CreationRequest::for_image("nginx");
    req.devices = vec!["/dev/fuse".into()];
    req.cap_add = vec!["NET_ADMIN".into()];
    assert_eq!(rejected(&e, req), RejectReason::DeviceAccessRequested);

    let mut req = CreationRequest::for_image("busybox");
    req.volumes = mount("/etc");
    assert_eq!(
        rejected(&e, req),
        RejectReason::SensitivePathMount("/etc".into())
    );
}

#[test]
fn host_namespaces_are_rejected() {
    let e = engine();

    let mut req = CreationRequest::for_image("nginx");
    req.network_mode = Some("HOST".into());
    assert_eq!(rejected(&e, req), RejectReason::HostNetworkRequested);

    let mut req = CreationRequest::for_image("nginx");
    req.network = Some("host".into());
    assert_eq!(rejected(&e, req), RejectReason::HostNetworkRequested);

    let mut req = CreationRequest::for_image("nginx");
    req.network_mode = Some("container:db".into());
    assert_eq!(rejected(&e, req), RejectReason::HostNetworkRequested);

    let mut req = CreationRequest::for_image("nginx");
    req.ipc_mode = Some("host".into());
    assert_eq!(rejected(&e, req), RejectReason::HostIpcRequested);

    let mut req = CreationRequest::for_image("nginx");
    req.network_mode = Some("bridge".into());
    req.ipc_mode = Some("private".into());
    assert!(e.evaluate(req).rejection().is_none());
}

#[test]
fn security_opt_and_sysctls_are_rejected() {
    let e = engine();

    let mut req = CreationRequest::for_image("nginx");
    req.security_opt = vec!["apparmor=unconfined".into()];
    assert_eq!(rejected(&e, req), RejectReason::SecurityOptRequested);

    let mut req = CreationRequest::for_image("nginx");
    req.sysctls.insert("net.ipv4.ip_forward".into(), "1".into());
    assert_eq!(rejected(&e, req), RejectReason::SysctlRequested);
}

#[test]
fn any_capability_is_rejected_by_default() {
    for cap in ["NET_BIND_SERVICE", "chown", "CAP_SYS_ADMIN"] {
        let mut req = CreationRequest::for_image("nginx");
        req.cap_add = vec![cap.into()];
        assert_eq!(
            rejected(&engine(), req),
            RejectReason::DisallowedCapability(cap.into())
        );
    }
}

#[test]
fn allowed_capabilities_match_case_and_prefix_insensitively() {
    let e = engine_with(&[], &["NET_BIND_SERVICE"]);

    let mut req = CreationRequest::for_image("nginx");
    req.cap_add = vec!["cap_net_bind_service".into(), "NET_BIND_SERVICE".into()];
    assert!(e.evaluate(req).rejection().is_none());

    let mut req = CreationRequest::for_image("nginx");
    req.cap_add = vec!["net_bind_service".into(), "NET_RAW".into()];
    assert_eq!(
        rejected(&e, req),
        RejectReason::DisallowedCapability("NET_RAW".into())
    );
}

#[test]
fn sensitive_mounts_are_rejected() {
    let e = engine();
    for path in [
        "/",
        "/etc",
        "/var/run/docker.sock",
        "/etc/nginx",
        "/var",
        "/var/lib/docker/volumes",
        "/var/lib",
        "/run/containerd/containerd.sock",
        "/srv/../etc",
        "/tmp/./../proc/1",
        "//sys//",
        "etc/passwd",
        "/../../boot",
    ] {
        let mut req = CreationRequest::for_image("nginx");
        req.volumes = mount(path);
        assert_eq!(
            rejected(&e, req),
            RejectReason::SensitivePathMount(path.into()),
            "{path}"
        );
    }
}

#[test]
fn ordinary_mounts_are_accepted() {
    let e = engine();
    for path in ["/srv/app", "/opt/data", "/tmp/cache", "/var/lib/app", "/etcetera"] {
        let mut req = CreationRequest::for_image("nginx");
        req.volumes = mount(path);
        assert!(e.evaluate(req).rejection().is_none(), "{path}");
    }
}

#[test]
fn configured_paths_extend_the_denylist() {
    let security = SecuritySection {
        blocked_volume_paths: vec!["/srv/secrets/".into()],
        ..Default::default()
    };
    let e = PolicyEngine::new(&security).unwrap();
    assert!(e.denylist().entries().contains(&"/srv/secrets".to_string()));
    assert!(e.denylist().entries().contains(&"/etc".to_string()));

    let mut req = CreationRequest::for_image("nginx");
    req.volumes = mount("/srv/secrets/db");
    assert!(matches!(
        rejected(&e, req),
        RejectReason::SensitivePathMount(_)
    ));
}

#[test]
fn path_normalization_is_lexical() {
    assert_eq!(normalize_host_path("/a/./b/../c/"), "/a/c");
    assert_eq!(normalize_host_path("/../.."), "/");
    assert_eq!(normalize_host_path("rel/x"), "/rel/x");
    assert_eq!(normalize_host_path(""), "/");

    let list = PathDenylist::new(&[]);
    assert_eq!(list.collision("/var"), Some("/var/lib/containerd"));
    assert_eq!(list.collision("/var/run/docker.sock"), Some("/var/run"));
    assert!(!list.is_blocked("/variable"));
}

#[test]
fn image_allowlist() {
    let e = engine_with(&["nginx", "redis:7", "registry.local:5000/team/api"], &[]);
    for ok in ["nginx", "nginx:1.25", "redis:7", "registry.local:5000/team/api:2"] {
        assert!(
            e.evaluate(CreationRequest::for_image(ok)).rejection().is_none(),
            "{ok}"
        );
    }
    for bad in ["redis:6", "redis", "busybox", "evil/nginx", "registry.local:5000/team/other"] {
        assert_eq!(
            rejected(&e, CreationRequest::for_image(bad)),
            RejectReason::ImageNotAllowlisted(bad.into()),
            "{bad}"
        );
    }
}

#[test]
fn empty_allowlist_admits_any_image() {
    assert!(engine()
        .evaluate(CreationRequest::for_image("anything/at:all"))
        .rejection()
        .is_none());
}
