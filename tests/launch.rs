#![cfg(windows)]

use winspawn_rs::{
    CreationFlags, LaunchConfig, MitigationOptions, OwnedProcess, ProcessLauncher,
    SecurityDescriptor,
};

fn cmd_exe() -> String {
    let root = std::env::var("SystemRoot").unwrap_or_else(|_| "C:\\Windows".to_string());
    format!("{root}\\System32\\cmd.exe")
}

fn suspended<'a>(command_line: &str) -> LaunchConfig<'a> {
    LaunchConfig::new(command_line)
        .application_name(cmd_exe())
        .creation_flags(CreationFlags::Suspended | CreationFlags::NoWindow)
        .terminate_on_dispose(true)
}

#[test]
fn plain_create_returns_ids_and_handles() {
    let process = ProcessLauncher::new()
        .create(&suspended("cmd.exe /c dir"))
        .expect("create");

    assert_ne!(process.process_id(), 0);
    assert_ne!(process.thread_id(), 0);
    assert!(process.process_handle().is_some());
    assert!(process.thread_handle().is_some());
}

#[test]
fn current_process_can_be_used_as_parent() {
    let parent = OwnedProcess::open(std::process::id(), OwnedProcess::CREATE_PROCESS)
        .expect("open own process");
    let config = suspended("cmd.exe /c exit 0").parent(parent.borrow());

    let process = ProcessLauncher::new().create(&config).expect("create with parent");
    assert_ne!(process.process_id(), parent.process_id());
}

#[test]
fn mitigation_policy_is_accepted() {
    let config = suspended("cmd.exe /c exit 0").mitigation(
        MitigationOptions::BottomUpAslrAlwaysOn | MitigationOptions::HighEntropyAslrAlwaysOn,
    );

    let process = ProcessLauncher::new().create(&config).expect("create with mitigation");
    assert_ne!(process.process_id(), 0);
}

#[test]
fn process_security_descriptor_is_accepted() {
    let sd = SecurityDescriptor::from_sddl("D:(A;;GA;;;SY)(A;;GA;;;BA)(A;;GA;;;OW)").expect("sddl");
    assert!(!sd.as_bytes().is_empty());

    let config = LaunchConfig {
        process_security: Some(sd),
        inherit_thread_handle: true,
        ..suspended("cmd.exe /c exit 0")
    };
    let process = ProcessLauncher::new().create(&config).expect("create with descriptor");
    assert_ne!(process.process_id(), 0);
}

#[test]
fn malformed_sddl_is_a_native_error() {
    let err = SecurityDescriptor::from_sddl("not an sddl string").expect_err("malformed sddl");
    assert!(err.code().is_some());
}

#[test]
fn missing_application_surfaces_the_last_error() {
    let config = LaunchConfig::new("missing.exe")
        .application_name("C:\\winspawn\\does\\not\\exist.exe");

    let err = ProcessLauncher::new().create(&config).expect_err("missing exe");
    assert!(matches!(err.code(), Some(2) | Some(3)), "unexpected error {err}");
    assert!(err.to_string().starts_with("CreateProcessW Failed With Error"));
}

#[test]
fn terminate_on_dispose_kills_the_process() {
    let mut process = ProcessLauncher::new()
        .create(&suspended("cmd.exe /c exit 0"))
        .expect("create");
    process.close().expect("close");
    assert!(process.process_handle().is_none());
    assert!(process.thread_handle().is_none());
}
