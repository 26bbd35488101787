use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};

/// Spawn a Windows process with a chosen parent, mitigation policy and creation strategy
#[derive(Parser, Debug)]
#[command(
    name = "winspawn",
    about = "Create processes with parent spoofing, mitigation policies and token/logon strategies",
    version,
    group(
        ArgGroup::new("strategy")
            .args(&["token_pid", "username"])
            .multiple(false)
    ),
    group(
        ArgGroup::new("logon_mode")
            .args(&["profile", "netonly"])
            .multiple(false)
    )
)]
struct Args {
    /// Command line of the new process
    #[arg(short, long)]
    command: String,

    /// Explicit application path (lpApplicationName)
    #[arg(long)]
    app: Option<String>,

    /// Working directory of the new process
    #[arg(long)]
    cwd: Option<std::path::PathBuf>,

    /// Desktop to start the process on, e.g. `WinSta0\Default`
    #[arg(long)]
    desktop: Option<String>,

    /// Console window title
    #[arg(long)]
    title: Option<String>,

    /// Process to report as the parent (spoofed parent)
    #[arg(long = "parent-pid")]
    parent_pid: Option<u32>,

    /// First generation mitigation policy bits (hex)
    #[arg(long, value_parser = parse_hex)]
    mitigation: Option<u64>,

    /// Second generation mitigation policy bits (hex)
    #[arg(long, value_parser = parse_hex)]
    mitigation2: Option<u64>,

    /// SDDL for the new process handle
    #[arg(long = "process-sddl")]
    process_sddl: Option<String>,

    /// SDDL for the new thread handle
    #[arg(long = "thread-sddl")]
    thread_sddl: Option<String>,

    /// Make the returned process handle inheritable
    #[arg(long = "inherit-process-handle")]
    inherit_process_handle: bool,

    /// Make the returned thread handle inheritable
    #[arg(long = "inherit-thread-handle")]
    inherit_thread_handle: bool,

    /// Let the child inherit this process's inheritable handles
    #[arg(long = "inherit-handles")]
    inherit_handles: bool,

    /// Create the process with a suspended main thread
    #[arg(long)]
    suspended: bool,

    /// Create the process with a new console window
    #[arg(long = "new-console")]
    new_console: bool,

    /// Create the process without a console window
    #[arg(long = "no-window")]
    no_window: bool,

    /// Create the process outside of the caller's job
    #[arg(long)]
    breakaway: bool,

    /// Kill the process again when winspawn exits
    #[arg(long = "terminate-on-exit")]
    terminate_on_exit: bool,

    /// Create the process with the primary token of this process (CreateProcessAsUser)
    #[arg(long = "token-pid")]
    token_pid: Option<u32>,

    /// Username to log on with (CreateProcessWithLogon)
    #[arg(short, long, requires = "password")]
    username: Option<String>,

    /// Password for the user
    #[arg(short, long)]
    password: Option<String>,

    /// Domain of the user (optional)
    #[arg(short = 'd', long)]
    domain: Option<String>,

    /// Load user profile
    #[arg(long)]
    profile: bool,

    /// Use credentials for remote access only
    #[arg(long)]
    netonly: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn parse_hex(value: &str) -> Result<u64, std::num::ParseIntError> {
    let digits = value.trim_start_matches("0x").trim_start_matches("0X");
    u64::from_str_radix(digits, 16)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    run(args)
}

#[cfg(windows)]
fn run(args: Args) -> Result<()> {
    use winspawn_rs::{
        enable_privilege, CreationFlags, LaunchConfig, LogonFlags, MitigationOptions,
        MitigationOptions2, OwnedProcess, PrimaryToken, ProcessLauncher, SecurityDescriptor,
    };

    // Process creation options
    let mut flags = CreationFlags::None;
    if args.suspended {
        flags |= CreationFlags::Suspended;
    }
    if args.new_console {
        flags |= CreationFlags::NewConsole;
    }
    if args.no_window {
        flags |= CreationFlags::NoWindow;
    }
    if args.breakaway {
        flags |= CreationFlags::BreakawayFromJob;
    }

    let parent = args
        .parent_pid
        .map(|pid| OwnedProcess::open(pid, OwnedProcess::CREATE_PROCESS))
        .transpose()
        .context("opening the parent process")?;

    let mut config = LaunchConfig::new(args.command.as_str())
        .creation_flags(flags)
        .mitigation(MitigationOptions(args.mitigation.unwrap_or_default()))
        .mitigation2(MitigationOptions2(args.mitigation2.unwrap_or_default()))
        .terminate_on_dispose(args.terminate_on_exit);
    config.application_name = args.app;
    config.current_directory = args.cwd;
    config.desktop = args.desktop;
    config.title = args.title;
    config.inherit_handles = args.inherit_handles;
    config.inherit_process_handle = args.inherit_process_handle;
    config.inherit_thread_handle = args.inherit_thread_handle;
    config.parent_process = parent.as_ref().map(OwnedProcess::borrow);
    config.process_security = args
        .process_sddl
        .as_deref()
        .map(SecurityDescriptor::from_sddl)
        .transpose()
        .context("parsing --process-sddl")?;
    config.thread_security = args
        .thread_sddl
        .as_deref()
        .map(SecurityDescriptor::from_sddl)
        .transpose()
        .context("parsing --thread-sddl")?;

    let launcher = ProcessLauncher::new();
    let process = if let Some(pid) = args.token_pid {
        for privilege in [
            "SeDebugPrivilege",
            "SeAssignPrimaryTokenPrivilege",
            "SeImpersonatePrivilege",
        ] {
            if !enable_privilege(privilege)? {
                tracing::info!(privilege, "privilege not held");
            }
        }
        let token = PrimaryToken::from_process(pid).context("duplicating the process token")?;
        launcher.create_as_user(token.borrow(), &config)?
    } else if let Some(username) = args.username.as_deref() {
        let mut logon_flags = LogonFlags::None;
        if args.profile {
            logon_flags |= LogonFlags::WithProfile;
        }
        if args.netonly {
            logon_flags |= LogonFlags::NetCredentialsOnly;
        }
        let password = args.password.as_deref().unwrap_or_default();
        let domain = args.domain.as_deref();
        launcher.create_with_logon(username, domain, password, logon_flags, &config)?
    } else {
        launcher.create(&config)?
    };

    println!("[+] process {} (thread {})", process.process_id(), process.thread_id());
    Ok(())
}

#[cfg(not(windows))]
fn run(_args: Args) -> Result<()> {
    anyhow::bail!("winspawn only runs on Windows")
}
