use std::fs::OpenOptions;
use std::io;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::fmt::{self, writer::BoxMakeWriter};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{Layer, Registry};

use burrow::config::{LogOptions, ServerInfo, DEFAULT_PAGE_WIDTH};
use burrow::restrict::Restrictions;
use burrow::{server, Config};


/// A caching Gopher server with gophermap rendering and CGI support.
#[derive(Debug, Parser)]
#[command(name = "burrow", version, about, long_about = None)]
struct Args {
    /// Directory to serve.
    #[arg(long, default_value = "/var/gopher")]
    root: PathBuf,

    /// Host name written into menus.
    #[arg(long, default_value = "localhost")]
    hostname: String,

    /// Port to listen on, also written into menus.
    #[arg(long, default_value_t = burrow::protocol::DEFAULT_PORT)]
    port: u16,

    /// Address to listen on.
    #[arg(long, default_value = "0.0.0.0")]
    bind_addr: IpAddr,

    /// Menu width used for truncating names and reflowing text.
    #[arg(long, default_value_t = DEFAULT_PAGE_WIDTH)]
    page_width: usize,

    /// Text appended to every directory menu. `\n` starts a new line.
    #[arg(long, default_value = "")]
    footer: String,

    /// Separate the footer from the menu with a line of underscores.
    #[arg(long)]
    footer_separator: bool,

    /// Regular expression for file names to hide and refuse. Repeatable.
    #[arg(long, value_name = "REGEX")]
    restrict_files: Vec<String>,

    /// Regular expression for command paths that may never run. Repeatable.
    #[arg(long, value_name = "REGEX")]
    restrict_commands: Vec<String>,

    /// Never run CGI scripts or gophermap commands.
    #[arg(long)]
    disable_cgi: bool,

    /// Maximum number of cached files.
    #[arg(long, default_value_t = burrow::config::DEFAULT_CACHE_SIZE)]
    cache_size: usize,

    /// Largest file to cache, in MiB.
    #[arg(long, default_value_t = 1.0, value_name = "MIB")]
    cache_file_max: f64,

    /// Seconds between checks for changed cached files.
    #[arg(long, default_value_t = 60, value_name = "SECS")]
    file_monitor_freq: u64,

    /// Cache nothing.
    #[arg(long)]
    disable_cache: bool,

    /// Milliseconds a script may run before it is killed.
    #[arg(long, default_value_t = 2500, value_name = "MS")]
    exec_timeout: u64,

    /// Character set announced to clients and scripts.
    #[arg(long, default_value = "utf-8")]
    charset: String,

    /// Server description for caps.txt.
    #[arg(long, default_value = "")]
    description: String,

    /// Administrator e-mail address for caps.txt.
    #[arg(long, default_value = "")]
    admin_email: String,

    /// Server location for caps.txt.
    #[arg(long, default_value = "")]
    geolocation: String,

    /// Where log output goes.
    #[arg(long, value_enum, default_value_t = LogOutput::Stderr)]
    log_output: LogOutput,

    /// Comma-separated log options: `timestamp`, `ip`.
    #[arg(long, default_value = "timestamp,ip", value_parser = parse_log_opts)]
    log_opts: LogOptions,

    /// System log file, used with `--log-output file`.
    #[arg(long, default_value = "burrow-system.log")]
    system_log: PathBuf,

    /// Access log file, used with `--log-output file`.
    #[arg(long, default_value = "burrow-access.log")]
    access_log: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogOutput {
    Stderr,
    File,
    Null,
}

fn parse_log_opts(list: &str) -> Result<LogOptions, String> {
    LogOptions::parse_list(list).map_err(|name| format!("unknown log option `{name}`"))
}


#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(e) = init_logging(&args) {
        eprintln!("Failed to open log files: {e}");
        return ExitCode::FAILURE;
    }

    if is_root() {
        tracing::error!("refusing to run as root");
        return ExitCode::FAILURE;
    }
    let config = match build_config(&args) {
        Ok(c) => c,
        Err(msg) => {
            tracing::error!("{msg}");
            return ExitCode::FAILURE;
        },
    };

    let listener = match tokio::net::TcpListener::bind((args.bind_addr, args.port)).await {
        Ok(l) => l,
        Err(e) => {
            let error: &dyn std::error::Error = &e;
            tracing::error!(error, addr = %args.bind_addr, port = args.port, "failed to bind");
            return ExitCode::FAILURE;
        },
    };
    let shared = server::Shared::new(config);

    // Serve until we receive a quit signal
    let res = tokio::select! {
        biased;  // poll in order, so quit() future first
        r = quit() => r,
        r = server::run(listener, shared) => r,
    };
    tracing::info!("shutting down");
    match res {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let error: &dyn std::error::Error = &e;
            tracing::error!(error, "server loop failed");
            ExitCode::FAILURE
        },
    }
}


/// Turns the command line into a [`Config`], canonicalising the root and
/// changing into it.
fn build_config(args: &Args) -> Result<Config, String> {
    let root = args.root.canonicalize()
        .map_err(|e| format!("invalid root {}: {e}", args.root.display()))?;
    if !root.is_dir() {
        return Err(format!("root {} is not a directory", root.display()));
    }
    std::env::set_current_dir(&root)
        .map_err(|e| format!("failed to change into {}: {e}", root.display()))?;

    let mut config = Config::new(root, &args.hostname);
    config.host.port = args.port;
    config.page_width = args.page_width;
    config.set_footer(&args.footer, args.footer_separator);
    config.charset = args.charset.as_str().into();
    config.restrict_files = Restrictions::parse(&args.restrict_files.join("\n"))
        .map_err(|e| format!("invalid --restrict-files pattern: {e}"))?;
    config.restrict_commands = Restrictions::parse(&args.restrict_commands.join("\n"))
        .map_err(|e| format!("invalid --restrict-commands pattern: {e}"))?;
    config.cgi = !args.disable_cgi;

    config.cache_size = args.cache_size;
    config.cache_file_max = mib_to_bytes(args.cache_file_max)
        .ok_or_else(|| format!("invalid --cache-file-max {}", args.cache_file_max))?;
    config.monitor_period = Duration::from_secs(args.file_monitor_freq.max(1));
    if args.disable_cache {
        config.disable_cache();
    }
    config.exec_timeout = Duration::from_millis(args.exec_timeout);
    config.log_opts = args.log_opts;
    config.info = ServerInfo {
        description: args.description.as_str().into(),
        admin_email: args.admin_email.as_str().into(),
        geolocation: args.geolocation.as_str().into(),
    };

    tracing::debug!(?config, "configuration loaded");
    Ok(config)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn mib_to_bytes(mib: f64) -> Option<u64> {
    (mib.is_finite() && mib >= 0.0).then(|| (mib * 1024.0 * 1024.0) as u64)
}

fn is_root() -> bool {
    nix::unistd::geteuid().is_root()
}


/// Waits for a signal to shut the Gopher server down.
async fn quit() -> io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};
    let mut term = signal(SignalKind::terminate())?;
    tokio::select! {
        r = tokio::signal::ctrl_c() => r,
        _ = term.recv() => Ok(()),
    }
}


/// Sets up the system and access logs. Verbosity of the system log is
/// configured with the `RUST_LOG` environment variable.
fn init_logging(args: &Args) -> io::Result<()> {
    let max_level = match std::env::var("RUST_LOG") {
        Ok(var) if !var.is_empty() => match var.parse::<LevelFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!("Ignoring `RUST_LOG={var}`: {e}");
                LevelFilter::INFO
            },
        },
        Ok(_) | Err(std::env::VarError::NotPresent) => LevelFilter::INFO,
        Err(e) => {
            eprintln!("Ignoring `RUST_LOG`: {e}");
            LevelFilter::INFO
        },
    };

    let (system, access) = match args.log_output {
        LogOutput::Stderr => (BoxMakeWriter::new(io::stderr), BoxMakeWriter::new(io::stderr)),
        LogOutput::File => (file_writer(&args.system_log)?, file_writer(&args.access_log)?),
        LogOutput::Null => (BoxMakeWriter::new(io::sink), BoxMakeWriter::new(io::sink)),
    };
    let ansi = args.log_output == LogOutput::Stderr;
    let timestamps = args.log_opts.contains(LogOptions::TIMESTAMP);

    let system_filter = Targets::new()
        .with_target(burrow::ACCESS_TARGET, LevelFilter::OFF)
        .with_default(max_level);
    let access_filter = Targets::new().with_target(burrow::ACCESS_TARGET, LevelFilter::INFO);

    tracing_subscriber::registry()
        .with(vec![
            log_layer(system, ansi, timestamps, true, system_filter),
            log_layer(access, ansi, timestamps, false, access_filter),
        ])
        .init();
    Ok(())
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn log_layer(
    writer: BoxMakeWriter,
    ansi: bool,
    timestamps: bool,
    target: bool,
    filter: Targets,
) -> BoxedLayer {
    let layer = fmt::layer::<Registry>().with_writer(writer).with_ansi(ansi).with_target(target);
    if timestamps {
        Box::new(layer.with_filter(filter))
    } else {
        Box::new(layer.without_time().with_filter(filter))
    }
}

fn file_writer(path: &Path) -> io::Result<BoxMakeWriter> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(BoxMakeWriter::new(Mutex::new(file)))
}
