// Command-line front end for filebus.
//
// A thin collaborator around the library: builds a destination over a
// local directory tree, hands it files, and reports per-file outcomes.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};

use crate::codec::Compression;
use crate::config::{DestinationConfig, EncodingKind};
use crate::container::DEFAULT_BLOCK_SIZE;
use crate::delivery::{DeliverError, Delivery, DeliveryRequest, Destination};
use crate::encode::open_records;
use crate::store::{LocalFsStore, RemotePath, RemoteStore};

// ---------------------------------------------------------------------------
// Byte size parsing (supports K, M, G suffixes)
// ---------------------------------------------------------------------------

fn parse_byte_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty size string".into());
    }
    let (num_part, multiplier) = match s.as_bytes().last() {
        Some(b'k' | b'K') => (&s[..s.len() - 1], 1024u64),
        Some(b'm' | b'M') => (&s[..s.len() - 1], 1024 * 1024),
        Some(b'g' | b'G') => (&s[..s.len() - 1], 1024 * 1024 * 1024),
        _ => (s, 1u64),
    };
    let num: u64 = num_part
        .trim()
        .parse()
        .map_err(|e| format!("invalid size '{s}': {e}"))?;
    num.checked_mul(multiplier)
        .ok_or_else(|| format!("size overflow: '{s}'"))
}

fn parse_compression(s: &str) -> Result<Compression, String> {
    s.parse::<Compression>().map_err(|e| {
        format!(
            "{e} (available: {})",
            Compression::available().join(", ")
        )
    })
}

fn parse_encoding(s: &str) -> Result<EncodingKind, String> {
    s.parse::<EncodingKind>().map_err(|e| e.to_string())
}

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// Deliver local files into a remote directory: staging write, atomic
/// publish, local cleanup.
#[derive(Parser, Debug)]
#[command(
    name = "filebus",
    version,
    about = "Crash-safe file delivery into a storage namespace",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Quiet mode (suppress non-error output).
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode (use multiple times for more detail).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Output stats as JSON to stderr.
    #[arg(long = "json", global = true)]
    json_output: bool,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Deliver local files into a destination directory.
    Deliver(DeliverArgs),
    /// Print a delivered object.
    Cat(CatArgs),
    /// Print build/configuration details.
    Config,
}

#[derive(Args, Debug)]
struct StoreArgs {
    /// Local directory acting as the storage namespace root.
    #[arg(long = "store-root", value_hint = ValueHint::DirPath)]
    store_root: PathBuf,
}

#[derive(Args, Debug)]
struct DeliverArgs {
    #[command(flatten)]
    store: StoreArgs,

    /// Destination directory inside the namespace.
    #[arg(long = "dest", short = 'd', default_value = "/")]
    dest: String,

    /// Encoding: raw (verbatim copy) or records (one record per line).
    #[arg(long, short = 'e', value_parser = parse_encoding, default_value = "raw")]
    encoding: EncodingKind,

    /// Block compression for record encoding.
    #[arg(long, short = 'c', value_parser = parse_compression)]
    compression: Option<Compression>,

    /// Compression level (zlib only, 0-9).
    #[arg(long, short = 'l', value_parser = clap::value_parser!(u32).range(0..=9))]
    level: Option<u32>,

    /// Raw bytes per record block (supports K/M/G suffix).
    #[arg(long = "block-size", value_parser = parse_byte_size, default_value_t = DEFAULT_BLOCK_SIZE as u64)]
    block_size: u64,

    /// Do not store per-block checksums.
    #[arg(long = "no-checksum")]
    no_checksum: bool,

    /// Extra attempts per file after a retryable failure.
    #[arg(long, default_value_t = 0)]
    retries: u32,

    /// Delay between attempts, in milliseconds.
    #[arg(long = "retry-delay-ms", default_value_t = 500)]
    retry_delay_ms: u64,

    /// Files to deliver.
    #[arg(required = true, value_hint = ValueHint::FilePath)]
    files: Vec<PathBuf>,
}

#[derive(Args, Debug)]
struct CatArgs {
    #[command(flatten)]
    store: StoreArgs,

    /// Decode a record container and print one line per record.
    #[arg(long, short = 'r')]
    records: bool,

    /// Object path inside the namespace.
    remote: String,
}

// ---------------------------------------------------------------------------
// Resolved command + options (flattened from Cli)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Deliver,
    Cat,
    Config,
}

struct Options {
    command: Command,
    quiet: bool,
    verbose: u8,
    json_output: bool,
    store_root: Option<PathBuf>,
    dest: String,
    encoding: EncodingKind,
    compression: Option<Compression>,
    level: Option<u32>,
    block_size: usize,
    no_checksum: bool,
    retries: u32,
    retry_delay: Duration,
    files: Vec<PathBuf>,
    records: bool,
    remote: Option<String>,
}

impl Options {
    fn base(command: Command, quiet: bool, verbose: u8, json_output: bool) -> Self {
        Self {
            command,
            quiet,
            verbose,
            json_output,
            store_root: None,
            dest: "/".to_string(),
            encoding: EncodingKind::Raw,
            compression: None,
            level: None,
            block_size: DEFAULT_BLOCK_SIZE,
            no_checksum: false,
            retries: 0,
            retry_delay: Duration::ZERO,
            files: Vec::new(),
            records: false,
            remote: None,
        }
    }
}

fn resolve_options(cli: Cli) -> Options {
    let quiet = cli.quiet;
    let verbose = cli.verbose.min(2);
    let json_output = cli.json_output;

    match cli.command {
        Cmd::Deliver(args) => {
            // Naming a codec implies record encoding.
            let encoding = if args.compression.is_some() {
                EncodingKind::Records
            } else {
                args.encoding
            };
            Options {
                store_root: Some(args.store.store_root),
                dest: args.dest,
                encoding,
                compression: args.compression,
                level: args.level,
                block_size: usize::try_from(args.block_size).unwrap_or(usize::MAX),
                no_checksum: args.no_checksum,
                retries: args.retries,
                retry_delay: Duration::from_millis(args.retry_delay_ms),
                files: args.files,
                ..Options::base(Command::Deliver, quiet, verbose, json_output)
            }
        }
        Cmd::Cat(args) => Options {
            store_root: Some(args.store.store_root),
            records: args.records,
            remote: Some(args.remote),
            ..Options::base(Command::Cat, quiet, verbose, json_output)
        },
        Cmd::Config => Options::base(Command::Config, quiet, verbose, json_output),
    }
}

#[cfg(any(test, feature = "fuzzing"))]
pub fn fuzz_try_parse_args(args: &[String]) {
    let argv: Vec<String> = std::iter::once("filebus".to_string())
        .chain(args.iter().cloned())
        .collect();
    if let Ok(cli) = Cli::try_parse_from(argv) {
        let opts = resolve_options(cli);
        if opts.command == Command::Deliver {
            if let Ok(config) = build_destination_config(&opts) {
                let _ = config.encoder();
            }
        }
    }
}

fn build_destination_config(opts: &Options) -> Result<DestinationConfig, String> {
    let compression = match (opts.compression.clone(), opts.level) {
        #[cfg(feature = "zlib")]
        (Some(Compression::Zlib { .. }), Some(level)) => Some(Compression::Zlib { level }),
        (Some(c), Some(_)) => {
            return Err(format!("--level applies only to zlib, not {}", c.name()));
        }
        (None, Some(_)) => return Err("--level requires --compression zlib".to_string()),
        (c, None) => c,
    };
    Ok(DestinationConfig {
        directory: opts.dest.clone(),
        encoding: opts.encoding,
        compression,
        block_size: opts.block_size,
        checksum: !opts.no_checksum,
    })
}

/// Total attempts per file: the first try plus `--retries`.
fn attempts(opts: &Options) -> u32 {
    opts.retries.saturating_add(1)
}

fn open_store(opts: &Options, cmd: &str) -> Option<Arc<LocalFsStore>> {
    let root = opts.store_root.as_ref()?;
    match LocalFsStore::new(root) {
        Ok(store) => Some(Arc::new(store)),
        Err(e) => {
            eprintln!("filebus: {cmd}: store root {}: {e}", root.display());
            None
        }
    }
}

// ---------------------------------------------------------------------------
// deliver
// ---------------------------------------------------------------------------

type Outcome = (PathBuf, Result<Delivery, DeliverError>);

#[cfg(feature = "parallel")]
fn deliver_all(dest: &Destination, opts: &Options) -> Vec<Outcome> {
    use rayon::prelude::*;
    opts.files
        .par_iter()
        .map(|file| {
            let request = DeliveryRequest::new(file);
            let result = dest.deliver_with_retry(request, attempts(opts), opts.retry_delay);
            (file.clone(), result)
        })
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn deliver_all(dest: &Destination, opts: &Options) -> Vec<Outcome> {
    opts.files
        .iter()
        .map(|file| {
            let request = DeliveryRequest::new(file);
            let result = dest.deliver_with_retry(request, attempts(opts), opts.retry_delay);
            (file.clone(), result)
        })
        .collect()
}

fn cmd_deliver(opts: &Options) -> i32 {
    let config = match build_destination_config(opts) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("filebus: deliver: {e}");
            return 1;
        }
    };
    let Some(store) = open_store(opts, "deliver") else {
        return 1;
    };
    let dest = match config.build(store) {
        Ok(dest) => dest,
        Err(e) => {
            eprintln!("filebus: deliver: {e}");
            return 1;
        }
    };

    let outcomes = deliver_all(&dest, opts);

    let mut delivered = 0u64;
    let mut retained = 0u64;
    let mut bytes_in = 0u64;
    let mut bytes_out = 0u64;
    let mut failures = Vec::new();
    for (file, result) in &outcomes {
        match result {
            Ok(d) => {
                delivered += 1;
                bytes_in += d.stats.bytes_read;
                bytes_out += d.stats.bytes_written;
                if d.local_retained {
                    retained += 1;
                }
                if opts.verbose > 0 && !opts.quiet {
                    eprintln!(
                        "filebus: {} -> {} ({} -> {} bytes)",
                        file.display(),
                        d.target,
                        d.stats.bytes_read,
                        d.stats.bytes_written
                    );
                }
            }
            Err(e) => {
                eprintln!("filebus: deliver: {}: {e}", file.display());
                failures.push(serde_json::json!({
                    "file": file.display().to_string(),
                    "retryable": e.is_retryable(),
                    "error": e.to_string(),
                }));
            }
        }
    }

    if opts.json_output {
        let json = serde_json::json!({
            "destination": dest.directory().as_str(),
            "encoder": dest.encoder().to_string(),
            "delivered": delivered,
            "failed": failures.len(),
            "local_retained": retained,
            "bytes_read": bytes_in,
            "bytes_written": bytes_out,
            "failures": failures,
        });
        if let Ok(text) = serde_json::to_string_pretty(&json) {
            eprintln!("{text}");
        }
    }

    if failures.is_empty() { 0 } else { 1 }
}

// ---------------------------------------------------------------------------
// cat
// ---------------------------------------------------------------------------

fn cmd_cat(opts: &Options) -> i32 {
    let Some(store) = open_store(opts, "cat") else {
        return 1;
    };
    let remote = match RemotePath::new(opts.remote.as_deref().unwrap_or("/")) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("filebus: cat: {e}");
            return 1;
        }
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();

    if opts.records {
        let reader = match open_records(store.as_ref(), &remote) {
            Ok(r) => r,
            Err(e) => {
                eprintln!("filebus: cat: {remote}: {e}");
                return 1;
            }
        };
        let mut count = 0u64;
        for record in reader {
            let record = match record {
                Ok(r) => r,
                Err(e) => {
                    eprintln!("filebus: cat: {remote}: {e}");
                    return 1;
                }
            };
            if let Err(e) = out
                .write_all(&record.value)
                .and_then(|()| out.write_all(b"\n"))
            {
                eprintln!("filebus: cat: write: {e}");
                return 1;
            }
            count += 1;
        }
        if opts.json_output {
            let json = serde_json::json!({ "object": remote.as_str(), "records": count });
            if let Ok(text) = serde_json::to_string_pretty(&json) {
                eprintln!("{text}");
            }
        }
    } else {
        let mut reader = match store.open(&remote) {
            Ok(r) => r,
            Err(e) => {
                eprintln!("filebus: cat: {remote}: {e}");
                return 1;
            }
        };
        if let Err(e) = io::copy(&mut reader, &mut out) {
            eprintln!("filebus: cat: {e}");
            return 1;
        }
    }

    if let Err(e) = out.flush() {
        eprintln!("filebus: cat: write: {e}");
        return 1;
    }
    0
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

fn cmd_config() -> i32 {
    println!("filebus version {}", env!("CARGO_PKG_VERSION"));
    println!("encodings: raw, records");
    println!("compression: {}", Compression::available().join(", "));
    println!("default compression: {}", Compression::default());
    println!("default block size: {DEFAULT_BLOCK_SIZE}");
    println!(
        "adler32: {}",
        if cfg!(feature = "adler32") {
            "simd"
        } else {
            "scalar"
        }
    );
    println!(
        "parallel delivery: {}",
        if cfg!(feature = "parallel") {
            "yes"
        } else {
            "no"
        }
    );
    0
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn log_filter(opts: &Options) -> &'static str {
    if opts.quiet {
        return "error";
    }
    match opts.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

/// Main CLI entry point. Parses arguments via clap, dispatches commands.
pub fn run() -> ! {
    let cli = Cli::parse();
    let opts = resolve_options(cli);

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_filter(&opts)))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let exit_code = match opts.command {
        Command::Deliver => cmd_deliver(&opts),
        Command::Cat => cmd_cat(&opts),
        Command::Config => cmd_config(),
    };

    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
