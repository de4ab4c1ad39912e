// Command-line front end for oxipatch.
//
// Subcommands: `apply` runs the full pipeline against a ROM, `info` parses
// a patch on its own and prints what it declares, `config` prints build
// details. Errors go to stderr with a non-zero exit code; stats optionally
// as JSON for scripting.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueHint};

use crate::buffer::ByteBuffer;
use crate::formats::{BpsCodec, IpsCodec, PatchFormat, UpsCodec};
use crate::io::apply_file;

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// IPS/BPS/UPS ROM patch applier.
#[derive(Parser, Debug)]
#[command(
    name = "oxipatch",
    version,
    about = "IPS/BPS/UPS ROM patch applier",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Force overwrite existing output files.
    #[arg(short = 'f', long, global = true)]
    force: bool,

    /// Quiet mode (suppress non-error output).
    #[arg(short = 'q', long, global = true)]
    quiet: bool,

    /// Output stats as JSON to stderr.
    #[arg(long = "json", global = true)]
    json_output: bool,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Apply a patch to a ROM file.
    Apply(ApplyArgs),
    /// Parse a patch file and print what it declares.
    Info(InfoArgs),
    /// Print build/configuration details.
    Config,
}

#[derive(clap::Args, Debug)]
struct ApplyArgs {
    /// ROM (source) file.
    #[arg(value_hint = ValueHint::FilePath)]
    rom: PathBuf,

    /// Patch file (.ips, .bps or .ups).
    #[arg(value_hint = ValueHint::FilePath)]
    patch: PathBuf,

    /// Output file.
    #[arg(value_hint = ValueHint::FilePath)]
    output: PathBuf,

    /// Enforce embedded source/output checksums.
    #[arg(long)]
    strict: bool,
}

#[derive(clap::Args, Debug)]
struct InfoArgs {
    /// Patch file to inspect.
    #[arg(value_hint = ValueHint::FilePath)]
    patch: PathBuf,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run() -> ! {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let cli = Cli::parse();

    let exit_code = match &cli.command {
        Cmd::Apply(args) => cmd_apply(&cli, args),
        Cmd::Info(args) => cmd_info(&cli, args),
        Cmd::Config => cmd_config(),
    };

    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Apply command
// ---------------------------------------------------------------------------

fn cmd_apply(cli: &Cli, args: &ApplyArgs) -> i32 {
    if args.output.exists() && !cli.force {
        eprintln!(
            "oxipatch: output file exists, use -f to overwrite: {}",
            args.output.display()
        );
        return 1;
    }

    let stats = match apply_file(&args.rom, &args.patch, &args.output, args.strict) {
        Ok(stats) => stats,
        Err(e) => {
            eprintln!("oxipatch: {e}");
            return 1;
        }
    };

    if !cli.quiet {
        eprintln!(
            "oxipatch: applied {} patch: rom {} B, patch {} B, output {} B",
            stats.format, stats.rom_size, stats.patch_size, stats.output_size
        );
    }

    if cli.json_output {
        let json = serde_json::json!({
            "command": "apply",
            "format": stats.format,
            "rom_size": stats.rom_size,
            "patch_size": stats.patch_size,
            "output_size": stats.output_size,
            "strict": stats.strict,
            "output_sha256": stats.output_sha256.map(hex_string),
        });
        eprintln!("{}", serde_json::to_string_pretty(&json).unwrap());
    }

    0
}

fn hex_string(digest: [u8; 32]) -> String {
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

// ---------------------------------------------------------------------------
// Info command
// ---------------------------------------------------------------------------

fn cmd_info(cli: &Cli, args: &InfoArgs) -> i32 {
    let patch_bytes = match std::fs::read(&args.patch) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("oxipatch: patch file: {}: {e}", args.patch.display());
            return 1;
        }
    };

    let header = ByteBuffer::from(patch_bytes.as_slice()).read_string(6);
    // Parse against an empty ROM: `parse` only touches the patch buffer.
    let empty_rom = Vec::new();

    let mut ips = IpsCodec::new();
    let mut bps = BpsCodec::new();
    let mut ups = UpsCodec::new();

    if ips.belongs_to(&header) {
        if let Err(e) = ips
            .init(empty_rom.into(), patch_bytes.into())
            .and_then(|()| ips.parse())
        {
            eprintln!("oxipatch: {e}");
            return 1;
        }
        println!("format:  ips");
        println!("records: {}", ips.records().len());
        match ips.truncate() {
            Some(len) => println!("truncate: {len} B"),
            None => println!("truncate: none"),
        }
        if cli.json_output {
            let json = serde_json::json!({
                "format": "ips",
                "records": ips.records().len(),
                "truncate": ips.truncate(),
            });
            eprintln!("{}", serde_json::to_string_pretty(&json).unwrap());
        }
    } else if bps.belongs_to(&header) {
        if let Err(e) = bps
            .init(empty_rom.into(), patch_bytes.into())
            .and_then(|()| bps.parse())
        {
            eprintln!("oxipatch: {e}");
            return 1;
        }
        println!("format:      bps");
        println!("source size: {} B", bps.source_size());
        println!("target size: {} B", bps.target_size());
        println!("actions:     {}", bps.actions().len());
        println!("source crc:  {:#010x}", bps.source_checksum());
        println!("target crc:  {:#010x}", bps.target_checksum());
        if !bps.metadata().is_empty() {
            println!("metadata:    {}", bps.metadata());
        }
        if cli.json_output {
            let json = serde_json::json!({
                "format": "bps",
                "source_size": bps.source_size(),
                "target_size": bps.target_size(),
                "actions": bps.actions().len(),
                "source_crc": bps.source_checksum(),
                "target_crc": bps.target_checksum(),
                "metadata": bps.metadata(),
            });
            eprintln!("{}", serde_json::to_string_pretty(&json).unwrap());
        }
    } else if ups.belongs_to(&header) {
        if let Err(e) = ups
            .init(empty_rom.into(), patch_bytes.into())
            .and_then(|()| ups.parse())
        {
            eprintln!("oxipatch: {e}");
            return 1;
        }
        println!("format:      ups");
        println!("input size:  {} B", ups.input_size());
        println!("output size: {} B", ups.output_size());
        println!("records:     {}", ups.records().len());
        println!("input crc:   {:#010x}", ups.input_checksum());
        println!("output crc:  {:#010x}", ups.output_checksum());
        if cli.json_output {
            let json = serde_json::json!({
                "format": "ups",
                "input_size": ups.input_size(),
                "output_size": ups.output_size(),
                "records": ups.records().len(),
                "input_crc": ups.input_checksum(),
                "output_crc": ups.output_checksum(),
            });
            eprintln!("{}", serde_json::to_string_pretty(&json).unwrap());
        }
    } else {
        eprintln!("oxipatch: cannot recognize patch format: {}", args.patch.display());
        return 1;
    }

    0
}

#[cfg(any(test, feature = "fuzzing"))]
pub fn fuzz_try_parse_args(args: &[String]) {
    let argv: Vec<String> = std::iter::once("oxipatch".to_string())
        .chain(args.iter().cloned())
        .collect();
    let _ = Cli::try_parse_from(argv);
}

// ---------------------------------------------------------------------------
// Config command
// ---------------------------------------------------------------------------

fn cmd_config() -> i32 {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!("oxipatch version {version} (Rust), Copyright (C) oxipatch contributors");
    eprintln!("Licensed under the MIT license");

    let crc32 = cfg!(feature = "crc32") as u8;
    let file_io = cfg!(feature = "file-io") as u8;
    let ptr_size = std::mem::size_of::<*const ()>();

    eprintln!("CRC32_FAST={crc32}");
    eprintln!("FILE_IO={file_io}");
    eprintln!("FORMATS=ips,bps,ups");
    eprintln!("sizeof(usize)={ptr_size}");

    0
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
