//! # makeldif - generate LDIF content from a template
//!
//! Streams the entries produced by the [`template`] generator into an LDIF
//! file (or standard output), reporting progress on stderr every 1,000
//! entries.
//!
//! ```text
//! makeldif -o sample.ldif -s 42 -c suffix=dc=example,dc=com example.template
//! ```
//!
//! Exit code 0 on success, 1 on any failure: bad arguments, generator
//! construction failure, or an output error.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use ldif::LdifWriter;
use template::GeneratorBuilder;

const EXIT_CODE_SUCCESS: i32 = 0;
const EXIT_CODE_FAILURE: i32 = 1;

/// How often a progress line is written to stderr.
const PROGRESS_INTERVAL: u64 = 1000;

#[derive(Parser, Debug)]
#[command(
    name = "makeldif",
    about = "Generate LDIF content based on a template",
    disable_help_flag = true
)]
struct Args {
    /// Template file describing the entries to generate.
    #[arg(value_name = "template-file-path")]
    template_file: PathBuf,

    /// Directory that holds template resources (data files).
    #[arg(short = 'r', long = "resourcePath", value_name = "PATH")]
    resource_path: Option<PathBuf>,

    /// Destination LDIF file; standard output when omitted.
    #[arg(short = 'o', long = "outputLdif", value_name = "FILE")]
    output_ldif: Option<PathBuf>,

    /// Seed for the random number generator.
    #[arg(short = 's', long = "randomSeed", value_name = "INT", default_value_t = 0)]
    random_seed: u64,

    /// Constant override, NAME=VALUE. May be given multiple times.
    #[arg(short = 'c', long = "constant", value_name = "NAME=VALUE")]
    constants: Vec<String>,

    /// Column at which long lines are wrapped; 0 disables wrapping.
    #[arg(short = 'w', long = "wrapColumn", value_name = "INT", default_value_t = 0)]
    wrap_column: usize,

    /// Print usage information.
    #[arg(short = 'H', long = "help", action = clap::ArgAction::Help)]
    help: Option<bool>,
}

fn init_tracing() {
    // Library crates emit `tracing` events; without a subscriber RUST_LOG
    // has no effect. Default to "off" so the tool stays quiet unless the
    // user opts in.
    let filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "off".into());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() {
    std::process::exit(run());
}

fn run() -> i32 {
    init_tracing();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            print!("{}", e);
            return EXIT_CODE_SUCCESS;
        }
        Err(e) => {
            eprint!("{}", e);
            return EXIT_CODE_FAILURE;
        }
    };

    match generate(args) {
        Ok(written) => {
            eprintln!("LDIF processing complete: {} entries written", written);
            EXIT_CODE_SUCCESS
        }
        Err(e) => {
            eprintln!("{:#}", e);
            EXIT_CODE_FAILURE
        }
    }
}

fn generate(args: Args) -> Result<u64> {
    let mut builder = GeneratorBuilder::new(&args.template_file).seed(args.random_seed);

    if let Some(resource_path) = &args.resource_path {
        if !resource_path.is_dir() {
            bail!(
                "resource path '{}' is not a directory",
                resource_path.display()
            );
        }
        builder = builder.resource_path(resource_path);
    }

    for constant in &args.constants {
        let (name, value) = parse_constant(constant)?;
        builder = builder.constant(name, value);
    }

    let generator = builder.build().with_context(|| {
        format!(
            "cannot initialize the entry generator from '{}'",
            args.template_file.display()
        )
    })?;

    for warning in generator.warnings() {
        eprintln!("{}", warning);
    }

    let sink: Box<dyn Write> = match &args.output_ldif {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("cannot create output file '{}'", path.display()))?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(io::stdout().lock()),
    };
    let mut writer = LdifWriter::new(sink).with_wrap_column(args.wrap_column);

    let mut written = 0u64;
    for entry in generator {
        writer
            .write_entry(&entry)
            .with_context(|| format!("error writing entry {}", entry.dn()))?;
        written += 1;
        if written % PROGRESS_INTERVAL == 0 {
            eprintln!("Processed {} entries", written);
        }
    }
    writer.flush().context("error flushing output")?;

    Ok(written)
}

/// Splits a `-c NAME=VALUE` argument.
fn parse_constant(s: &str) -> Result<(&str, &str)> {
    match s.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => Ok((name.trim(), value)),
        _ => bail!("cannot decode constant '{}' as NAME=VALUE", s),
    }
}
