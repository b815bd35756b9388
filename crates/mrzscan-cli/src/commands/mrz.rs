//! Mrz command - parse MRZ text without a camera.

use std::fs;
use std::path::PathBuf;

use clap::Args;
use tracing::debug;

use mrzscan_core::{DocumentType, RecogResult, mrz};

use super::output::{OutputFormat, format_result};

/// Arguments for the mrz command.
#[derive(Args)]
pub struct MrzArgs {
    /// MRZ lines, top to bottom
    #[arg(required_unless_present = "file")]
    lines: Vec<String>,

    /// Read the MRZ lines from a text file
    #[arg(long, conflicts_with = "lines")]
    file: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Fail when a check digit does not match
    #[arg(long)]
    strict: bool,
}

pub async fn run(args: MrzArgs) -> anyhow::Result<()> {
    let lines = match &args.file {
        Some(path) => fs::read_to_string(path)?
            .lines()
            .map(str::to_string)
            .collect(),
        None => args.lines.clone(),
    };

    let normalized = mrz::normalize_lines(&lines);
    let fields = mrz::parse_mrz(&normalized)?;
    debug!("Parsed {} MRZ", fields.format);

    let valid = fields.is_valid();
    let mut result = RecogResult::new(DocumentType::None);
    result.set_mrz(1, normalized, fields);

    println!("{}", format_result(&result, args.format)?);

    if args.strict && !valid {
        anyhow::bail!("MRZ check digits do not match");
    }

    Ok(())
}
