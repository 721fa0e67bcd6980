use super::Host;
use super::common::{LogLevel, init_logging};
use crate::Result;
use crate::reports::{count_libraries, section_heading, update_readme, write_csv};
use camino::Utf8PathBuf;
use chrono::Utc;
use clap::Parser;
use ohno::IntoAppError;
use std::fs::{self, File};
use std::io::{BufWriter, Write};

#[derive(Parser, Debug)]
pub struct ReportArgs {
    /// Import records to aggregate
    #[arg(long, default_value = "data/imports.jsonl", value_name = "PATH")]
    pub imports: Utf8PathBuf,

    /// Where to write `library,count` rows
    #[arg(long, default_value = "data/library_counts.csv", value_name = "PATH")]
    pub csv: Utf8PathBuf,

    /// Markdown file whose library table is replaced or appended
    #[arg(long, value_name = "PATH")]
    pub readme: Option<Utf8PathBuf>,

    /// Libraries shown in the README table
    #[arg(long, default_value_t = 10, value_name = "N")]
    pub top: usize,

    /// Language named in the README table heading
    #[arg(long, default_value = "python", value_name = "LANGUAGE")]
    pub language: String,

    /// Set the logging level for diagnostic output
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    pub log_level: LogLevel,
}

/// Count libraries across all import records and publish the tally
pub fn process_report<H: Host>(host: &mut H, args: &ReportArgs) -> Result<()> {
    init_logging(args.log_level);

    let counts = count_libraries(args.imports.as_std_path())?;

    if let Some(parent) = args.csv.parent()
        && !parent.as_str().is_empty()
    {
        fs::create_dir_all(parent).into_app_err_with(|| format!("creating directory '{parent}'"))?;
    }
    let file = File::create(&args.csv).into_app_err_with(|| format!("creating '{}'", args.csv))?;
    write_csv(&counts, BufWriter::new(file))?;

    let _ = writeln!(host.output(), "Found {} unique libraries, written to {}", counts.len(), args.csv);

    if let Some(readme) = &args.readme {
        let heading = section_heading(&args.language);
        if update_readme(readme.as_std_path(), &heading, &counts, args.top, Utc::now())? {
            let _ = writeln!(host.output(), "Updated {readme} with the top {} libraries", args.top.min(counts.len()));
        } else {
            let _ = writeln!(host.error(), "No library data to write to {readme}");
        }
    }

    Ok(())
}
