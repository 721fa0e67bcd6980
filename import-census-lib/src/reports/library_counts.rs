use crate::Result;
use crate::crawl::ImportRecord;
use ohno::IntoAppError;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

const LOG_TARGET: &str = "    report";

/// How many import records name one library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryCount {
    pub library: String,
    pub count: u64,
}

/// Count libraries in an import-record file, most common first.
pub fn count_libraries(path: &Path) -> Result<Vec<LibraryCount>> {
    let file = File::open(path).into_app_err_with(|| format!("opening import records '{}'", path.display()))?;
    count_from_reader(BufReader::new(file))
}

/// Count libraries in JSON-lines import records, skipping lines that do not parse.
///
/// Ties in count are ordered by library name so output is stable across runs.
pub fn count_from_reader(reader: impl BufRead) -> Result<Vec<LibraryCount>> {
    let mut counts: HashMap<String, u64> = HashMap::new();

    for (index, line) in reader.split(b'\n').enumerate() {
        let bytes = line.into_app_err("reading import records")?;
        let text = String::from_utf8_lossy(&bytes);
        let text = text.trim();
        if text.is_empty() {
            continue;
        }

        match serde_json::from_str::<ImportRecord>(text) {
            Ok(record) => *counts.entry(record.library).or_default() += 1,
            Err(e) => log::warn!(target: LOG_TARGET, "Skipping invalid record on line {}: {e}", index + 1),
        }
    }

    let mut counts: Vec<LibraryCount> = counts
        .into_iter()
        .map(|(library, count)| LibraryCount { library, count })
        .collect();
    counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.library.cmp(&b.library)));

    Ok(counts)
}

/// Write `library,count` rows after a header line.
pub fn write_csv<W: Write>(counts: &[LibraryCount], writer: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(["library", "count"]).into_app_err("writing library counts")?;
    for count in counts {
        writer
            .write_record([count.library.as_str(), count.count.to_string().as_str()])
            .into_app_err("writing library counts")?;
    }
    writer.flush().into_app_err("flushing library counts")?;
    Ok(())
}
