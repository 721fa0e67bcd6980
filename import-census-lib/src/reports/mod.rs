//! Aggregation of the import stream
//!
//! The crawl only ever appends import records. Everything here reads that stream
//! after the fact: [`count_libraries`] tallies how many records name each library,
//! [`write_csv`] saves the tally, and [`update_readme`] splices the most common
//! libraries into a Markdown table.

mod library_counts;
mod readme;

pub use library_counts::{LibraryCount, count_from_reader, count_libraries, write_csv};
pub use readme::{render_section, section_heading, splice_section, update_readme};
