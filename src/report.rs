use std::fmt::Write;

use serde::Serialize;

use crate::models::{EvaluationRecord, NavigationContext};
use crate::queue::QueueSnapshot;
use crate::scoring::{self, MeritRow};

#[derive(Debug, Serialize)]
struct ListingCsvRow<'a> {
    position: usize,
    dni: &'a str,
    display_name: &'a str,
    level: &'a str,
    total_score: String,
    classification: &'a str,
}

fn scope_label(context: &NavigationContext) -> String {
    match context.level_filter {
        Some(level) => format!("period {} ({})", context.period_id, level),
        None => format!("period {} (all levels)", context.period_id),
    }
}

pub fn build_report(queue: &QueueSnapshot, records: &[EvaluationRecord]) -> String {
    let rows = scoring::rank_merit(&queue.entries, records);

    let mut output = String::new();

    let _ = writeln!(output, "# Merit Listing");
    let _ = writeln!(output, "Generated for {}", scope_label(&queue.context));
    let _ = writeln!(output);
    let _ = writeln!(output, "## Review Progress");
    let _ = writeln!(output, "- Inscriptions in queue: {}", queue.entries.len());
    let _ = writeln!(output, "- Evaluated: {}", queue.evaluated_count());
    let _ = writeln!(output, "- Pending: {}", queue.pending_count());
    let _ = writeln!(output, "- Completed evaluations ranked: {}", rows.len());
    let _ = writeln!(output);
    let _ = writeln!(output, "## Ranking");

    if rows.is_empty() {
        let _ = writeln!(output, "No completed evaluations for this period.");
    } else {
        for row in rows.iter() {
            let _ = writeln!(
                output,
                "{}. {} (DNI {}, {}) score {:.2}{}",
                row.position,
                row.entry.display_name,
                row.entry.dni,
                row.entry.teaching_level,
                row.total_score,
                row.classification
                    .map(|tag| format!(" [{}]", tag.as_str()))
                    .unwrap_or_default()
            );
        }
    }

    output
}

pub fn write_listing_csv<W: std::io::Write>(writer: W, rows: &[MeritRow]) -> anyhow::Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    for row in rows {
        csv_writer.serialize(ListingCsvRow {
            position: row.position,
            dni: &row.entry.dni,
            display_name: &row.entry.display_name,
            level: row.entry.teaching_level.as_str(),
            total_score: format!("{:.2}", row.total_score),
            classification: row
                .classification
                .map(|tag| tag.as_str())
                .unwrap_or(""),
        })?;
    }

    csv_writer.flush()?;
    Ok(())
}
