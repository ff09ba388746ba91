use console::{style, Term};

use streams_core::{Listing, RowOutcome};

/// Prints a listing as an aligned terminal table.
pub fn print_table(listing: &Listing) {
    let term = Term::stdout();

    if listing.streams.is_empty() {
        term.write_line(&format!("{}", style("No streams").dim())).ok();
        return;
    }

    let id_width = column_width("STREAM", listing.streams.iter().map(|r| r.id.as_str().len()));
    let mime_width = column_width(
        "MIME",
        listing
            .streams
            .iter()
            .map(|r| r.mime.as_deref().map_or(0, str::len)),
    );
    let length_width = column_width(
        "LENGTH",
        listing
            .streams
            .iter()
            .map(|r| r.length.map_or(0, |l| l.to_string().len())),
    );

    term.write_line(&format!(
        "{}",
        style(format!(
            "{:<id_width$}  {:<mime_width$}  {:>length_width$}  LINK",
            "STREAM", "MIME", "LENGTH"
        ))
        .bold()
    ))
    .ok();

    for row in &listing.streams {
        let mime = row.mime.as_deref().unwrap_or("-");
        let length = row.length.map(|l| l.to_string()).unwrap_or_else(|| "-".into());
        let link = match &row.outcome {
            RowOutcome::Resolved(resolution) if resolution.via.is_empty() => {
                style(resolution.url.clone()).green().to_string()
            }
            RowOutcome::Resolved(resolution) => format!(
                "{} {}",
                style(&resolution.url).green(),
                style(format!("(via {})", resolution.target)).dim()
            ),
            RowOutcome::Failed { reason } => style(reason).red().to_string(),
        };
        term.write_line(&format!(
            "{:<id_width$}  {:<mime_width$}  {:>length_width$}  {}",
            row.id.as_str(),
            mime,
            length,
            link
        ))
        .ok();
    }

    let failed = listing.failed_count();
    let summary = format!(
        "{} streams, {} failed, generated {}",
        listing.streams.len(),
        failed,
        listing.generated_at.format("%H:%M:%S")
    );
    term.write_line("").ok();
    if failed > 0 {
        term.write_line(&format!("{}", style(summary).yellow())).ok();
    } else {
        term.write_line(&format!("{}", style(summary).dim())).ok();
    }
}

fn column_width(header: &str, widths: impl Iterator<Item = usize>) -> usize {
    widths.fold(header.len(), usize::max)
}
