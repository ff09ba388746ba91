//! HTML rendering of stream listings.
//!
//! Rows are rendered into the element whose `id` is `streams`: either the
//! `<tbody>` of the generated page, or any element of a caller-provided
//! template. Templates are parsed as HTML documents and the first element
//! matching `#streams` gets its content replaced, so rendering the same
//! listing twice gives the same document.

use std::fmt::Write;

use scraper::node::Text;
use scraper::{Html, Node, Selector};
use thiserror::Error;

use crate::lister::{Listing, RowOutcome, StreamRow};

pub const STREAMS_ELEMENT_ID: &str = "streams";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("No element with id \"{0}\" in template")]
    MissingElement(String),
    #[error("Invalid selector: {0}")]
    Selector(String),
}

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

pub fn render_row(row: &StreamRow) -> String {
    let id = escape(row.id.as_str());
    let mime = escape(row.mime.as_deref().unwrap_or_default());
    match &row.outcome {
        RowOutcome::Resolved(resolution) => {
            let length = row.length.map(|l| l.to_string()).unwrap_or_default();
            format!(
                r#"<tr><td><a href="{}">{}</a></td><td>{}</td><td>{}</td></tr>"#,
                escape(&resolution.url),
                id,
                mime,
                length
            )
        }
        RowOutcome::Failed { reason } => format!(
            r#"<tr class="failed"><td>{}</td><td>{}</td><td class="error">{}</td></tr>"#,
            id,
            mime,
            escape(reason)
        ),
    }
}

pub fn render_rows(rows: &[StreamRow]) -> String {
    let mut out = String::new();
    for row in rows {
        // Writing to a String cannot fail.
        let _ = writeln!(out, "{}", render_row(row));
    }
    out
}

pub fn render_error_row(message: &str) -> String {
    format!(
        "<tr><td colspan=\"3\" class=\"error\">{}</td></tr>\n",
        escape(message)
    )
}

fn page(body_rows: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
    <head>
        <title>Streams</title>
        <meta charset="UTF-8" />
        <meta name="viewport" content="width=device-width, initial-scale=1">
        <style>body {{ font-family: monospace; }} .error {{ color: #b00020; }}</style>
    </head>
    <body>
        <table>
            <thead><tr><th>Stream</th><th>Mime</th><th>Length</th></tr></thead>
            <tbody id="{}">
{}</tbody>
        </table>
    </body>
</html>
"#,
        STREAMS_ELEMENT_ID, body_rows
    )
}

/// Standalone page holding the listing.
pub fn render_page(listing: &Listing) -> String {
    page(&render_rows(&listing.streams))
}

/// Standalone page whose table holds a single error row.
pub fn render_error_page(error: &dyn std::error::Error) -> String {
    page(&render_error_row(&error.to_string()))
}

/// Replaces the content of the `#streams` element of `template` with `rows`.
pub fn inject(template: &str, rows: &[StreamRow]) -> Result<String, RenderError> {
    inject_html(template, &render_rows(rows))
}

/// Replaces the content of the `#streams` element of `template` with an error row.
pub fn inject_error(template: &str, message: &str) -> Result<String, RenderError> {
    inject_html(template, &render_error_row(message))
}

fn inject_html(template: &str, inner: &str) -> Result<String, RenderError> {
    let selector = Selector::parse(&format!("#{}", STREAMS_ELEMENT_ID))
        .map_err(|e| RenderError::Selector(format!("{:?}", e)))?;

    let mut document = Html::parse_document(template);
    let target = document
        .select(&selector)
        .next()
        .map(|element| element.id())
        .ok_or_else(|| RenderError::MissingElement(STREAMS_ELEMENT_ID.to_string()))?;

    let children: Vec<_> = document
        .tree
        .get(target)
        .map(|node| node.children().map(|child| child.id()).collect())
        .unwrap_or_default();
    for child in children {
        if let Some(mut node) = document.tree.get_mut(child) {
            node.detach();
        }
    }

    // The rows are spliced in as markup after serialization, in place of a
    // text node that cannot occur in the serialized template.
    let placeholder = placeholder_for(template);
    if let Some(mut node) = document.tree.get_mut(target) {
        node.append(Node::Text(Text {
            text: placeholder.as_str().into(),
        }));
    }

    Ok(document
        .html()
        .replacen(&placeholder, &format!("\n{}", inner), 1))
}

fn placeholder_for(template: &str) -> String {
    let mut placeholder = String::from('\u{E000}');
    while template.contains(&placeholder) {
        placeholder.push('\u{E000}');
    }
    placeholder
}
