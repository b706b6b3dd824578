//! Machines table importer.
//!
//! The machines inventory lives on a wiki page as one or more `||`-delimited
//! tables. The first row of each table names the columns; cells may start
//! with markup tags such as `<rowbgcolor="#ffffcc">` that are dropped.

use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use labres_registry::PartialMachine;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, info};

static CELL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:<.*>)*(.*)$").expect("static regex is valid"));

/// Importer errors.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no machines table source configured")]
    MissingSource,
}

/// Where the machines table is read from.
#[derive(Debug, Clone)]
pub enum PageSource {
    Url { url: String, timeout: Duration },
    File(PathBuf),
}

impl PageSource {
    /// Fetch the raw page text.
    pub async fn load(&self) -> Result<String, ImportError> {
        match self {
            Self::Url { url, timeout } => fetch_page(url, *timeout).await,
            Self::File(path) => read_page(path).await,
        }
    }
}

/// Download a raw wiki page, giving up after `timeout`.
pub async fn fetch_page(url: &str, timeout: Duration) -> Result<String, ImportError> {
    // reqwest is built without a default crypto provider. `Err` only means
    // one is already installed.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let http = reqwest::Client::builder().timeout(timeout).build()?;
    let resp = http.get(url).send().await?;

    let status = resp.status();
    if !status.is_success() {
        return Err(ImportError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let body = resp.text().await?;
    info!(url = %url, bytes = body.len(), "Machines page fetched");
    Ok(body)
}

pub async fn read_page(path: &std::path::Path) -> Result<String, ImportError> {
    let body = tokio::fs::read_to_string(path).await?;
    info!(path = %path.display(), bytes = body.len(), "Machines page read");
    Ok(body)
}

/// Lazily parse every table in `text` into machine rows.
///
/// Header cells are cleaned like data cells before being lowercased, so a
/// header such as `<tablewidth="100%">Name` maps to the `name` column.
/// Other wiki formatting (`'''Name'''`) is kept and leaves the column
/// unrecognised.
pub fn parse_table(text: &str) -> TableRows<'_> {
    TableRows {
        lines: text.lines(),
        headers: None,
    }
}

/// Iterator over table rows, see [`parse_table`].
///
/// Scans for a line starting with `||` (the header), then yields one
/// [`PartialMachine`] per following `||` line. Any other line closes the
/// table and scanning resumes.
#[derive(Debug, Clone)]
pub struct TableRows<'a> {
    lines: std::str::Lines<'a>,
    headers: Option<Vec<String>>,
}

impl Iterator for TableRows<'_> {
    type Item = PartialMachine;

    fn next(&mut self) -> Option<Self::Item> {
        for line in self.lines.by_ref() {
            if !line.starts_with("||") {
                if self.headers.take().is_some() {
                    debug!("End of machines table");
                }
                continue;
            }

            match &self.headers {
                None => {
                    let headers: Vec<String> = cells(line)
                        .map(|h| h.unwrap_or_default().to_lowercase())
                        .collect();
                    debug!(?headers, "Machines table header");
                    self.headers = Some(headers);
                }
                Some(headers) => return Some(parse_row(headers, line)),
            }
        }
        None
    }
}

/// Cells between the first and last `||`, markup stripped, empty as `None`.
fn cells(line: &str) -> impl Iterator<Item = Option<String>> + '_ {
    let mut parts: Vec<&str> = line.split("||").collect();
    // Drop the text before the first and after the last separator.
    if parts.len() >= 2 {
        parts.pop();
        parts.remove(0);
    } else {
        parts.clear();
    }
    parts.into_iter().map(clean_cell)
}

fn clean_cell(raw: &str) -> Option<String> {
    let raw = raw.trim_start();
    let value = CELL_RE
        .captures(raw)
        .and_then(|c| c.get(1))
        .map_or(raw, |m| m.as_str())
        .trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn parse_row(headers: &[String], line: &str) -> PartialMachine {
    let mut row = PartialMachine::default();
    for (header, value) in headers.iter().zip(cells(line)) {
        match header.as_str() {
            "name" => row.name = value,
            "ip" => row.ip = value,
            "id" => row.id = value,
            "group" => row.group = value,
            _ => {}
        }
    }
    row
}
