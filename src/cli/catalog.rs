//! Dataset catalog for the warming-dl CLI
//!
//! One dataset per line:
//!
//! ```text
//! title,headerRowsToSkip,valueColumn,labelColumn,colorHex,url[,primary]
//! ```
//!
//! A url of the form `follow:<page-url>|<host>|<pattern>` names an HTML page
//! to scrape: the first match of `pattern` in the page, prefixed with `host`,
//! is the CSV to download. The pattern may contain commas; a trailing
//! `,primary` after it is still read as the flag.

use std::fmt;
use std::path::Path;

use regex::Regex;

const BUILTIN_CATALOG: &str = "\
# title,headerRowsToSkip,valueColumn,labelColumn,colorHex,url[,primary]
Average temperature anomaly (°C),3,2,0,#FF0000,https://data.giss.nasa.gov/gistemp/graphs/graph_data/Global_Mean_Estimates_based_on_Land_and_Ocean_Data/graph.csv,primary
CO2 concentration (ppm),56,1,0,#333333,https://gml.noaa.gov/webdata/ccgg/trends/co2/co2_annmean_gl.csv
Arctic ice area (million km2),1,5,0,#0000FF,follow:https://climate.nasa.gov/vital-signs/arctic-sea-ice/|https://climate.nasa.gov|/system/internal_resources/details/original/.*\\.csv
";

/// Errors raised while reading a catalog
#[derive(Debug)]
pub enum CatalogError {
    /// The catalog file could not be read
    Io(std::io::Error),

    /// A line could not be parsed (1-based line number)
    Line { line: usize, message: String },
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogError::Io(err) => write!(f, "cannot read catalog: {}", err),
            CatalogError::Line { line, message } => {
                write!(f, "catalog line {}: {}", line, message)
            }
        }
    }
}

impl std::error::Error for CatalogError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CatalogError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CatalogError {
    fn from(err: std::io::Error) -> Self {
        CatalogError::Io(err)
    }
}

/// HTML page holding a link to the real dataset
#[derive(Debug, Clone)]
pub struct FollowUp {
    pub page_url: String,
    pub host: String,
    pub pattern: Regex,
}

impl FollowUp {
    /// Absolute URL of the first link in `page` matching the pattern
    pub fn extract(&self, page: &str) -> Option<String> {
        self.pattern
            .find(page)
            .map(|found| format!("{}{}", self.host, found.as_str()))
    }
}

/// Where a dataset's data comes from
#[derive(Debug, Clone)]
pub enum DatasetSource {
    /// CSV downloaded directly
    Direct(String),
    /// CSV linked from a page, fetched by a second queue
    FollowUp(FollowUp),
}

/// One catalog entry with its display metadata
#[derive(Debug, Clone)]
pub struct Dataset {
    pub title: String,
    pub header_rows: usize,
    pub value_column: usize,
    pub label_column: usize,
    pub color: String,
    pub source: DatasetSource,
    pub primary: bool,
}

impl Dataset {
    /// URL the main queue should fetch for this dataset
    pub fn fetch_url(&self) -> &str {
        match &self.source {
            DatasetSource::Direct(url) => url,
            DatasetSource::FollowUp(follow) => &follow.page_url,
        }
    }
}

/// Ordered list of datasets; the position of each entry is its queue index
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    datasets: Vec<Dataset>,
}

impl Catalog {
    /// The datasets shipped with warming-dl
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::parse(BUILTIN_CATALOG)
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, CatalogError> {
        let mut datasets = Vec::new();
        for (number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let dataset = parse_line(line).map_err(|message| CatalogError::Line {
                line: number + 1,
                message,
            })?;
            datasets.push(dataset);
        }
        Ok(Self { datasets })
    }

    pub fn get(&self, index: usize) -> Option<&Dataset> {
        self.datasets.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Dataset> {
        self.datasets.iter()
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }
}

fn parse_line(line: &str) -> Result<Dataset, String> {
    let fields: Vec<&str> = line.splitn(6, ',').map(str::trim).collect();
    if fields.len() < 6 {
        return Err(format!("expected 6 or 7 fields, found {}", fields.len()));
    }

    let title = fields[0];
    if title.is_empty() {
        return Err("title is empty".to_string());
    }

    let (url, flag) = split_url_and_flag(fields[5])?;
    let primary = match flag {
        None => false,
        Some("primary") => true,
        Some(other) => return Err(format!("unknown flag '{other}', expected 'primary'")),
    };

    Ok(Dataset {
        title: title.to_string(),
        header_rows: parse_number(fields[1], "headerRowsToSkip")?,
        value_column: parse_number(fields[2], "valueColumn")?,
        label_column: parse_number(fields[3], "labelColumn")?,
        color: parse_color(fields[4])?,
        source: parse_source(url)?,
        primary,
    })
}

/// Split the trailing `url[,primary]`; a follow-up pattern may contain commas
fn split_url_and_flag(rest: &str) -> Result<(&str, Option<&str>), String> {
    if rest.starts_with("follow:") {
        return Ok(match rest.rsplit_once(',') {
            Some((url, flag)) if flag.trim() == "primary" => (url.trim_end(), Some("primary")),
            _ => (rest, None),
        });
    }

    let parts: Vec<&str> = rest.split(',').map(str::trim).collect();
    match parts.as_slice() {
        [url] => Ok((*url, None)),
        [url, flag] => Ok((*url, Some(*flag))),
        _ => Err(format!("expected 6 or 7 fields, found {}", parts.len() + 5)),
    }
}

fn parse_number(field: &str, name: &str) -> Result<usize, String> {
    field
        .parse()
        .map_err(|_| format!("{name} must be a non-negative integer, got '{field}'"))
}

fn parse_color(field: &str) -> Result<String, String> {
    let hex = field
        .strip_prefix('#')
        .ok_or_else(|| format!("color must start with '#', got '{field}'"))?;
    if !(hex.len() == 6 || hex.len() == 8) || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("color must be #RRGGBB or #AARRGGBB, got '{field}'"));
    }
    Ok(field.to_uppercase())
}

fn parse_source(field: &str) -> Result<DatasetSource, String> {
    let Some(spec) = field.strip_prefix("follow:") else {
        if field.is_empty() {
            return Err("url is empty".to_string());
        }
        return Ok(DatasetSource::Direct(field.to_string()));
    };

    let parts: Vec<&str> = spec.split('|').collect();
    let [page_url, host, pattern] = parts.as_slice() else {
        return Err(format!("follow-up must be 'follow:<page>|<host>|<pattern>', got '{field}'"));
    };
    if page_url.is_empty() {
        return Err("follow-up page url is empty".to_string());
    }
    let pattern = Regex::new(pattern).map_err(|e| format!("invalid follow-up pattern: {e}"))?;

    Ok(DatasetSource::FollowUp(FollowUp {
        page_url: page_url.to_string(),
        host: host.to_string(),
        pattern,
    }))
}
