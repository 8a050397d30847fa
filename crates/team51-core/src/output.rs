//! Tabular output in the formats commands accept via `--format`.

use serde_json::{Map, Value};

use crate::{Error, Result};

/// Output format for reporting commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Space-aligned columns for a terminal.
    #[default]
    Table,
    /// GitHub-flavoured markdown table.
    Markdown,
    Json,
    Xml,
}

impl std::str::FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "md" | "markdown" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            "xml" => Ok(Self::Xml),
            other => Err(Error::InvalidInput(format!(
                "unknown format '{}', expected md, json, xml or table",
                other
            ))),
        }
    }
}

/// Rows of string cells under a fixed set of headers.
#[derive(Debug, Clone, Default)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row. Short rows are padded and long rows truncated to the
    /// header count.
    pub fn push_row<I, S>(&mut self, cells: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut row: Vec<String> = cells.into_iter().map(Into::into).collect();
        row.resize(self.headers.len(), String::new());
        self.rows.push(row);
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows as JSON objects keyed by header.
    pub fn to_json(&self) -> Value {
        Value::Array(
            self.rows
                .iter()
                .map(|row| {
                    let object: Map<String, Value> = self
                        .headers
                        .iter()
                        .zip(row)
                        .map(|(h, c)| (h.clone(), Value::String(c.clone())))
                        .collect();
                    Value::Object(object)
                })
                .collect(),
        )
    }

    pub fn render(&self, format: OutputFormat) -> String {
        match format {
            OutputFormat::Table => self.render_plain(),
            OutputFormat::Markdown => self.render_markdown(),
            OutputFormat::Json => {
                serde_json::to_string_pretty(&self.to_json()).unwrap_or_else(|_| "[]".to_string())
            }
            OutputFormat::Xml => self.render_xml(),
        }
    }

    fn column_widths(&self) -> Vec<usize> {
        self.headers
            .iter()
            .enumerate()
            .map(|(i, h)| {
                self.rows
                    .iter()
                    .map(|r| r[i].chars().count())
                    .chain(std::iter::once(h.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect()
    }

    fn render_plain(&self) -> String {
        let widths = self.column_widths();
        let line = |cells: &[String]| {
            cells
                .iter()
                .zip(&widths)
                .map(|(c, w)| format!("{:<width$}", c, width = *w))
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string()
        };

        let mut out = vec![line(&self.headers)];
        out.extend(self.rows.iter().map(|r| line(r)));
        out.join("\n")
    }

    fn render_markdown(&self) -> String {
        let escape = |s: &str| s.replace('|', "\\|").replace('\n', " ");
        let line = |cells: &[String]| {
            format!(
                "| {} |",
                cells.iter().map(|c| escape(c)).collect::<Vec<_>>().join(" | ")
            )
        };

        let mut out = vec![
            line(&self.headers),
            format!("|{}|", vec!["---"; self.headers.len()].join("|")),
        ];
        out.extend(self.rows.iter().map(|r| line(r)));
        out.join("\n")
    }

    fn render_xml(&self) -> String {
        let tags: Vec<String> = self.headers.iter().map(|h| xml_tag(h)).collect();
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<rows>\n");
        for row in &self.rows {
            out.push_str("  <row>\n");
            for (tag, cell) in tags.iter().zip(row) {
                out.push_str(&format!("    <{tag}>{}</{tag}>\n", xml_escape(cell)));
            }
            out.push_str("  </row>\n");
        }
        out.push_str("</rows>");
        out
    }
}

/// Normalise a header into a lower_snake XML element name.
fn xml_tag(header: &str) -> String {
    let mut tag: String = header
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    if tag.is_empty() || !tag.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
        tag.insert(0, '_');
    }
    tag
}

fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
