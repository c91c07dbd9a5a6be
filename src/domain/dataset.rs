// HXL-tagged tabular dataset model
use std::fmt;
use thiserror::Error;

/// HXL only looks for the hashtag row near the top of a sheet.
const HASHTAG_ROW_SEARCH_LIMIT: usize = 25;

#[derive(Debug, Error, PartialEq)]
pub enum DatasetError {
    #[error("dataset is empty")]
    Empty,
    #[error("no HXL hashtag row in the first {0} rows")]
    NoHashtagRow(usize),
}

/// One column of the schema: a hashtag with attributes, and the
/// human-readable header above it when there is one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub tag: Option<String>,
    pub attributes: Vec<String>,
    pub header: Option<String>,
}

impl Column {
    /// Parse a hashtag spec such as `#adm1 +code`.
    pub fn parse(spec: &str, header: Option<&str>) -> Self {
        let header = header
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(str::to_string);
        let compact: String = spec
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();

        let mut parts = compact.split('+');
        let tag = parts
            .next()
            .filter(|t| t.len() > 1 && t.starts_with('#'))
            .map(|t| t.trim_start_matches('#').to_string());
        let attributes = if tag.is_some() {
            parts.filter(|a| !a.is_empty()).map(str::to_string).collect()
        } else {
            Vec::new()
        };

        Self {
            tag,
            attributes,
            header,
        }
    }

    /// The normalized hashtag, e.g. `#adm1+code`.
    pub fn display_tag(&self) -> Option<String> {
        self.tag.as_ref().map(|tag| {
            let mut display = format!("#{}", tag);
            for attribute in &self.attributes {
                display.push('+');
                display.push_str(attribute);
            }
            display
        })
    }
}

/// A hashtag pattern: `#tag+required-excluded`, with `#*` matching any tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagPattern {
    tag: String,
    include: Vec<String>,
    exclude: Vec<String>,
}

impl TagPattern {
    pub fn parse(pattern: &str) -> Self {
        let compact: String = pattern
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();
        let body = compact.trim_start_matches('#');

        let mut tag = String::new();
        let mut include = Vec::new();
        let mut exclude = Vec::new();
        let mut current = String::new();
        let mut sign: Option<char> = None;

        for c in body.chars().chain(std::iter::once('+')) {
            if c == '+' || c == '-' {
                match sign {
                    None => tag = std::mem::take(&mut current),
                    Some('+') if !current.is_empty() => include.push(std::mem::take(&mut current)),
                    Some(_) if !current.is_empty() => exclude.push(std::mem::take(&mut current)),
                    Some(_) => {}
                }
                sign = Some(c);
            } else {
                current.push(c);
            }
        }

        Self {
            tag,
            include,
            exclude,
        }
    }

    pub fn matches(&self, column: &Column) -> bool {
        let Some(tag) = &column.tag else {
            return false;
        };
        if self.tag.is_empty() || (self.tag != "*" && &self.tag != tag) {
            return false;
        }
        self.include.iter().all(|a| column.attributes.contains(a))
            && !self.exclude.iter().any(|a| column.attributes.contains(a))
    }
}

impl fmt::Display for TagPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.tag)?;
        for a in &self.include {
            write!(f, "+{}", a)?;
        }
        for a in &self.exclude {
            write!(f, "-{}", a)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    columns: Vec<Column>,
    rows: Vec<Vec<String>>,
}

impl Dataset {
    pub fn new(columns: Vec<Column>, rows: Vec<Vec<String>>) -> Self {
        Self { columns, rows }
    }

    /// Build a dataset from raw sheet rows: an optional header row, the
    /// hashtag row, then data.
    pub fn from_sheet(mut sheet: Vec<Vec<String>>) -> Result<Self, DatasetError> {
        if sheet.is_empty() {
            return Err(DatasetError::Empty);
        }

        let hashtag_index = sheet
            .iter()
            .take(HASHTAG_ROW_SEARCH_LIMIT)
            .position(|row| is_hashtag_row(row))
            .ok_or(DatasetError::NoHashtagRow(HASHTAG_ROW_SEARCH_LIMIT))?;

        let rows = sheet.split_off(hashtag_index + 1);
        let hashtags = sheet.pop().unwrap_or_default();
        let headers = sheet.pop();

        let columns = hashtags
            .iter()
            .enumerate()
            .map(|(i, spec)| {
                let header = headers.as_ref().and_then(|h| h.get(i)).map(String::as_str);
                Column::parse(spec, header)
            })
            .collect();

        Ok(Self::new(columns, rows))
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, pattern: &TagPattern) -> bool {
        self.columns.iter().any(|c| pattern.matches(c))
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(|values| Row {
            columns: &self.columns,
            values,
        })
    }
}

fn is_hashtag_row(row: &[String]) -> bool {
    let mut cells = row.iter().map(|c| c.trim()).filter(|c| !c.is_empty()).peekable();
    cells.peek().is_some() && cells.all(|c| c.starts_with('#'))
}

/// A borrowed view of one data row.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    columns: &'a [Column],
    values: &'a [String],
}

impl<'a> Row<'a> {
    /// Value of the first column matching `pattern`, if non-blank.
    pub fn get(&self, pattern: &TagPattern) -> Option<&'a str> {
        let index = self.columns.iter().position(|c| pattern.matches(c))?;
        self.values
            .get(index)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn cells(self) -> impl Iterator<Item = (&'a Column, &'a str)> + 'a {
        let values = self.values;
        self.columns
            .iter()
            .enumerate()
            .map(move |(i, column)| (column, values.get(i).map(String::as_str).unwrap_or("")))
    }
}
