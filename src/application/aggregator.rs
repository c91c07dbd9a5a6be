// Aggregator - Per-area statistics from dataset rows
use crate::domain::admin_level::AdminLevel;
use crate::domain::dataset::{Row, TagPattern};
use serde::Serialize;
use std::collections::HashMap;

/// Statistic for one administrative unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedRow {
    pub code: Option<String>,
    pub name: Option<String>,
    pub value: f64,
}

/// The columns that identify an administrative unit.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupKeys {
    pub name: TagPattern,
    pub code: TagPattern,
}

impl GroupKeys {
    pub fn for_level(level: AdminLevel) -> Self {
        Self {
            name: TagPattern::parse(&format!("{}+name", level.tag())),
            code: TagPattern::parse(&format!("{}+code", level.tag())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    pub rows: Vec<AggregatedRow>,
    pub min: f64,
    pub max: f64,
}

impl Aggregation {
    /// Position of `value` between min and max; 0 when the range is empty.
    pub fn normalize(&self, value: f64) -> f64 {
        if self.max > self.min {
            (value - self.min) / (self.max - self.min)
        } else {
            0.0
        }
    }

    /// Rows keyed by upper-cased code. Rows without a code are left out.
    pub fn index_by_code(&self) -> HashMap<String, AggregatedRow> {
        let mut index = HashMap::with_capacity(self.rows.len());
        for row in &self.rows {
            match &row.code {
                Some(code) => {
                    index.insert(code.to_uppercase(), row.clone());
                }
                None => tracing::info!("No p-code for aggregated row {:?}", row.name),
            }
        }
        index
    }
}

/// Group rows by (name, code) and count them, or sum `value` when given.
pub fn aggregate<'a, I>(rows: I, keys: &GroupKeys, value: Option<&TagPattern>) -> Aggregation
where
    I: IntoIterator<Item = Row<'a>>,
{
    let mut groups: Vec<AggregatedRow> = Vec::new();
    let mut positions: HashMap<(Option<String>, Option<String>), usize> = HashMap::new();

    for row in rows {
        let name = row.get(&keys.name).map(str::to_string);
        let code = row.get(&keys.code).map(str::to_string);
        if name.is_none() && code.is_none() {
            tracing::debug!("Skipping row without an admin name or code");
            continue;
        }

        let amount = match value {
            Some(column) => numeric_value(row.get(column), column),
            None => 1.0,
        };

        let key = (name, code);
        match positions.get(&key) {
            Some(&i) => groups[i].value += amount,
            None => {
                positions.insert(key.clone(), groups.len());
                groups.push(AggregatedRow {
                    name: key.0,
                    code: key.1,
                    value: amount,
                });
            }
        }
    }

    let (min, max) = groups
        .iter()
        .map(|g| g.value)
        .fold(None, |range: Option<(f64, f64)>, v| match range {
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            None => Some((v, v)),
        })
        .unwrap_or((0.0, 0.0));

    Aggregation {
        rows: groups,
        min,
        max,
    }
}

fn numeric_value(raw: Option<&str>, column: &TagPattern) -> f64 {
    let Some(raw) = raw else {
        return 0.0;
    };
    match parse_number(raw) {
        Some(n) => n,
        None => {
            tracing::warn!("Non-numeric {} value '{}', counting as 0", column, raw);
            0.0
        }
    }
}

/// Parse a number, tolerating thousands separators ("1,234").
pub fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    trimmed
        .parse::<f64>()
        .ok()
        .or_else(|| trimmed.replace([',', ' '], "").parse::<f64>().ok())
        .filter(|n| n.is_finite())
}
