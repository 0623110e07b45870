use crate::errors::ConfigError;
use std::fmt;
use std::str::FromStr;

/// Columns written before the per-source prices, in order.
pub const FIXED_COLUMNS: &[&str] = &["timestamp", "tokenIn", "tokenOut"];

/// Bumped whenever the column layout changes.
pub const SCHEMA_VERSION: u32 = 1;

/// An A1 range of the form `<Sheet>!<StartCol><StartRow>:<EndCol>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRange {
    pub sheet: String,
    pub start_column: String,
    pub start_row: u32,
    pub end_column: String,
}

impl SheetRange {
    /// Number of columns the range spans.
    pub fn width(&self) -> u32 {
        column_index(&self.end_column).saturating_sub(column_index(&self.start_column)) + 1
    }
}

impl FromStr for SheetRange {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (sheet, cells) = value
            .rsplit_once('!')
            .ok_or_else(|| format!("{value}: expected <Sheet>!<Col><Row>:<Col>"))?;
        // quoted names escape an embedded quote by doubling it
        let sheet = match sheet.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
            Some(quoted) => quoted.replace("''", "'"),
            None => sheet.to_string(),
        };
        if sheet.is_empty() {
            return Err(format!("{value}: missing sheet name"));
        }

        let (start, end_column) = cells
            .split_once(':')
            .ok_or_else(|| format!("{value}: missing ':<EndCol>'"))?;

        let split = start
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(|| format!("{value}: missing start row"))?;
        let (start_column, start_row) = start.split_at(split);

        if !is_column(start_column) || !is_column(end_column) {
            return Err(format!("{value}: columns must be letters A-Z"));
        }
        let start_row: u32 = start_row
            .parse()
            .map_err(|_| format!("{value}: invalid start row {start_row}"))?;
        if start_row == 0 {
            return Err(format!("{value}: rows start at 1"));
        }
        if column_index(end_column) < column_index(start_column) {
            return Err(format!("{value}: end column precedes start column"));
        }

        Ok(Self {
            sheet,
            start_column: start_column.to_string(),
            start_row,
            end_column: end_column.to_string(),
        })
    }
}

impl fmt::Display for SheetRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.sheet.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            write!(f, "{}", self.sheet)?;
        } else {
            write!(f, "'{}'", self.sheet.replace('\'', "''"))?;
        }
        write!(f, "!{}{}:{}", self.start_column, self.start_row, self.end_column)
    }
}

fn is_column(value: &str) -> bool {
    !value.is_empty() && value.len() <= 3 && value.chars().all(|c| c.is_ascii_uppercase())
}

/// 1-based index of a column label: A=1, Z=26, AA=27.
fn column_index(column: &str) -> u32 {
    column
        .chars()
        .fold(0, |acc, c| acc * 26 + (c as u32 - 'A' as u32 + 1))
}

/// Positional layout of a ledger row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSchema {
    pub version: u32,
    /// Price columns, one per router, in this order after the fixed columns.
    pub sources: Vec<String>,
}

impl ColumnSchema {
    pub fn new(sources: Vec<String>) -> Self {
        Self {
            version: SCHEMA_VERSION,
            sources,
        }
    }

    pub fn width(&self) -> u32 {
        (FIXED_COLUMNS.len() + self.sources.len()) as u32
    }

    pub fn header(&self) -> Vec<String> {
        FIXED_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .chain(self.sources.iter().cloned())
            .collect()
    }
}

/// Where records are appended. Set up once at startup, read-only after.
#[derive(Debug, Clone)]
pub struct LedgerTarget {
    pub spreadsheet_id: String,
    pub range: SheetRange,
    pub schema: ColumnSchema,
}

impl LedgerTarget {
    pub fn new(
        spreadsheet_id: impl Into<String>,
        range: SheetRange,
        schema: ColumnSchema,
    ) -> Result<Self, ConfigError> {
        let spreadsheet_id = spreadsheet_id.into();
        if spreadsheet_id.trim().is_empty() {
            return Err(ConfigError::MissingSetting("SPREADSHEET_ID".to_string()));
        }
        if range.width() != schema.width() {
            return Err(ConfigError::InvalidValue {
                key: "SHEET_RANGE".to_string(),
                reason: format!(
                    "{} spans {} columns but the row has {} ({})",
                    range,
                    range.width(),
                    schema.width(),
                    schema.header().join(", ")
                ),
            });
        }
        Ok(Self {
            spreadsheet_id,
            range,
            schema,
        })
    }
}
