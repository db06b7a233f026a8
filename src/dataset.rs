use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

/// Text tokens that load as a missing value, matching what common dataframe
/// readers treat as NA.
const NULL_MARKERS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// A single scalar in a [`Dataset`] column
///
/// Serializes untagged so a web client receives plain JSON scalars
/// (`null`, `true`, `42`, `1.5`, `"text"`).
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Missing cell
    Null,
    /// Boolean cell
    Bool(bool),
    /// Integral number
    Int(i64),
    /// Floating point number
    Float(f64),
    /// Anything else, kept verbatim
    Text(String),
}

impl Value {
    /// Infers a typed value from a raw text field
    ///
    /// Null markers become [`Value::Null`], integers become [`Value::Int`],
    /// other numbers [`Value::Float`], `True`/`False` spellings [`Value::Bool`],
    /// and everything else stays text.
    ///
    /// # Examples
    /// ```
    /// use analyst::dataset::Value;
    ///
    /// assert_eq!(Value::infer("10"), Value::Int(10));
    /// assert_eq!(Value::infer("2.5"), Value::Float(2.5));
    /// assert_eq!(Value::infer("NA"), Value::Null);
    /// assert_eq!(Value::infer("North"), Value::Text("North".to_string()));
    /// ```
    pub fn infer(raw: &str) -> Self {
        if NULL_MARKERS.contains(&raw) {
            return Value::Null;
        }

        let trimmed = raw.trim();
        if let Ok(i) = trimmed.parse::<i64>() {
            return Value::Int(i);
        }
        if let Ok(f) = trimmed.parse::<f64>() {
            return Value::Float(f);
        }

        match trimmed {
            "True" | "TRUE" | "true" => Value::Bool(true),
            "False" | "FALSE" | "false" => Value::Bool(false),
            _ => Value::Text(raw.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view of the value, if it has one
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) if f.is_finite() => Some(*f),
            _ => None,
        }
    }

    fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NaN"),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Int(i) => write!(f, "{}", i),
            // Debug keeps the decimal point on whole floats (10.0, not 10)
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

/// A named column of values
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<Value>,
}

/// In-memory tabular data loaded from one uploaded file
///
/// Columns keep the order of the source file and every column holds the
/// same number of values. Column names are unique; [`Dataset::from_records`]
/// enforces that when the dataset is built.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Dataset {
    pub columns: Vec<Column>,
}

impl Dataset {
    /// Builds a dataset from a header row and data rows
    ///
    /// Blank header names become `Unnamed: {index}` and repeated names get a
    /// `.1`, `.2`, ... suffix so the result always has unique column names.
    /// Short rows are padded with [`Value::Null`]; cells beyond the header
    /// width are ignored (the loader rejects such rows before calling this).
    ///
    /// Numeric columns are unified afterwards: a column whose non-null values
    /// are all numbers is stored entirely as floats when it contains any float
    /// or any missing value.
    ///
    /// # Arguments
    /// * `headers` - Raw header names in file order
    /// * `records` - Data rows in file order
    ///
    /// # Returns
    /// * `Dataset` - The assembled, column-oriented dataset
    pub fn from_records(headers: Vec<String>, records: Vec<Vec<Value>>) -> Self {
        let names = unique_names(headers);
        let mut columns: Vec<Column> = names
            .into_iter()
            .map(|name| Column {
                name,
                values: Vec::with_capacity(records.len()),
            })
            .collect();

        for record in records {
            let mut cells = record.into_iter();
            for column in columns.iter_mut() {
                column.values.push(cells.next().unwrap_or(Value::Null));
            }
        }

        for column in columns.iter_mut() {
            unify_numeric(column);
        }

        Dataset { columns }
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, |c| c.values.len())
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// True when the dataset has no columns or no rows
    pub fn is_empty(&self) -> bool {
        self.column_count() == 0 || self.row_count() == 0
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Looks up a column by exact name
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Cells of one row, in column order
    pub fn row(&self, index: usize) -> Vec<&Value> {
        self.columns.iter().map(|c| &c.values[index]).collect()
    }

    /// A copy holding at most the first `n` rows
    pub fn head(&self, n: usize) -> Dataset {
        Dataset {
            columns: self
                .columns
                .iter()
                .map(|c| Column {
                    name: c.name.clone(),
                    values: c.values.iter().take(n).cloned().collect(),
                })
                .collect(),
        }
    }

    /// Renders the whole dataset as a fixed-width text table without an index
    ///
    /// See [`format_table`] for the layout.
    pub fn to_text(&self) -> String {
        let headers: Vec<String> = self.columns.iter().map(|c| c.name.clone()).collect();
        let rows: Vec<Vec<String>> = (0..self.row_count())
            .map(|r| self.row(r).iter().map(|v| v.to_string()).collect())
            .collect();
        format_table(&headers, &rows)
    }
}

/// Lays out a header and rows as right-aligned, fixed-width text
///
/// Each column is as wide as its longest cell (header included) and columns
/// are separated by two spaces. Lines are joined with `\n` and there is no
/// trailing newline.
///
/// # Examples
/// ```
/// use analyst::dataset::format_table;
///
/// let headers = vec!["Category".to_string(), "Profit".to_string()];
/// let rows = vec![vec!["A".to_string(), "10".to_string()]];
/// assert_eq!(format_table(&headers, &rows), "Category  Profit\n       A      10");
/// ```
pub fn format_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(widths.len()) {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let render_line = |cells: &[String]| -> String {
        cells
            .iter()
            .zip(widths.iter())
            .map(|(cell, width)| format!("{:>width$}", cell, width = *width))
            .collect::<Vec<_>>()
            .join("  ")
    };

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(render_line(headers));
    for row in rows {
        lines.push(render_line(row));
    }
    lines.join("\n")
}

fn unique_names(headers: Vec<String>) -> Vec<String> {
    let mut used: HashSet<String> = HashSet::new();
    let mut names = Vec::with_capacity(headers.len());

    for (index, header) in headers.into_iter().enumerate() {
        let base = if header.is_empty() {
            format!("Unnamed: {}", index)
        } else {
            header
        };

        let mut candidate = base.clone();
        let mut suffix = 0;
        while used.contains(&candidate) {
            suffix += 1;
            candidate = format!("{}.{}", base, suffix);
        }

        used.insert(candidate.clone());
        names.push(candidate);
    }

    names
}

fn unify_numeric(column: &mut Column) {
    let mut saw_number = false;
    let mut saw_float = false;
    let mut saw_null = false;

    for value in &column.values {
        match value {
            Value::Null => saw_null = true,
            Value::Float(_) => {
                saw_number = true;
                saw_float = true;
            }
            Value::Int(_) => saw_number = true,
            _ => return,
        }
    }

    if !saw_number || !(saw_float || saw_null) {
        return;
    }

    for value in column.values.iter_mut() {
        if let Value::Int(i) = value {
            *value = Value::Float(*i as f64);
        }
    }
    debug_assert!(column.values.iter().all(|v| v.is_null() || v.is_numeric()));
}
