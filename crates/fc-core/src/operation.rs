//! Operation node configurations.
//!
//! Each operation slug has its own statically typed config. Configs are
//! validated against the columns produced upstream before anything is sent
//! to the backend, so invalid forms never reach the graph.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

// ─── Operation types ─────────────────────────────────────────────────────

/// The enumerated set of operation slugs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationType {
    RenameColumns,
    Flatten,
    FlattenJson,
    CastDataTypes,
    CoalesceColumns,
    Arithmetic,
    ConcatColumns,
    DropColumns,
    RegexExtraction,
}

impl OperationType {
    pub const ALL: [OperationType; 9] = [
        OperationType::RenameColumns,
        OperationType::Flatten,
        OperationType::FlattenJson,
        OperationType::CastDataTypes,
        OperationType::CoalesceColumns,
        OperationType::Arithmetic,
        OperationType::ConcatColumns,
        OperationType::DropColumns,
        OperationType::RegexExtraction,
    ];

    pub fn slug(&self) -> &'static str {
        match self {
            OperationType::RenameColumns => "rename-columns",
            OperationType::Flatten => "flatten",
            OperationType::FlattenJson => "flatten-json",
            OperationType::CastDataTypes => "cast-data-types",
            OperationType::CoalesceColumns => "coalesce-columns",
            OperationType::Arithmetic => "arithmetic",
            OperationType::ConcatColumns => "concat-columns",
            OperationType::DropColumns => "drop-columns",
            OperationType::RegexExtraction => "regex-extraction",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            OperationType::RenameColumns => "Rename",
            OperationType::Flatten => "Flatten",
            OperationType::FlattenJson => "Flatten JSON",
            OperationType::CastDataTypes => "Cast",
            OperationType::CoalesceColumns => "Coalesce",
            OperationType::Arithmetic => "Arithmetic",
            OperationType::ConcatColumns => "Concat",
            OperationType::DropColumns => "Drop columns",
            OperationType::RegexExtraction => "Regex extraction",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for OperationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OperationType::ALL
            .into_iter()
            .find(|op| op.slug() == s)
            .ok_or_else(|| format!("unknown operation type '{s}'"))
    }
}

// ─── Config payloads ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArithmeticOperator {
    Add,
    Sub,
    Mul,
    Div,
}

/// One side of an arithmetic expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Operand {
    Column { name: String },
    Value { value: f64 },
}

/// One piece of a concatenation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ConcatPart {
    Column { name: String },
    Constant { value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnCast {
    pub name: String,
    pub data_type: String,
}

/// Statically typed configuration, keyed by operation slug.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op_type", content = "config", rename_all = "kebab-case")]
pub enum OperationConfig {
    /// old name → new name
    RenameColumns { columns: BTreeMap<String, String> },
    Flatten {
        source_column: String,
        #[serde(default)]
        output_prefix: Option<String>,
    },
    FlattenJson {
        /// Schema the JSON column's source table lives in.
        source_schema: String,
        json_column: String,
        #[serde(default)]
        json_columns_to_copy: Vec<String>,
    },
    CastDataTypes { columns: Vec<ColumnCast> },
    CoalesceColumns {
        columns: Vec<String>,
        #[serde(default)]
        default_value: Option<String>,
        output_column_name: String,
    },
    Arithmetic {
        operator: ArithmeticOperator,
        operands: Vec<Operand>,
        output_column_name: String,
    },
    ConcatColumns {
        columns: Vec<ConcatPart>,
        output_column_name: String,
    },
    DropColumns { columns: Vec<String> },
    /// column → pattern
    RegexExtraction { columns: BTreeMap<String, String> },
}

/// A validation failure for a single form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Collects field errors while walking a config.
struct Checker<'a> {
    inputs: HashSet<&'a str>,
    errors: Vec<FieldError>,
}

impl<'a> Checker<'a> {
    fn new(input_columns: &'a [String]) -> Self {
        Self {
            inputs: input_columns.iter().map(String::as_str).collect(),
            errors: Vec::new(),
        }
    }

    fn fail(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    fn non_empty(&mut self, field: &str, value: &str) -> bool {
        if value.trim().is_empty() {
            self.fail(field, "is required");
            return false;
        }
        true
    }

    fn column(&mut self, field: &str, name: &str) {
        if self.non_empty(field, name) && !self.inputs.contains(name) {
            self.fail(field, format!("column '{name}' is not produced upstream"));
        }
    }

    fn output_name(&mut self, field: &str, name: &str) {
        if self.non_empty(field, name) && self.inputs.contains(name) {
            self.fail(field, format!("column '{name}' already exists"));
        }
    }

    fn finish(self) -> Result<(), Vec<FieldError>> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

impl OperationConfig {
    pub fn op_type(&self) -> OperationType {
        match self {
            OperationConfig::RenameColumns { .. } => OperationType::RenameColumns,
            OperationConfig::Flatten { .. } => OperationType::Flatten,
            OperationConfig::FlattenJson { .. } => OperationType::FlattenJson,
            OperationConfig::CastDataTypes { .. } => OperationType::CastDataTypes,
            OperationConfig::CoalesceColumns { .. } => OperationType::CoalesceColumns,
            OperationConfig::Arithmetic { .. } => OperationType::Arithmetic,
            OperationConfig::ConcatColumns { .. } => OperationType::ConcatColumns,
            OperationConfig::DropColumns { .. } => OperationType::DropColumns,
            OperationConfig::RegexExtraction { .. } => OperationType::RegexExtraction,
        }
    }

    /// An unfilled config of the given type, used to stage a node whose
    /// form has not been submitted yet.
    pub fn blank(op_type: OperationType) -> Self {
        match op_type {
            OperationType::RenameColumns => OperationConfig::RenameColumns {
                columns: BTreeMap::new(),
            },
            OperationType::Flatten => OperationConfig::Flatten {
                source_column: String::new(),
                output_prefix: None,
            },
            OperationType::FlattenJson => OperationConfig::FlattenJson {
                source_schema: String::new(),
                json_column: String::new(),
                json_columns_to_copy: Vec::new(),
            },
            OperationType::CastDataTypes => OperationConfig::CastDataTypes { columns: Vec::new() },
            OperationType::CoalesceColumns => OperationConfig::CoalesceColumns {
                columns: Vec::new(),
                default_value: None,
                output_column_name: String::new(),
            },
            OperationType::Arithmetic => OperationConfig::Arithmetic {
                operator: ArithmeticOperator::Add,
                operands: Vec::new(),
                output_column_name: String::new(),
            },
            OperationType::ConcatColumns => OperationConfig::ConcatColumns {
                columns: Vec::new(),
                output_column_name: String::new(),
            },
            OperationType::DropColumns => OperationConfig::DropColumns { columns: Vec::new() },
            OperationType::RegexExtraction => OperationConfig::RegexExtraction {
                columns: BTreeMap::new(),
            },
        }
    }

    /// Check the config against the columns its input produces.
    ///
    /// Returns every field error at once so forms can show them inline.
    pub fn validate(&self, input_columns: &[String]) -> Result<(), Vec<FieldError>> {
        let mut c = Checker::new(input_columns);

        match self {
            OperationConfig::RenameColumns { columns } => {
                if columns.is_empty() {
                    c.fail("columns", "select at least one column to rename");
                }
                let mut seen = HashSet::new();
                for (old, new) in columns {
                    let field = format!("columns.{old}");
                    c.column(&field, old);
                    if !c.non_empty(&field, new) {
                        continue;
                    }
                    if !seen.insert(new.as_str()) {
                        c.fail(&field, format!("'{new}' is used more than once"));
                    } else if new != old
                        && c.inputs.contains(new.as_str())
                        && !columns.contains_key(new)
                    {
                        c.fail(&field, format!("column '{new}' already exists"));
                    }
                }
            }
            OperationConfig::Flatten {
                source_column,
                output_prefix,
            } => {
                c.column("source_column", source_column);
                if let Some(prefix) = output_prefix
                    && prefix.contains(char::is_whitespace)
                {
                    c.fail("output_prefix", "must not contain whitespace");
                }
            }
            OperationConfig::FlattenJson {
                source_schema,
                json_column,
                json_columns_to_copy,
            } => {
                c.non_empty("source_schema", source_schema);
                c.column("json_column", json_column);
                for (i, name) in json_columns_to_copy.iter().enumerate() {
                    c.column(&format!("json_columns_to_copy[{i}]"), name);
                }
            }
            OperationConfig::CastDataTypes { columns } => {
                if columns.is_empty() {
                    c.fail("columns", "select at least one column to cast");
                }
                for (i, cast) in columns.iter().enumerate() {
                    c.column(&format!("columns[{i}].name"), &cast.name);
                    c.non_empty(&format!("columns[{i}].data_type"), &cast.data_type);
                }
            }
            OperationConfig::CoalesceColumns {
                columns,
                default_value: _,
                output_column_name,
            } => {
                if columns.len() < 2 {
                    c.fail("columns", "select at least two columns");
                }
                for (i, name) in columns.iter().enumerate() {
                    c.column(&format!("columns[{i}]"), name);
                }
                c.output_name("output_column_name", output_column_name);
            }
            OperationConfig::Arithmetic {
                operator,
                operands,
                output_column_name,
            } => {
                match operator {
                    ArithmeticOperator::Sub | ArithmeticOperator::Div if operands.len() != 2 => {
                        c.fail("operands", "exactly two operands are required");
                    }
                    ArithmeticOperator::Add | ArithmeticOperator::Mul if operands.len() < 2 => {
                        c.fail("operands", "at least two operands are required");
                    }
                    _ => {}
                }
                for (i, operand) in operands.iter().enumerate() {
                    match operand {
                        Operand::Column { name } => c.column(&format!("operands[{i}]"), name),
                        Operand::Value { value } if !value.is_finite() => {
                            c.fail(format!("operands[{i}]"), "must be a finite number");
                        }
                        Operand::Value { .. } => {}
                    }
                }
                c.output_name("output_column_name", output_column_name);
            }
            OperationConfig::ConcatColumns {
                columns,
                output_column_name,
            } => {
                if columns.len() < 2 {
                    c.fail("columns", "select at least two columns or constants");
                }
                for (i, part) in columns.iter().enumerate() {
                    if let ConcatPart::Column { name } = part {
                        c.column(&format!("columns[{i}]"), name);
                    }
                }
                c.output_name("output_column_name", output_column_name);
            }
            OperationConfig::DropColumns { columns } => {
                if columns.is_empty() {
                    c.fail("columns", "select at least one column to drop");
                }
                for (i, name) in columns.iter().enumerate() {
                    c.column(&format!("columns[{i}]"), name);
                }
                let dropped: HashSet<&str> = columns.iter().map(String::as_str).collect();
                if !c.inputs.is_empty() && c.inputs.iter().all(|col| dropped.contains(col)) {
                    c.fail("columns", "cannot drop every column");
                }
            }
            OperationConfig::RegexExtraction { columns } => {
                if columns.is_empty() {
                    c.fail("columns", "select at least one column");
                }
                for (column, pattern) in columns {
                    let field = format!("columns.{column}");
                    c.column(&field, column);
                    if c.non_empty(&field, pattern)
                        && let Err(e) = regex::Regex::new(pattern)
                    {
                        c.fail(&field, format!("invalid pattern: {e}"));
                    }
                }
            }
        }

        c.finish()
    }
}
