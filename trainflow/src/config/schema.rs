//! Dataset schema loaded from YAML.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::errors::ConfigError;

/// Declared type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    /// Integer values.
    Int,
    /// Floating point values.
    Float,
    /// Free-form labels.
    Category,
}

impl ColumnType {
    /// True for `int` and `float`.
    #[must_use]
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Int | Self::Float)
    }
}

/// One column of the dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Column name as it appears in the source records.
    pub name: String,
    /// Declared type.
    pub dtype: ColumnType,
    /// Whether the column must be present in every partition.
    #[serde(default = "default_required")]
    pub required: bool,
}

const fn default_required() -> bool {
    true
}

/// Expected shape of the ingested dataset and how its columns are encoded.
///
/// ```yaml
/// columns:
///   - { name: Gender, dtype: category }
///   - { name: Age, dtype: int }
/// target_column: Response
/// categorical_columns: [Gender]
/// numerical_columns: [Age]
/// standard_scale_columns: [Age]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetSchema {
    /// Every column of the ingested partitions, in order.
    pub columns: Vec<ColumnSpec>,
    /// Label column.
    pub target_column: String,
    /// Columns removed before encoding.
    #[serde(default)]
    pub drop_columns: Vec<String>,
    /// Columns that must hold numbers.
    #[serde(default)]
    pub numerical_columns: Vec<String>,
    /// Columns that are one-hot encoded.
    #[serde(default)]
    pub categorical_columns: Vec<String>,
    /// Numerical columns standardised to zero mean and unit variance.
    #[serde(default)]
    pub standard_scale_columns: Vec<String>,
    /// Numerical columns rescaled to `[0, 1]`.
    #[serde(default)]
    pub minmax_scale_columns: Vec<String>,
}

impl DatasetSchema {
    /// Reads and parses a schema file.
    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&text).map_err(|source| ConfigError::Schema {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parses a schema from a YAML string.
    pub fn from_yaml_str(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    /// Column names in declaration order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Names of the required columns.
    pub fn required_columns(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .filter(|c| c.required)
            .map(|c| c.name.as_str())
    }

    /// Looks up a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Returns true if `name` is removed before encoding.
    #[must_use]
    pub fn is_dropped(&self, name: &str) -> bool {
        self.drop_columns.iter().any(|c| c == name)
    }

    /// Problems with the schema definition itself.
    ///
    /// An empty result means the schema is usable. Any entry is a hard
    /// violation: the validation stage fails instead of producing a report.
    #[must_use]
    pub fn check(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.columns.is_empty() {
            problems.push("schema declares no columns".to_string());
        }

        let mut seen = HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.name.as_str()) {
                problems.push(format!("column '{}' is declared twice", column.name));
            }
        }

        match self.column(&self.target_column) {
            None => problems.push(format!(
                "target column '{}' is not a declared column",
                self.target_column
            )),
            Some(spec) if spec.dtype == ColumnType::Float => problems.push(format!(
                "target column '{}' must be int or category",
                self.target_column
            )),
            Some(_) => {}
        }

        let groups: [(&str, &[String]); 5] = [
            ("drop_columns", &self.drop_columns),
            ("numerical_columns", &self.numerical_columns),
            ("categorical_columns", &self.categorical_columns),
            ("standard_scale_columns", &self.standard_scale_columns),
            ("minmax_scale_columns", &self.minmax_scale_columns),
        ];
        for (group, names) in groups {
            for name in names {
                if !seen.contains(name.as_str()) {
                    problems.push(format!("{group} entry '{name}' is not a declared column"));
                }
                if *name == self.target_column {
                    problems.push(format!("{group} must not contain the target column"));
                }
            }
        }

        for name in &self.numerical_columns {
            if self.categorical_columns.contains(name) {
                problems.push(format!("'{name}' is both numerical and categorical"));
            }
            if let Some(spec) = self.column(name) {
                if !spec.dtype.is_numeric() {
                    problems.push(format!("numerical column '{name}' is declared as category"));
                }
            }
        }

        for name in self
            .standard_scale_columns
            .iter()
            .chain(&self.minmax_scale_columns)
        {
            if !self.numerical_columns.contains(name) {
                problems.push(format!("scaled column '{name}' is not numerical"));
            }
        }
        for name in &self.standard_scale_columns {
            if self.minmax_scale_columns.contains(name) {
                problems.push(format!("'{name}' cannot be both standard and min-max scaled"));
            }
        }

        problems
    }
}
