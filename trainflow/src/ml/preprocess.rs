//! Feature encoding fitted on the training partition.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::config::{ColumnType, DatasetSchema};
use crate::data::{Cell, Table};
use crate::errors::FailureCause;

/// How one input column becomes feature values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnEncoder {
    /// One indicator per category, in sorted category order.
    OneHot {
        /// Source column.
        column: String,
        /// Categories seen during fitting.
        categories: Vec<String>,
    },
    /// `(x - mean) / scale`.
    Standard {
        /// Source column.
        column: String,
        /// Training mean.
        mean: f64,
        /// Training standard deviation (1 for constant columns).
        scale: f64,
    },
    /// `(x - min) / range`.
    MinMax {
        /// Source column.
        column: String,
        /// Training minimum.
        min: f64,
        /// Training range (1 for constant columns).
        range: f64,
    },
    /// The value itself.
    Passthrough {
        /// Source column.
        column: String,
    },
}

impl ColumnEncoder {
    /// Source column name.
    #[must_use]
    pub fn column(&self) -> &str {
        match self {
            Self::OneHot { column, .. }
            | Self::Standard { column, .. }
            | Self::MinMax { column, .. }
            | Self::Passthrough { column } => column,
        }
    }

    /// Number of features produced.
    #[must_use]
    pub fn width(&self) -> usize {
        match self {
            Self::OneHot { categories, .. } => categories.len(),
            _ => 1,
        }
    }

    fn encode(&self, cell: &Cell, row: usize, out: &mut Vec<f64>) -> Result<(), FailureCause> {
        match self {
            Self::OneHot { column, categories } => {
                let key = category_key(cell, column, row)?;
                let Ok(hit) = categories.binary_search(&key) else {
                    return Err(unencodable(column, row, format!("unseen category '{key}'")));
                };
                out.extend((0..categories.len()).map(|i| if i == hit { 1.0 } else { 0.0 }));
            }
            Self::Standard {
                column,
                mean,
                scale,
            } => out.push((number(cell, column, row)? - mean) / scale),
            Self::MinMax { column, min, range } => {
                out.push((number(cell, column, row)? - min) / range);
            }
            Self::Passthrough { column } => out.push(number(cell, column, row)?),
        }
        Ok(())
    }
}

/// How target values become class indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LabelEncoder {
    /// Index into the sorted integer labels seen during fitting.
    Integers {
        /// Known labels.
        values: Vec<i64>,
    },
    /// Index into the sorted labels seen during fitting.
    Classes {
        /// Known labels.
        classes: Vec<String>,
    },
}

/// An encoded partition as persisted by the transformation stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedPartition {
    /// One row per sample.
    pub features: Array2<f64>,
    /// Class index per sample.
    pub labels: Array1<usize>,
}

/// Fitted encoders for every feature column plus the label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preprocessor {
    target_column: String,
    encoders: Vec<ColumnEncoder>,
    labels: LabelEncoder,
}

fn unencodable(column: &str, row: usize, reason: impl Into<String>) -> FailureCause {
    FailureCause::Unencodable {
        column: column.to_string(),
        row,
        reason: reason.into(),
    }
}

fn number(cell: &Cell, column: &str, row: usize) -> Result<f64, FailureCause> {
    match cell {
        Cell::Number(n) if n.is_finite() => Ok(*n),
        Cell::Number(n) => Err(unencodable(column, row, format!("non-finite value {n}"))),
        Cell::Missing => Err(unencodable(column, row, "missing value")),
        Cell::Text(s) => Err(unencodable(column, row, format!("expected a number, got '{s}'"))),
    }
}

fn category_key(cell: &Cell, column: &str, row: usize) -> Result<String, FailureCause> {
    match cell {
        Cell::Missing => Err(unencodable(column, row, "missing value")),
        other => Ok(other.to_string()),
    }
}

fn integer_label(cell: &Cell, column: &str, row: usize) -> Result<i64, FailureCause> {
    // 2^63 is the first f64 past i64::MAX.
    const BOUND: f64 = 9_223_372_036_854_775_808.0;
    let value = number(cell, column, row)?;
    if value.fract() != 0.0 || value < -BOUND || value >= BOUND {
        return Err(unencodable(
            column,
            row,
            format!("label {value} is not a 64-bit integer"),
        ));
    }
    #[allow(clippy::cast_possible_truncation)]
    let label = value as i64;
    Ok(label)
}

fn column_index(table: &Table, column: &str) -> Result<usize, FailureCause> {
    table
        .column_index(column)
        .ok_or_else(|| FailureCause::Schema(format!("column '{column}' is missing from the input")))
}

fn numbers(table: &Table, index: usize, column: &str) -> Result<Vec<f64>, FailureCause> {
    table
        .rows()
        .iter()
        .enumerate()
        .map(|(row, cells)| number(&cells[index], column, row))
        .collect()
}

impl Preprocessor {
    /// Fits encoders on the training partition.
    ///
    /// Every column except the target and the schema's drop columns becomes
    /// a feature, in table order.
    pub fn fit(schema: &DatasetSchema, train: &Table) -> Result<Self, FailureCause> {
        if train.is_empty() {
            return Err(FailureCause::EmptyDataset {
                name: "train".to_string(),
                rows: 0,
                required: 1,
            });
        }

        let target = schema.target_column.clone();
        let target_index = column_index(train, &target)?;

        let mut encoders = Vec::new();
        for (index, column) in train.columns().iter().enumerate() {
            if *column == target || schema.is_dropped(column) {
                continue;
            }
            let column = column.clone();

            if schema.categorical_columns.contains(&column) {
                let categories = train
                    .rows()
                    .iter()
                    .enumerate()
                    .map(|(row, cells)| category_key(&cells[index], &column, row))
                    .collect::<Result<BTreeSet<_>, _>>()?;
                encoders.push(ColumnEncoder::OneHot {
                    column,
                    categories: categories.into_iter().collect(),
                });
                continue;
            }

            let values = numbers(train, index, &column)?;
            if schema.standard_scale_columns.contains(&column) {
                #[allow(clippy::cast_precision_loss)]
                let n = values.len() as f64;
                let mean = values.iter().sum::<f64>() / n;
                let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
                let std = variance.sqrt();
                let scale = if std > 0.0 && std.is_finite() { std } else { 1.0 };
                encoders.push(ColumnEncoder::Standard {
                    column,
                    mean,
                    scale,
                });
            } else if schema.minmax_scale_columns.contains(&column) {
                let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let range = if max > min { max - min } else { 1.0 };
                encoders.push(ColumnEncoder::MinMax { column, min, range });
            } else {
                encoders.push(ColumnEncoder::Passthrough { column });
            }
        }

        let labels = match schema.column(&target).map(|c| c.dtype) {
            Some(ColumnType::Category) => {
                let classes = train
                    .rows()
                    .iter()
                    .enumerate()
                    .map(|(row, cells)| category_key(&cells[target_index], &target, row))
                    .collect::<Result<BTreeSet<_>, _>>()?;
                LabelEncoder::Classes {
                    classes: classes.into_iter().collect(),
                }
            }
            _ => {
                let values = train
                    .rows()
                    .iter()
                    .enumerate()
                    .map(|(row, cells)| integer_label(&cells[target_index], &target, row))
                    .collect::<Result<BTreeSet<_>, _>>()?;
                LabelEncoder::Integers {
                    values: values.into_iter().collect(),
                }
            }
        };

        Ok(Self {
            target_column: target,
            encoders,
            labels,
        })
    }

    /// Encodes the feature columns of `table`.
    pub fn transform_features(&self, table: &Table) -> Result<Array2<f64>, FailureCause> {
        let indices = self
            .encoders
            .iter()
            .map(|e| column_index(table, e.column()))
            .collect::<Result<Vec<_>, _>>()?;

        let width = self.n_features();
        let mut data = Vec::with_capacity(table.len() * width);
        for (row, cells) in table.rows().iter().enumerate() {
            for (encoder, &index) in self.encoders.iter().zip(&indices) {
                encoder.encode(&cells[index], row, &mut data)?;
            }
        }

        Array2::from_shape_vec((table.len(), width), data)
            .map_err(|e| FailureCause::Schema(e.to_string()))
    }

    /// Encodes the target column of `table` as class indices.
    pub fn encode_labels(&self, table: &Table) -> Result<Array1<usize>, FailureCause> {
        let index = column_index(table, &self.target_column)?;
        let column = self.target_column.as_str();

        table
            .rows()
            .iter()
            .enumerate()
            .map(|(row, cells)| match &self.labels {
                LabelEncoder::Integers { values } => {
                    let value = integer_label(&cells[index], column, row)?;
                    values
                        .binary_search(&value)
                        .map_err(|_| unencodable(column, row, format!("unseen label {value}")))
                }
                LabelEncoder::Classes { classes } => {
                    let key = category_key(&cells[index], column, row)?;
                    classes
                        .binary_search(&key)
                        .map_err(|_| unencodable(column, row, format!("unseen label '{key}'")))
                }
            })
            .collect()
    }

    /// Encodes features and labels.
    pub fn transform(&self, table: &Table) -> Result<(Array2<f64>, Array1<usize>), FailureCause> {
        Ok((self.transform_features(table)?, self.encode_labels(table)?))
    }

    /// Total number of features produced.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.encoders.iter().map(ColumnEncoder::width).sum()
    }

    /// Feature names, `column=category` for one-hot indicators.
    #[must_use]
    pub fn feature_names(&self) -> Vec<String> {
        self.encoders
            .iter()
            .flat_map(|e| match e {
                ColumnEncoder::OneHot { column, categories } => categories
                    .iter()
                    .map(|c| format!("{column}={c}"))
                    .collect::<Vec<_>>(),
                other => vec![other.column().to_string()],
            })
            .collect()
    }

    /// The fitted encoders, in feature order.
    #[must_use]
    pub fn encoders(&self) -> &[ColumnEncoder] {
        &self.encoders
    }

    /// Label column.
    #[must_use]
    pub fn target_column(&self) -> &str {
        &self.target_column
    }
}
