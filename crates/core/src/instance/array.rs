use serde::{Deserialize, Serialize};

use crate::{ExprVizError, Result};

/// Element type of a host array as the caller supplied it. The device copy
/// is always 32-bit float.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarType {
    F32,
    F64,
}

impl ScalarType {
    pub fn host_size(self) -> usize {
        match self {
            ScalarType::F32 => 4,
            ScalarType::F64 => 8,
        }
    }
}

/// Row-major `rows x components` array of host values.
#[derive(Debug, Clone, PartialEq)]
pub struct HostArray {
    dtype: ScalarType,
    rows: usize,
    components: usize,
    values: Vec<f64>,
}

impl HostArray {
    pub fn from_f64(rows: usize, components: usize, values: Vec<f64>) -> Result<Self> {
        Self::new(ScalarType::F64, rows, components, values)
    }

    pub fn from_f32(rows: usize, components: usize, values: &[f32]) -> Result<Self> {
        let values = values.iter().map(|&v| f64::from(v)).collect();
        Self::new(ScalarType::F32, rows, components, values)
    }

    fn new(dtype: ScalarType, rows: usize, components: usize, values: Vec<f64>) -> Result<Self> {
        if components == 0 {
            return Err(ExprVizError::coercion("arrays need at least one component"));
        }
        let expected = rows.checked_mul(components).ok_or_else(|| {
            ExprVizError::coercion(format!("a {rows}x{components} array is too large"))
        })?;
        if expected != values.len() {
            return Err(ExprVizError::coercion(format!(
                "{} values do not fill a {rows}x{components} array",
                values.len()
            )));
        }
        Ok(Self {
            dtype,
            rows,
            components,
            values,
        })
    }

    /// Single-component array, one value per instance.
    pub fn column(values: Vec<f64>) -> Self {
        Self {
            dtype: ScalarType::F64,
            rows: values.len(),
            components: 1,
            values,
        }
    }

    pub fn from_rows<const N: usize>(rows: &[[f32; N]]) -> Result<Self> {
        let flat: Vec<f32> = rows.iter().flatten().copied().collect();
        Self::from_f32(rows.len(), N, &flat)
    }

    /// Rows of equal length, as produced by nested JSON arrays.
    pub fn from_rows_f64(rows: &[Vec<f64>]) -> Result<Self> {
        let components = rows.first().map(Vec::len).unwrap_or_default();
        if let Some(ragged) = rows.iter().position(|row| row.len() != components) {
            return Err(ExprVizError::coercion(format!(
                "row {ragged} has {} components, expected {components}",
                rows[ragged].len()
            )));
        }
        Self::from_f64(rows.len(), components, rows.concat())
    }

    /// `count` evenly spaced values from `start` to `end` inclusive.
    pub fn linspace(start: f64, end: f64, count: usize) -> Self {
        let step = if count > 1 {
            (end - start) / (count - 1) as f64
        } else {
            0.0
        };
        Self::column((0..count).map(|i| start + step * i as f64).collect())
    }

    pub fn dtype(&self) -> ScalarType {
        self.dtype
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn components(&self) -> usize {
        self.components
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn row_f32(&self, row: usize) -> Option<Vec<f32>> {
        let start = row.checked_mul(self.components)?;
        self.values
            .get(start..start.checked_add(self.components)?)
            .map(|row| row.iter().map(|&v| v as f32).collect())
    }

    /// Values narrowed to the 32-bit device representation.
    pub fn to_f32(&self) -> Vec<f32> {
        self.values.iter().map(|&v| v as f32).collect()
    }
}
