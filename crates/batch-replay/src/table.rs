//! Stored Feature Tables

use crate::BatchError;
use ndarray::{s, Array1, Array2, Axis};
use ndarray_npy::{read_npy, ReadNpyError};
use payload_codec::FeatureVector;
use std::path::Path;
use tracing::debug;

/// Trailing per-row metadata columns in the stored test sets
pub const DEFAULT_METADATA_COLUMNS: usize = 2;

/// Row-major table of feature vectors with metadata columns removed
#[derive(Debug, Clone)]
pub struct FeatureTable {
    rows: Array2<f64>,
}

impl FeatureTable {
    /// Load a `.npy` array (f64 or f32, 1-D or 2-D) and drop the trailing
    /// `metadata_columns`
    pub fn load(path: impl AsRef<Path>, metadata_columns: usize) -> Result<Self, BatchError> {
        let path = path.as_ref();
        let array = read_matrix(path).map_err(|e| BatchError::Table {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        debug!("Read {:?} table from {}", array.dim(), path.display());
        Self::from_array(array, metadata_columns).map_err(|reason| BatchError::InvalidTable {
            path: path.display().to_string(),
            reason,
        })
    }

    /// Build from an in-memory array, dropping the trailing metadata columns
    pub fn from_array(array: Array2<f64>, metadata_columns: usize) -> Result<Self, String> {
        let width = array.ncols();
        if width <= metadata_columns {
            return Err(format!(
                "{} columns leave no features after dropping {} metadata columns",
                width, metadata_columns
            ));
        }

        let rows = array.slice(s![.., ..width - metadata_columns]).to_owned();
        Ok(Self { rows })
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.nrows()
    }

    /// Whether the table has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.nrows() == 0
    }

    /// Features per row
    pub fn width(&self) -> usize {
        self.rows.ncols()
    }

    /// Rows in stored order
    pub fn rows(&self) -> impl Iterator<Item = FeatureVector> + '_ {
        self.rows
            .outer_iter()
            .map(|row| FeatureVector::new(row.to_vec()))
    }
}

fn read_matrix(path: &Path) -> Result<Array2<f64>, ReadNpyError> {
    let first = match read_npy::<_, Array2<f64>>(path) {
        Ok(array) => return Ok(array),
        Err(e) => e,
    };

    if let Ok(array) = read_npy::<_, Array2<f32>>(path) {
        return Ok(array.mapv(f64::from));
    }
    if let Ok(array) = read_npy::<_, Array1<f64>>(path) {
        return Ok(array.insert_axis(Axis(0)));
    }
    if let Ok(array) = read_npy::<_, Array1<f32>>(path) {
        return Ok(array.mapv(f64::from).insert_axis(Axis(0)));
    }

    Err(first)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use ndarray_npy::write_npy;

    #[test]
    fn test_metadata_columns_dropped() {
        let table = FeatureTable::from_array(
            array![[0.1, 0.2, 0.3, 1.0, 5.0], [0.4, 0.5, 0.6, 2.0, 6.0]],
            DEFAULT_METADATA_COLUMNS,
        )
        .unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.width(), 3);
        let rows: Vec<FeatureVector> = table.rows().collect();
        assert_eq!(rows[1].values(), &[0.4, 0.5, 0.6]);
    }

    #[test]
    fn test_too_narrow_rejected() {
        assert!(FeatureTable::from_array(array![[1.0, 2.0]], 2).is_err());
        assert!(FeatureTable::from_array(array![[1.0, 2.0]], 0).is_ok());
    }

    #[test]
    fn test_load_f32_npy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.npy");
        write_npy(&path, &array![[1.0f32, 2.0, 9.0, 9.0], [3.0, 4.0, 9.0, 9.0]]).unwrap();

        let table = FeatureTable::load(&path, 2).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows().next().unwrap().values(), &[1.0, 2.0]);
    }

    #[test]
    fn test_load_missing_file() {
        let err = FeatureTable::load("/nonexistent/test.npy", 2).unwrap_err();
        assert!(matches!(err, BatchError::Table { .. }));
    }
}
