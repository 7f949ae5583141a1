//! Column metadata and table descriptors

use crate::dtype::DType;
use crate::error::{Error, Result};

/// Semantic type of a feature (column)
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FeatureType {
    /// Unordered categories
    Nominal,
    /// Ordered categories
    Ordinal,
    /// Numeric, differences meaningful, no true zero
    Interval,
    /// Numeric with a true zero
    Ratio,
}

impl FeatureType {
    /// Default semantic type for a column of `dtype`
    ///
    /// Floating point columns are ratio features; integer columns ordinal.
    pub const fn default_for(dtype: DType) -> Self {
        if dtype.is_float() {
            Self::Ratio
        } else {
            Self::Ordinal
        }
    }
}

/// Element order of a dense table
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DataLayout {
    /// Rows are contiguous
    #[default]
    RowMajor,
    /// Columns are contiguous
    ColumnMajor,
}

/// Which variant a table is
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TableKind {
    /// Table without data in any domain
    Empty,
    /// Dense, single dtype
    Homogen,
    /// Compressed sparse rows
    Csr,
}

/// Per-column data type and feature type
///
/// Two metadata values are equal when they describe the same number of
/// features with the same dtype and feature type in every column.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TableMetadata {
    dtypes: Vec<DType>,
    feature_types: Vec<FeatureType>,
}

impl TableMetadata {
    /// Create metadata from per-column descriptions
    pub fn new(dtypes: Vec<DType>, feature_types: Vec<FeatureType>) -> Result<Self> {
        if dtypes.len() != feature_types.len() {
            return Err(Error::invalid_argument(
                "feature_types",
                format!(
                    "{} feature types for {} data types",
                    feature_types.len(),
                    dtypes.len()
                ),
            ));
        }
        Ok(Self {
            dtypes,
            feature_types,
        })
    }

    /// Metadata for `column_count` columns of one dtype
    pub fn homogeneous(dtype: DType, column_count: usize) -> Self {
        Self {
            dtypes: vec![dtype; column_count],
            feature_types: vec![FeatureType::default_for(dtype); column_count],
        }
    }

    /// Number of features (columns)
    #[inline]
    pub fn feature_count(&self) -> usize {
        self.dtypes.len()
    }

    /// Data type of column `index`
    pub fn data_type(&self, index: usize) -> Result<DType> {
        self.dtypes
            .get(index)
            .copied()
            .ok_or_else(|| self.out_of_range(index))
    }

    /// Feature type of column `index`
    pub fn feature_type(&self, index: usize) -> Result<FeatureType> {
        self.feature_types
            .get(index)
            .copied()
            .ok_or_else(|| self.out_of_range(index))
    }

    /// All column data types
    #[inline]
    pub fn dtypes(&self) -> &[DType] {
        &self.dtypes
    }

    /// All column feature types
    #[inline]
    pub fn feature_types(&self) -> &[FeatureType] {
        &self.feature_types
    }

    fn out_of_range(&self, index: usize) -> Error {
        Error::invalid_argument(
            "index",
            format!("column {index} of {}", self.dtypes.len()),
        )
    }
}
