//! [`DataBlock`] groups equal-length arrays into rows

use std::fmt::Display;

use snafu::{Snafu, ensure};
use tabled::Table;
use tabled::builder::Builder;
use tabled::settings::Style;

use crate::array::ArrayImpl;

#[allow(missing_docs)]
#[derive(Debug, Snafu)]
#[snafu(display("Arrays in the block should have length `{expect}`, found lengths `{lengths:?}`"))]
pub struct InconsistentLengthError {
    expect: usize,
    lengths: Vec<usize>,
}

type Result<T> = std::result::Result<T, InconsistentLengthError>;

/// Columns of the same rows. Row `i` consists of the `i`th element of each array
#[derive(Debug)]
pub struct DataBlock {
    arrays: Vec<ArrayImpl>,
    rows: usize,
}

impl DataBlock {
    /// Create a new [`DataBlock`]. All of the arrays should have same length, a block
    /// without arrays has no rows
    pub fn try_new(arrays: Vec<ArrayImpl>) -> Result<Self> {
        let rows = arrays.first().map_or(0, |array| array.len());
        ensure!(
            arrays.iter().all(|array| array.len() == rows),
            InconsistentLengthSnafu {
                expect: rows,
                lengths: arrays.iter().map(|array| array.len()).collect::<Vec<_>>()
            }
        );
        Ok(Self { arrays, rows })
    }

    /// Number of rows
    #[inline]
    pub fn len(&self) -> usize {
        self.rows
    }

    /// Returns true if the block has no rows
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Number of arrays
    #[inline]
    pub fn num_arrays(&self) -> usize {
        self.arrays.len()
    }

    /// Arrays of the block
    #[inline]
    pub fn arrays(&self) -> &[ArrayImpl] {
        &self.arrays
    }

    /// The arrays as the `columns` argument of the aggregate functions
    #[inline]
    pub fn array_refs(&self) -> Vec<&ArrayImpl> {
        self.arrays.iter().collect()
    }

    /// Render the block as a table for human. The header row contains the given names
    /// followed by the logical types of the arrays, `NULL` is rendered as `NULL`
    pub fn pretty<N: Display>(&self, names: impl IntoIterator<Item = N>) -> Table {
        let mut builder = Builder::default();
        builder.push_record(
            names
                .into_iter()
                .zip(&self.arrays)
                .map(|(name, array)| format!("{name}\n{}", array.logical_type())),
        );
        self.push_rows(&mut builder);
        let mut table = builder.build();
        table.with(Style::modern());
        table
    }

    fn push_rows(&self, builder: &mut Builder) {
        for row in 0..self.rows {
            builder.push_record(self.arrays.iter().map(|array| {
                array
                    .get(row)
                    .map_or_else(|| "NULL".to_string(), |element| element.to_string())
            }));
        }
    }
}

/// Same as [`DataBlock::pretty`] with the index of the arrays as names
impl Display for DataBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.pretty(0..self.arrays.len()))
    }
}

#[cfg(test)]
mod tests {
    use expect_test::expect;

    use super::*;
    use crate::array::{Int32Array, ListArray, StringArray};
    use crate::element::ElementImplRef;
    use crate::types::LogicalType;

    #[test]
    fn test_pretty() {
        let mut counts = ListArray::new(LogicalType::list_of(LogicalType::UnsignedBigInt)).unwrap();
        for count in [3, 0] {
            counts
                .elements_mut()
                .push(Some(ElementImplRef::UInt64(count)))
                .unwrap();
        }
        counts.push_offset();
        counts.push_offset();

        let block = DataBlock::try_new(vec![
            ArrayImpl::from(StringArray::from_iter([Some("cpu"), None])),
            ArrayImpl::from(counts),
        ])
        .unwrap();
        expect![[r#"
            ┌────────┬─────────────────────────┐
            │ host   │ counts                  │
            │ String │ Array(Nullable(UInt64)) │
            ├────────┼─────────────────────────┤
            │ cpu    │ [3, 0]                  │
            ├────────┼─────────────────────────┤
            │ NULL   │ []                      │
            └────────┴─────────────────────────┘"#]]
        .assert_eq(&block.pretty(["host", "counts"]).to_string());
    }

    #[test]
    fn test_display() {
        let block =
            DataBlock::try_new(vec![ArrayImpl::from(Int32Array::from_iter([Some(-1)]))]).unwrap();
        expect![[r#"
            ┌───────┐
            │ 0     │
            │ Int32 │
            ├───────┤
            │ -1    │
            └───────┘"#]]
        .assert_eq(&block.to_string());
    }

    #[test]
    fn test_inconsistent_length() {
        let err = DataBlock::try_new(vec![
            ArrayImpl::from(Int32Array::from_iter([Some(10)])),
            ArrayImpl::from(Int32Array::from_iter([Some(10), None])),
        ])
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Arrays in the block should have length `1`, found lengths `[1, 2]`"
        );

        let empty = DataBlock::try_new(Vec::new()).unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty.num_arrays(), 0);
    }
}
