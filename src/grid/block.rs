use std::ops::RangeInclusive;

use super::{CellValue, Grid};

/// Copy the closed rectangle `rows` × `cols` out of `grid`, row by row.
///
/// `skip` lists column offsets relative to the first column of the block
/// (0 = first column) that are dropped from every row.
pub fn extract_block<G: Grid + ?Sized>(
    grid: &G,
    rows: RangeInclusive<u32>,
    cols: RangeInclusive<u32>,
    skip: &[usize],
) -> Vec<Vec<CellValue>> {
    rows.map(|row| {
        cols.clone()
            .enumerate()
            .filter(|(offset, _)| !skip.contains(offset))
            .map(|(_, col)| grid.value_at(row, col).clone())
            .collect()
    })
    .collect()
}
