//! Build-plate margin check.

use crate::raster::Raster;

/// True if any lit pixel lies within `margin` pixels of a raster edge.
///
/// The top and bottom `margin` rows are checked whole; rows between them
/// breach when a lit column is `< margin` or `>= width - margin`.
/// A zero margin disables the check.
pub fn check_margin(raster: &Raster, margin: u32) -> bool {
    if margin == 0 {
        return false;
    }
    let m = margin as usize;
    let rows = raster.rows();
    let height = rows.len();
    let band = m.min(height);

    if rows[..band].iter().chain(&rows[height - band..]).any(|r| !r.is_empty()) {
        return true;
    }
    // The two bands already cover every row
    if height <= 2 * m {
        return false;
    }

    let right = raster.width().saturating_sub(m);
    rows[m..height - m]
        .iter()
        .any(|row| row.next_set(0).is_some_and(|c| c < m) || row.next_set(right).is_some())
}
