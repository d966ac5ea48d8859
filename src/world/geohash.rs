use serde::Serialize;

use crate::world::direction::Direction;

/// Finest precision the grid math supports. Coordinates stay well inside i64.
pub const MAX_PRECISION: usize = 12;

/// Character layout of an even-level (8 columns x 4 rows) subdivision.
/// Indexed as `EVEN_GRID[row][col]`; row 0 is the northern edge.
const EVEN_GRID: [[u8; 8]; 4] = [
    *b"bcfguvyz",
    *b"89destwx",
    *b"2367kmqr",
    *b"0145hjnp",
];

/// Character layout of an odd-level (4 columns x 8 rows) subdivision.
const ODD_GRID: [[u8; 4]; 8] = [
    *b"prxz",
    *b"nqwy",
    *b"jmtv",
    *b"hksu",
    *b"57eg",
    *b"46df",
    *b"139c",
    *b"028b",
];

/// Errors from converting between geohashes and grid coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeohashError {
    InvalidCharacter { ch: char, index: usize },
    Precision(usize),
    OutOfBounds { col: i64, row: i64, precision: usize },
}

impl std::fmt::Display for GeohashError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeohashError::InvalidCharacter { ch, index } => {
                write!(f, "invalid geohash character '{}' at index {}", ch, index)
            }
            GeohashError::Precision(p) => {
                write!(f, "geohash precision must be 1-{}, got {}", MAX_PRECISION, p)
            }
            GeohashError::OutOfBounds { col, row, precision } => write!(
                f,
                "cell (col {}, row {}) is outside the precision {} grid",
                col, row, precision
            ),
        }
    }
}

impl std::error::Error for GeohashError {}

/// A geohash expressed as integer coordinates on the grid of its precision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct GridCell {
    pub precision: usize,
    pub row: i64,
    pub col: i64,
    pub geohash: String,
}

impl GridCell {
    pub fn from_geohash(geohash: &str) -> Result<Self, GeohashError> {
        let (col, row) = geohash_to_col_row(geohash)?;
        Ok(GridCell {
            precision: geohash.len(),
            row,
            col,
            geohash: geohash.to_string(),
        })
    }
}

/// Number of (rows, cols) in the whole-world grid at `precision`.
pub fn grid_size(precision: usize) -> (i64, i64) {
    let mut rows = 1_i64;
    let mut cols = 1_i64;
    for level in 0..precision {
        if level % 2 == 0 {
            rows *= 4;
            cols *= 8;
        } else {
            rows *= 8;
            cols *= 4;
        }
    }
    (rows, cols)
}

fn check_precision(precision: usize) -> Result<(), GeohashError> {
    if (1..=MAX_PRECISION).contains(&precision) {
        Ok(())
    } else {
        Err(GeohashError::Precision(precision))
    }
}

fn even_offset(ch: u8) -> Option<(i64, i64)> {
    EVEN_GRID.iter().enumerate().find_map(|(row, line)| {
        line.iter()
            .position(|&c| c == ch)
            .map(|col| (col as i64, row as i64))
    })
}

fn odd_offset(ch: u8) -> Option<(i64, i64)> {
    ODD_GRID.iter().enumerate().find_map(|(row, line)| {
        line.iter()
            .position(|&c| c == ch)
            .map(|col| (col as i64, row as i64))
    })
}

/// Convert a geohash to its `(col, row)` on the grid of the same precision.
///
/// Each character refines the parent cell: even string positions split it
/// 8 columns by 4 rows, odd positions 4 columns by 8 rows.
pub fn geohash_to_col_row(geohash: &str) -> Result<(i64, i64), GeohashError> {
    check_precision(geohash.len())?;

    let mut col = 0_i64;
    let mut row = 0_i64;
    for (index, ch) in geohash.chars().enumerate() {
        let invalid = GeohashError::InvalidCharacter { ch, index };
        if !ch.is_ascii() {
            return Err(invalid);
        }
        if index % 2 == 0 {
            let (c, r) = even_offset(ch as u8).ok_or(invalid)?;
            col = col * 8 + c;
            row = row * 4 + r;
        } else {
            let (c, r) = odd_offset(ch as u8).ok_or(invalid)?;
            col = col * 4 + c;
            row = row * 8 + r;
        }
    }
    Ok((col, row))
}

/// Inverse of [`geohash_to_col_row`].
pub fn col_row_to_geohash(col: i64, row: i64, precision: usize) -> Result<String, GeohashError> {
    check_precision(precision)?;
    let (rows, cols) = grid_size(precision);
    if !(0..cols).contains(&col) || !(0..rows).contains(&row) {
        return Err(GeohashError::OutOfBounds { col, row, precision });
    }

    let mut chars = Vec::with_capacity(precision);
    let (mut col, mut row) = (col, row);
    for index in (0..precision).rev() {
        let ch = if index % 2 == 0 {
            let ch = EVEN_GRID[(row % 4) as usize][(col % 8) as usize];
            col /= 8;
            row /= 4;
            ch
        } else {
            let ch = ODD_GRID[(row % 8) as usize][(col % 4) as usize];
            col /= 4;
            row /= 8;
            ch
        };
        chars.push(ch as char);
    }
    Ok(chars.into_iter().rev().collect())
}

/// The cell one step in `direction` at the same precision.
///
/// Columns wrap around the antimeridian; stepping past a pole returns `None`.
/// Vertical directions return the geohash unchanged.
pub fn neighbour(geohash: &str, direction: Direction) -> Result<Option<String>, GeohashError> {
    let precision = geohash.len();
    let (col, row) = geohash_to_col_row(geohash)?;
    let (rows, cols) = grid_size(precision);
    let (dr, dc) = direction.vector();

    let row = row + dr;
    if !(0..rows).contains(&row) {
        return Ok(None);
    }
    let col = (col + dc).rem_euclid(cols);
    col_row_to_geohash(col, row, precision).map(Some)
}

/// The geohash itself followed by each distinct planar neighbour.
pub fn geohashes_nearby(geohash: &str) -> Result<Vec<String>, GeohashError> {
    let mut nearby = vec![geohash.to_string()];
    for direction in Direction::PLANAR {
        if let Some(n) = neighbour(geohash, direction)? {
            if !nearby.contains(&n) {
                nearby.push(n);
            }
        }
    }
    Ok(nearby)
}
