use crate::world::entity::{Entity, Location};
use crate::world::geohash::{GeohashError, GridCell};

/// Test whether `(r2, c2)` is within `range` of `(r1, c1)`.
///
/// With `diagonal`, the test uses Chebyshev distance but the reported distance
/// is Manhattan (`|dr| + |dc|`). The two disagree off the axes; callers that
/// need the Chebyshev value compute it themselves. Without `diagonal`, both
/// the test and the reported value use squared Euclidean distance.
/// A negative `range` is unlimited.
pub fn in_range(r1: i64, c1: i64, r2: i64, c2: i64, range: i64, diagonal: bool) -> (bool, i64) {
    if diagonal {
        let dr = (r1 - r2).abs();
        let dc = (c1 - c2).abs();
        let chebyshev = dr.max(dc);
        (range < 0 || chebyshev <= range, dr + dc)
    } else {
        let dr = r1 - r2;
        let dc = c1 - c2;
        let squared = dr * dr + dc * dc;
        (range < 0 || squared <= range * range, squared)
    }
}

/// Chebyshev distance between two cells.
pub fn chebyshev(a: &GridCell, b: &GridCell) -> i64 {
    (a.row - b.row).abs().max((a.col - b.col).abs())
}

/// Range test between two entities, using diagonal (Chebyshev) adjacency.
///
/// A carried target is only reachable by the entity carrying it, at distance 0.
/// A source that is not on the map can never reach a target on the map.
pub fn entity_in_range(
    source: &Entity,
    target: &Entity,
    range: i64,
) -> Result<(bool, i64), GeohashError> {
    entity_in_range_with(source, target, range, true)
}

pub fn entity_in_range_with(
    source: &Entity,
    target: &Entity,
    range: i64,
    diagonal: bool,
) -> Result<(bool, i64), GeohashError> {
    let target_geohash = match target.location() {
        Location::Carried { container } => return Ok((container == source.id(), 0)),
        Location::Geohash(g) => g,
    };
    let source_geohash = match source.location() {
        Location::Geohash(g) => g,
        Location::Carried { .. } => return Ok((false, 0)),
    };

    let source_cell = GridCell::from_geohash(source_geohash)?;
    let target_cell = GridCell::from_geohash(target_geohash)?;
    Ok(in_range(
        source_cell.row,
        source_cell.col,
        target_cell.row,
        target_cell.col,
        range,
        diagonal,
    ))
}
