use serde::{Deserialize, Serialize};

/// A single movement step. `U` and `D` address a vertical axis the planar
/// grid does not model; their vector is zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    N,
    S,
    E,
    W,
    Ne,
    Nw,
    Se,
    Sw,
    U,
    D,
}

impl Direction {
    pub const ALL: [Direction; 10] = [
        Direction::N,
        Direction::S,
        Direction::E,
        Direction::W,
        Direction::Ne,
        Direction::Nw,
        Direction::Se,
        Direction::Sw,
        Direction::U,
        Direction::D,
    ];

    pub const PLANAR: [Direction; 8] = [
        Direction::N,
        Direction::S,
        Direction::E,
        Direction::W,
        Direction::Ne,
        Direction::Nw,
        Direction::Se,
        Direction::Sw,
    ];

    /// Unit `(delta_row, delta_col)`; north is decreasing row.
    pub fn vector(self) -> (i64, i64) {
        match self {
            Direction::N => (-1, 0),
            Direction::S => (1, 0),
            Direction::E => (0, 1),
            Direction::W => (0, -1),
            Direction::Ne => (-1, 1),
            Direction::Nw => (-1, -1),
            Direction::Se => (1, 1),
            Direction::Sw => (1, -1),
            Direction::U | Direction::D => (0, 0),
        }
    }

    /// The planar direction whose vector is `(dr, dc)`, if any.
    pub fn from_vector(dr: i64, dc: i64) -> Option<Direction> {
        Direction::PLANAR.into_iter().find(|d| d.vector() == (dr, dc))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::N => "n",
            Direction::S => "s",
            Direction::E => "e",
            Direction::W => "w",
            Direction::Ne => "ne",
            Direction::Nw => "nw",
            Direction::Se => "se",
            Direction::Sw => "sw",
            Direction::U => "u",
            Direction::D => "d",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
