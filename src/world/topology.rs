use std::path::Path;

use crate::world::geohash::{GeohashError, GridCell, grid_size};

/// Metres of height per unit of 8-bit intensity.
pub const INTENSITY_TO_HEIGHT: f64 = 8850.0 / 255.0;

/// Precision of the geohash cell covered by one height tile.
pub const TILE_PRECISION: usize = 2;

/// Single-channel height samples for one two-character geohash region.
#[derive(Debug, Clone, PartialEq)]
pub struct HeightTile {
    pub width: u32,
    pub height: u32,
    pixels: Vec<u8>,
}

impl HeightTile {
    /// Build a tile from row-major intensities. Returns `None` if the buffer
    /// does not match the dimensions or the tile is empty.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        if width == 0 || height == 0 || pixels.len() != (width as usize) * (height as usize) {
            return None;
        }
        Some(HeightTile {
            width,
            height,
            pixels,
        })
    }

    /// A tile with the same intensity everywhere.
    pub fn flat(width: u32, height: u32, intensity: u8) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        HeightTile {
            width,
            height,
            pixels: vec![intensity; (width as usize) * (height as usize)],
        }
    }

    /// Decode a PNG (any colour type) into 8-bit luma samples.
    pub fn from_png(path: &Path) -> Result<Self, image::ImageError> {
        let luma = image::open(path)?.to_luma8();
        let (width, height) = luma.dimensions();
        Ok(HeightTile {
            width,
            height,
            pixels: luma.into_raw(),
        })
    }

    fn at(&self, x: u32, y: u32) -> f64 {
        self.pixels[(y * self.width + x) as usize] as f64
    }

    /// Smoothed intensity at pixel `(x, y)` offset by the sub-pixel fraction
    /// `(fx, fy)`. The quadrant of the fraction picks the 2x2 block of
    /// neighbouring samples to interpolate over; edges clamp.
    pub fn intensity(&self, x: u32, y: u32, fx: f64, fy: f64) -> f64 {
        let x = x.min(self.width - 1);
        let y = y.min(self.height - 1);
        let xm = x.saturating_sub(1);
        let xp = (x + 1).min(self.width - 1);
        let ym = y.saturating_sub(1);
        let yp = (y + 1).min(self.height - 1);

        let sample = |sx: u32, sy: u32, px: f64, py: f64| Pixel {
            x: px,
            y: py,
            intensity: self.at(sx, sy),
        };

        let (tl, tr, bl, br) = match (fx < 0.5, fy < 0.5) {
            (true, true) => (
                sample(xm, ym, -0.5, -0.5),
                sample(x, ym, 0.5, -0.5),
                sample(xm, y, -0.5, 0.5),
                sample(x, y, 0.5, 0.5),
            ),
            (true, false) => (
                sample(xm, y, -0.5, 0.5),
                sample(x, y, 0.5, 0.5),
                sample(xm, yp, -0.5, 1.5),
                sample(x, yp, 0.5, 1.5),
            ),
            (false, true) => (
                sample(x, ym, 0.5, -0.5),
                sample(xp, ym, 1.5, -0.5),
                sample(x, y, 0.5, 0.5),
                sample(xp, y, 1.5, 0.5),
            ),
            (false, false) => (
                sample(x, y, 0.5, 0.5),
                sample(xp, y, 1.5, 0.5),
                sample(x, yp, 0.5, 1.5),
                sample(xp, yp, 1.5, 1.5),
            ),
        };

        bilinear_interpolation(&tl, &tr, &bl, &br, fx, fy)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pixel {
    pub x: f64,
    pub y: f64,
    pub intensity: f64,
}

/// Interpolate the intensity at `(x, y)` from four corner samples.
pub fn bilinear_interpolation(tl: &Pixel, tr: &Pixel, bl: &Pixel, br: &Pixel, x: f64, y: f64) -> f64 {
    let width = br.x - bl.x;
    let bottom = (bl.intensity * (br.x - x) + br.intensity * (x - bl.x)) / width;
    let top = (tl.intensity * (br.x - x) + tr.intensity * (x - bl.x)) / width;
    let depth = tl.y - bl.y;
    (bottom * (tl.y - y) + top * (y - bl.y)) / depth
}

/// Where a geohash falls inside its height tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TilePosition {
    /// First two characters of the geohash; also the tile file stem.
    pub tile: String,
    /// Cells of the geohash's precision spanned by the tile.
    pub rows: i64,
    pub cols: i64,
    /// Offset of the geohash from the tile's top-left cell.
    pub row: i64,
    pub col: i64,
}

pub fn tile_position(geohash: &str) -> Result<TilePosition, GeohashError> {
    let cell = GridCell::from_geohash(geohash)?;
    if cell.precision <= TILE_PRECISION {
        let tile = geohash.chars().take(TILE_PRECISION).collect();
        return Ok(TilePosition {
            tile,
            rows: 1,
            cols: 1,
            row: 0,
            col: 0,
        });
    }

    let tile = &geohash[..TILE_PRECISION];
    let tile_cell = GridCell::from_geohash(tile)?;
    let (tile_rows, tile_cols) = grid_size(TILE_PRECISION);
    let (all_rows, all_cols) = grid_size(cell.precision);
    let rows = all_rows / tile_rows;
    let cols = all_cols / tile_cols;

    Ok(TilePosition {
        tile: tile.to_string(),
        rows,
        cols,
        row: cell.row - tile_cell.row * rows,
        col: cell.col - tile_cell.col * cols,
    })
}

impl TilePosition {
    /// Height in metres, rounded up, sampled from `tile`.
    pub fn height_in(&self, tile: &HeightTile) -> f64 {
        let x_raw = (tile.width - 1) as f64 * (self.col as f64 / self.cols as f64);
        let y_raw = (tile.height - 1) as f64 * (self.row as f64 / self.rows as f64);
        let x = x_raw.floor();
        let y = y_raw.floor();
        let intensity = tile.intensity(x as u32, y as u32, x_raw - x, y_raw - y);
        (intensity * INTENSITY_TO_HEIGHT).ceil()
    }
}
