//! Coordinate type definitions

use std::fmt;
use std::ops::{Add, Sub};

/// Width and height of one grid in pixels (and in game tiles).
pub const GRID_PIXELS: u32 = 100;

/// Number of pixels in one grid.
pub const GRID_SIZE: usize = (GRID_PIXELS * GRID_PIXELS) as usize;

/// Zoom levels of the tile pyramid (0 = full resolution).
pub const MIN_ZOOM: u8 = 0;
pub const MAX_ZOOM: u8 = 6;

/// Grid-cell address in a map's coordinate space.
///
/// One unit is one 100×100 grid at zoom 0. At zoom `z` a coordinate covers
/// `2^z × 2^z` base grids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Coord {
    /// X coordinate (west to east)
    pub x: i32,
    /// Y coordinate (north to south)
    pub y: i32,
}

impl Coord {
    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Returns the coordinate one zoom level up that contains this one.
    ///
    /// Negative values are shifted down by one before halving so the result
    /// rounds toward negative infinity: `-1 → -1`, `-2 → -1`, `-3 → -2`.
    #[inline]
    pub fn parent(&self) -> Coord {
        Coord {
            x: halve_floor(self.x),
            y: halve_floor(self.y),
        }
    }

    /// Returns the four coordinates one zoom level down, in quadrant order
    /// (top-left, top-right, bottom-left, bottom-right).
    #[inline]
    pub fn children(&self) -> [Coord; 4] {
        let bx = self.x * 2;
        let by = self.y * 2;
        [
            Coord::new(bx, by),
            Coord::new(bx + 1, by),
            Coord::new(bx, by + 1),
            Coord::new(bx + 1, by + 1),
        ]
    }

    /// Manhattan distance between two coordinates.
    #[inline]
    pub fn manhattan(&self, other: &Coord) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// Returns the grid containing an absolute game tile coordinate.
    ///
    /// Uses floor division so tiles west/north of the origin land in the
    /// negative grids.
    #[inline]
    pub fn grid_of_tile(tile_x: i32, tile_y: i32) -> Coord {
        let size = GRID_PIXELS as i32;
        Coord::new(tile_x.div_euclid(size), tile_y.div_euclid(size))
    }

    /// Returns the position of an absolute tile coordinate within its grid.
    #[inline]
    pub fn offset_in_grid(tile_x: i32, tile_y: i32) -> (i32, i32) {
        let size = GRID_PIXELS as i32;
        (tile_x.rem_euclid(size), tile_y.rem_euclid(size))
    }
}

#[inline]
fn halve_floor(v: i32) -> i32 {
    if v < 0 {
        (v - 1) / 2
    } else {
        v / 2
    }
}

impl Add for Coord {
    type Output = Coord;

    fn add(self, rhs: Coord) -> Coord {
        Coord::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Coord {
    type Output = Coord;

    fn sub(self, rhs: Coord) -> Coord {
        Coord::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Address of one pyramid tile: a coordinate at a zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey {
    /// Zoom level (0-6)
    pub zoom: u8,
    /// Coordinate at that zoom level
    pub coord: Coord,
}

impl TileKey {
    #[inline]
    pub const fn new(zoom: u8, coord: Coord) -> Self {
        Self { zoom, coord }
    }

    /// Returns the key of the tile one level up containing this tile.
    #[inline]
    pub fn parent(&self) -> TileKey {
        TileKey::new(self.zoom + 1, self.coord.parent())
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "z{} {}", self.zoom, self.coord)
    }
}
