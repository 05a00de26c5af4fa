/*!
 * All the data related to a point with fire detected.
 *
 * A FirePoint is a structure that holds all data associated with a pixel in the satellite imagery
 * that corresponds to a fire detection.
 */
use crate::pixel::Pixel;

/**
 * Represents all the data associated with a single pixel in which the satellite has detected a
 * fire.
 */
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FirePoint {
    /// The x-coordinate (column number, often indexed as 'i') in the grid.
    pub x: isize,
    /// The y-coordinate (row number, often indexed as 'j') in the grid.
    pub y: isize,
    /// The geographic footprint and fire characteristics of the point.
    pub pixel: Pixel,
}

impl FirePoint {
    /// Points are connected if they touch in the grid, including diagonally.
    pub(crate) fn is_grid_neighbor(&self, other: &FirePoint) -> bool {
        (self.x - other.x).abs() <= 1 && (self.y - other.y).abs() <= 1
    }
}
