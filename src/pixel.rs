/*!
 * Satellite pixels and the geometric relationships between them.
 *
 * A pixel is a quadrilateral on the Earth's surface along with the fire characteristics the
 * satellite retrieved for that area. All the relationships (containment, overlap, adjacency)
 * assume the pixel is a convex quadrilateral with corners in the order `ul`, `ll`, `lr`, `ur`.
 */
use crate::{
    geo::{triangle_centroid, BoundingBox, Coord, Geo, Line},
    satellite::{DataQualityFlagCode, MaskCode},
};

pub use pixel_list::PixelList;

mod pixel_list;

/// The coordinates describing the area of a pixel viewed from a GOES satellite.
///
/// Missing values for `power`, `area`, or `temperature` are stored as negative infinity, so
/// they contribute nothing to a maximum and are skipped in sums.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pixel {
    /// The upper left (northwest) corner point of the pixel
    pub ul: Coord,
    /// The lower left (southwest) corner point of the pixel
    pub ll: Coord,
    /// The lower right (southeast) corner point of the pixel.
    pub lr: Coord,
    /// The upper right (northeast) corner point of the pixel.
    pub ur: Coord,
    /// The radiative power in MegaWatts in this pixel.
    pub power: f64,
    /// The estimated area of the pixel covered by the fire in square meters.
    pub area: f64,
    /// The estimated temperature of the fire in K
    pub temperature: f64,
    /// This is the scan angle as measured in the coordinate system of the satellite. The satellite
    /// measures the x and y positions of a pixel on a grid by the angle each makes with the central
    /// point which looks at nadir on the Earth. There are two values, an x scan angle and a y scan
    /// angle. They are combined via the Euclidian norm sqrt(x^2 + y^2) to form the scan_angle.
    ///
    /// Constant values of the scan angle form concentric circles around the nadir point on the
    /// Earth's surface. All points along that line have a very similar (equal if the Earth was a
    /// sphere) angle between the satellites view and the local zenith. This is a good proxy for
    /// how much of an edge on vs straight down view, which can be useful for quality control.
    pub scan_angle: f64,
    /// Mask is a code that describes the outcome of the algorithms that characterize a fire point.
    ///
    /// See [MaskCode::as_str] for reference.
    pub mask_flag: MaskCode,
    /// Data Quality Flag
    ///
    /// See [DataQualityFlagCode::as_str] for reference.
    pub data_quality_flag: DataQualityFlagCode,
}

impl Pixel {
    /// Create a pixel from its corners with all the fire characteristics missing.
    pub fn from_corners(ul: Coord, ll: Coord, lr: Coord, ur: Coord) -> Self {
        Pixel {
            ul,
            ll,
            lr,
            ur,
            power: f64::NEG_INFINITY,
            area: f64::NEG_INFINITY,
            temperature: f64::NEG_INFINITY,
            scan_angle: f64::NEG_INFINITY,
            mask_flag: MaskCode(0),
            data_quality_flag: DataQualityFlagCode(0),
        }
    }

    fn corners(&self) -> [Coord; 4] {
        [self.ul, self.ur, self.lr, self.ll]
    }

    fn edges(&self) -> [Line; 4] {
        [
            Line {
                start: self.ul,
                end: self.ur,
            },
            Line {
                start: self.ur,
                end: self.lr,
            },
            Line {
                start: self.lr,
                end: self.ll,
            },
            Line {
                start: self.ll,
                end: self.ul,
            },
        ]
    }

    /// Tests if these pixels are basically the same pixel in a geographic sense (not including
    /// power).
    ///
    /// Every corner must be within `eps` of its counterpart.
    pub fn approx_equal(&self, other: &Pixel, eps: f64) -> bool {
        self.ul.is_close(other.ul, eps)
            && self.ur.is_close(other.ur, eps)
            && self.lr.is_close(other.lr, eps)
            && self.ll.is_close(other.ll, eps)
    }

    /**
     * Determine if a coordinate is interior to a pixel.
     *
     * Interior means that it is NOT on the boundary. The eps parameter is used by an interal line
     * intersection function to detect if the intersection point is very close to an end point.
     */
    pub fn contains_coord(&self, coord: Coord, eps: f64) -> bool {
        // Check if it's outside the bounding box first. This is easy, and if it is, then we
        // already know the answer.
        if !self.bounding_box().contains_coord(coord, eps) {
            return false;
        }

        // Make a line from the point in question to each corner of the quadrilateral. If any of
        // those lines crosses an edge of the quadrilateral, the the point is outside. Crossings
        // that are near the end points are ignored, so this is fuzzy to within eps.
        let coord_lines = [
            Line {
                start: coord,
                end: self.ul,
            },
            Line {
                start: coord,
                end: self.ur,
            },
            Line {
                start: coord,
                end: self.ll,
            },
            Line {
                start: coord,
                end: self.lr,
            },
        ];

        for pxl_line in self.edges() {
            for coord_line in &coord_lines {
                let res = pxl_line.intersect(coord_line, eps);

                if res.does_intersect && !res.intersect_is_endpoints {
                    return false;
                }
            }
        }

        true
    }

    /**
     * Determine if satellite pixels overlap.
     *
     * Overlapping is defined as one pixel having a vertex / corner that is interior to the other
     * one or as pixels having edges that intersect.
     *
     * A pixel that completely encloses another without any crossing edges or shared interior
     * corners is NOT detected. That can't happen with pixels from the same satellite grid.
     */
    pub fn overlap(&self, other: &Pixel, eps: f64) -> bool {
        // Check if they are equal first, then of course they overlap!
        if self.approx_equal(other, eps) {
            return true;
        }

        if !self.bounding_box().overlap(&other.bounding_box(), eps) {
            return false;
        }

        // Check for intersecting lines between the pixels.
        for self_edge in self.edges() {
            for other_edge in other.edges() {
                let res = self_edge.intersect(&other_edge, eps);

                if res.does_intersect && !res.intersect_is_endpoints {
                    return true;
                }
            }
        }

        // Checking for intersecting lines didn't find anything. Now try seeing if one pixel is
        // contained in the other pixel.
        if self
            .corners()
            .iter()
            .any(|&corner| other.contains_coord(corner, eps))
        {
            return true;
        }

        other
            .corners()
            .iter()
            .any(|&corner| self.contains_coord(corner, eps))
    }

    /**
     * Determine if satellite pixels are adjacent.
     *
     * Adjacent is defined as having one or two corners within `eps` of each other without
     * overlapping. A pixel is not adjacent to itself.
     */
    pub fn is_adjacent_to(&self, other: &Pixel, eps: f64) -> bool {
        if self.approx_equal(other, eps) {
            return false;
        }

        if !self.bounding_box().overlap(&other.bounding_box(), eps) {
            return false;
        }

        let self_coords = self.corners();
        let other_coords = other.corners();

        // Count the number of close coords and mark which ones are close.
        let mut self_close = [false; 4];
        let mut other_close = [false; 4];
        let mut num_close_coords = 0;
        for i in 0..4 {
            for j in 0..4 {
                if self_coords[i].is_close(other_coords[j], eps) {
                    num_close_coords += 1;
                    self_close[i] = true;
                    other_close[j] = true;
                }
            }
        }

        if !(1..=2).contains(&num_close_coords) {
            return false;
        }

        // Check if any not close points are contained in the other pixel
        for i in 0..4 {
            if !self_close[i] && other.contains_coord(self_coords[i], eps) {
                return false;
            }

            if !other_close[i] && self.contains_coord(other_coords[i], eps) {
                return false;
            }
        }

        // A heuristic to catch the remaining edge cases. If they are adjacent, the centroid of
        // neither should be interior to the other.
        if other.contains_coord(self.centroid(), eps) {
            return false;
        }

        !self.contains_coord(other.centroid(), eps)
    }

    /// Determine if satellite pixels are adjacent or overlapping.
    pub fn is_adjacent_to_or_overlaps(&self, other: &Pixel, eps: f64) -> bool {
        if !self.bounding_box().overlap(&other.bounding_box(), eps) {
            return false;
        }

        let self_coords = self.corners();
        let other_coords = other.corners();

        let mut num_close_coords = 0;
        for self_coord in &self_coords {
            for &other_coord in &other_coords {
                if self_coord.is_close(other_coord, eps) {
                    num_close_coords += 1;

                    // Sharing an edge or more.
                    if num_close_coords > 1 {
                        return true;
                    }
                }
            }
        }

        for i in 0..4 {
            if other.contains_coord(self_coords[i], eps)
                || self.contains_coord(other_coords[i], eps)
            {
                return true;
            }
        }

        self.overlap(other, eps) || self.is_adjacent_to(other, eps)
    }

    /// Merge the fire characteristics of another pixel covering the same area into this one.
    ///
    /// Power, area, and temperature take the larger value, while the quality codes take the
    /// lesser (better) one.
    pub fn max_merge(&mut self, other: &Pixel) {
        self.power = self.power.max(other.power);
        self.area = self.area.max(other.area);
        self.temperature = self.temperature.max(other.temperature);
        self.mask_flag = self.mask_flag.min(other.mask_flag);
        self.data_quality_flag = self.data_quality_flag.min(other.data_quality_flag);
    }
}

impl Geo for Pixel {
    /// Calculate the centroid of the pixel.
    ///
    /// Split the quadrilateral along each diagonal, connect the centroids of the resulting pairs
    /// of triangles, and the intersection of those two lines is the centroid.
    fn centroid(&self) -> Coord {
        let t1_c = triangle_centroid(self.ul, self.ll, self.lr);
        let t2_c = triangle_centroid(self.ul, self.ur, self.lr);
        let diag1_centroids = Line {
            start: t1_c,
            end: t2_c,
        };

        let t3_c = triangle_centroid(self.ul, self.ll, self.ur);
        let t4_c = triangle_centroid(self.lr, self.ur, self.ll);
        let diag2_centroids = Line {
            start: t3_c,
            end: t4_c,
        };

        let res = diag1_centroids.intersect(&diag2_centroids, 1.0e-30);

        assert!(
            res.does_intersect,
            "pixel centroid lines do not intersect ({}): {:?}",
            res.msg, self
        );

        res.intersection
    }

    fn bounding_box(&self) -> BoundingBox {
        let xmax = self.ur.lon.max(self.lr.lon);
        let xmin = self.ul.lon.min(self.ll.lon);
        let ymax = self.ur.lat.max(self.ul.lat);
        let ymin = self.lr.lat.min(self.ll.lat);

        BoundingBox {
            ll: Coord {
                lat: ymin,
                lon: xmin,
            },
            ur: Coord {
                lat: ymax,
                lon: xmax,
            },
        }
    }
}
