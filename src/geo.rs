/*!
 * Geographic calculations.
 *
 * All of the geometry here is done on a flat plane with latitude and longitude as the axes. That
 * is plenty accurate for comparing neighboring satellite pixels, which are only a few kilometers
 * across, but nothing here is correct across the international date line.
 *
 * Every comparison takes an `eps` argument to make the matching fuzzy, since pixel corners that
 * should be identical rarely are after the projection math.
 */

/// A geographic coordinate, latitude and longitude in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Coord {
    pub lat: f64,
    pub lon: f64,
}

impl Coord {
    /**
     * Determine if these coordinates are close to each other.
     *
     * The `eps` parameter is the maximum distance between points in the same units as the
     * coordinates that two points can have and still be considered close.
     */
    pub fn is_close(&self, other: Coord, eps: f64) -> bool {
        let lat_diff = self.lat - other.lat;
        let lon_diff = self.lon - other.lon;
        let distance_squared = lat_diff * lat_diff + lon_diff * lon_diff;

        distance_squared <= (eps * eps)
    }
}

/// An axis aligned bounding box in latitude and longitude.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundingBox {
    /// The lower left corner of the box.
    pub ll: Coord,
    /// The upper right corner of the box.
    pub ur: Coord,
}

impl BoundingBox {
    /// Check if a coordinate is inside the box, the edges are included to within `eps`.
    pub fn contains_coord(&self, coord: Coord, eps: f64) -> bool {
        let lon_in_range = (coord.lon - self.ur.lon) < eps && (coord.lon - self.ll.lon) > -eps;
        let lat_in_range = (coord.lat - self.ur.lat) < eps && (coord.lat - self.ll.lat) > -eps;

        lon_in_range && lat_in_range
    }

    /// Check if two bounding boxes overlap.
    pub fn overlap(&self, other: &BoundingBox, eps: f64) -> bool {
        let other_coords = other.corners();
        let self_coords = self.corners();

        for i in 0..4 {
            if self.contains_coord(other_coords[i], eps) {
                return true;
            }

            if other.contains_coord(self_coords[i], eps) {
                return true;
            }
        }

        false
    }

    fn corners(&self) -> [Coord; 4] {
        [
            self.ll,
            self.ur,
            Coord {
                lat: self.ll.lat,
                lon: self.ur.lon,
            },
            Coord {
                lat: self.ur.lat,
                lon: self.ll.lon,
            },
        ]
    }
}

/// Types with a location and an extent on the Earth's surface.
pub trait Geo {
    /// The center point of the object.
    fn centroid(&self) -> Coord;

    /// A box that contains the whole object.
    fn bounding_box(&self) -> BoundingBox;
}

/*-------------------------------------------------------------------------------------------------
 *                                         Line Segments
 *-----------------------------------------------------------------------------------------------*/
/// A line segment between two coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line {
    pub start: Coord,
    pub end: Coord,
}

/// The outcome of intersecting two line segments.
#[derive(Debug, Clone, Copy)]
pub struct IntersectResult {
    /// The point where the lines meet, NaN if they do not.
    pub intersection: Coord,
    /// True if the segments actually cross (or touch) within their extents.
    pub does_intersect: bool,
    /// True if the intersection is at an end point of both segments, e.g. a shared vertex.
    pub intersect_is_endpoints: bool,
    /// Why it does or does not intersect.
    pub msg: &'static str,
}

impl Line {
    /// Is the coordinate within `eps` of the infinite line through this segment?
    fn coord_is_close(&self, coord: Coord, eps: f64) -> bool {
        let p0 = coord;
        let p1 = self.start;
        let p2 = self.end;
        let eps2 = eps * eps;

        let num = (p2.lon - p1.lon) * (p1.lat - p0.lat) - (p1.lon - p0.lon) * (p2.lat - p1.lat);
        let denom2 = (p2.lon - p1.lon) * (p2.lon - p1.lon) + (p2.lat - p1.lat) * (p2.lat - p1.lat);

        (num * num / denom2) <= eps2
    }

    /**
     * Find the intersection of two line segments.
     *
     * Nearly colinear segments (2 or more end points close to the other line) are reported as
     * not intersecting, as are parallel segments.
     */
    pub fn intersect(&self, other: &Line, eps: f64) -> IntersectResult {
        let l1 = self;
        let l2 = other;

        let mut result = IntersectResult {
            intersection: Coord {
                lat: f64::NAN,
                lon: f64::NAN,
            },
            does_intersect: false,
            intersect_is_endpoints: false,
            msg: "nothing to report",
        };

        let num_close = [
            l1.coord_is_close(l2.start, eps),
            l1.coord_is_close(l2.end, eps),
            l2.coord_is_close(l1.start, eps),
            l2.coord_is_close(l1.end, eps),
        ]
        .iter()
        .filter(|&&close| close)
        .count();

        if num_close > 1 {
            result.msg = "colinear";
            return result;
        }

        let m1 = (l1.end.lat - l1.start.lat) / (l1.end.lon - l1.start.lon);
        let m2 = (l2.end.lat - l2.start.lat) / (l2.end.lon - l2.start.lon);

        let x1 = l1.start.lon;
        let y1 = l1.start.lat;
        let x2 = l2.start.lon;
        let y2 = l2.start.lat;

        if m1 == m2 || (m1.is_infinite() && m2.is_infinite()) {
            result.msg = "parallel lines";
            return result;
        }

        let (x0, y0) = if m1.is_infinite() {
            // l1 is vertical
            let x0 = l1.start.lon;
            (x0, m2 * (x0 - x2) + y2)
        } else if m2.is_infinite() {
            // l2 is vertical
            let x0 = l2.start.lon;
            (x0, m1 * (x0 - x1) + y1)
        } else {
            let x0 = (y2 - y1 + m1 * x1 - m2 * x2) / (m1 - m2);
            (x0, m1 * (x0 - x1) + y1)
        };

        let intersect = Coord { lat: y0, lon: x0 };
        result.intersection = intersect;

        if !l1.within_extent(intersect, eps) || !l2.within_extent(intersect, eps) {
            result.msg = "intersection point outside line segment";
            return result;
        }

        result.does_intersect = true;

        let is_l1_endpoint = intersect.is_close(l1.start, eps) || intersect.is_close(l1.end, eps);
        let is_l2_endpoint = intersect.is_close(l2.start, eps) || intersect.is_close(l2.end, eps);

        result.intersect_is_endpoints = is_l1_endpoint && is_l2_endpoint;

        result
    }

    fn within_extent(&self, coord: Coord, eps: f64) -> bool {
        let Coord { lat: y0, lon: x0 } = coord;

        !(y0 - self.start.lat.max(self.end.lat) > eps
            || self.start.lat.min(self.end.lat) - y0 > eps
            || x0 - self.start.lon.max(self.end.lon) > eps
            || self.start.lon.min(self.end.lon) - x0 > eps)
    }
}

pub(crate) fn triangle_centroid(v1: Coord, v2: Coord, v3: Coord) -> Coord {
    let lat = (v1.lat + v2.lat + v3.lat) / 3.0;
    let lon = (v1.lon + v2.lon + v3.lon) / 3.0;

    Coord { lat, lon }
}
