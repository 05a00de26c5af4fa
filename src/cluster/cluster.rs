use crate::{
    firepoint::FirePoint,
    geo::{BoundingBox, Coord, Geo},
    pixel::{Pixel, PixelList},
    satellite::MaskCode,
};

/**
 * The aggregate properties of a connected group of FirePoint objects.
 */
#[derive(Clone, Debug)]
pub struct Cluster {
    /// Total (sum) of the fire power of the points in the cluster in megawatts.
    power: f64,
    /// Total (sum) of the fire area of the points in the cluster with area in square meters.
    area: f64,
    /// Maximum temperature of all the pixels in the cluster in Kelvin.
    max_temperature: f64,
    /// The maximum scan angle of any point in this cluster.
    max_scan_angle: f64,
    /// Pixels making up the cluster.
    pixels: PixelList,
}

impl Default for Cluster {
    fn default() -> Self {
        Cluster {
            power: 0.0,
            area: 0.0,
            max_temperature: f64::NEG_INFINITY,
            max_scan_angle: f64::NEG_INFINITY,
            pixels: PixelList::new(),
        }
    }
}

impl Cluster {
    /// Create a new, empty cluster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pixel to the cluster and update the aggregate properties.
    pub fn add_pixel(&mut self, pixel: Pixel) {
        if pixel.power.is_finite() {
            self.power += pixel.power;
        }

        if pixel.area.is_finite() {
            self.area += pixel.area;
        }

        self.max_temperature = self.max_temperature.max(pixel.temperature);
        self.max_scan_angle = self.max_scan_angle.max(pixel.scan_angle);

        self.pixels.push(pixel);
    }

    /// Total (sum) of the fire power of the points in the cluster in megawatts.
    pub fn total_power(&self) -> f64 {
        self.power
    }

    /// Total (sum) of the fire area of the points in the cluster in square meters.
    pub fn total_area(&self) -> f64 {
        self.area
    }

    /// Maximum temperature of all the pixels in the cluster in Kelvin.
    pub fn max_temperature(&self) -> f64 {
        self.max_temperature
    }

    /// The maximum scan angle of any point in this cluster.
    pub fn max_scan_angle(&self) -> f64 {
        self.max_scan_angle
    }

    /// The number of pixels in the cluster.
    pub fn pixel_count(&self) -> usize {
        self.pixels.len()
    }

    /// The pixels making up the cluster.
    pub fn pixels(&self) -> &PixelList {
        &self.pixels
    }

    /**
     * Check the quality control mask of the pixels to see if this cluster is worth keeping.
     *
     * A cluster is kept if at least one of its pixels is a fire detection of medium or better
     * probability, temporally filtered or not.
     */
    pub fn is_keeper(&self) -> bool {
        self.pixels.iter().any(|pixel| {
            matches!(pixel.mask_flag, MaskCode(10..=14) | MaskCode(30..=34))
        })
    }

    /**
     * Group FirePoint objects into clusters.
     *
     * FirePoint objects that are directly adjacent to each other, including diagonally, are
     * grouped into clusters where each point is in direct contact with at least one other point in
     * the cluster.
     *
     * Each cluster is grown until a full pass over the remaining points adds nothing, so the
     * grouping does not depend on the order of the input. Clusters are returned in the order
     * their first point appeared in the input.
     */
    pub fn from_fire_points(points: Vec<FirePoint>) -> Vec<Self> {
        let mut clusters: Vec<Self> = vec![];
        let mut remaining: Vec<Option<FirePoint>> = points.into_iter().map(Some).collect();
        let mut cluster_points: Vec<FirePoint> = Vec::with_capacity(20);

        for i in 0..remaining.len() {
            let seed = match remaining[i].take() {
                Some(pnt) => pnt,
                None => continue,
            };

            cluster_points.push(seed);

            loop {
                let mut added = false;

                for slot in remaining.iter_mut().skip(i + 1) {
                    let is_neighbor = match slot {
                        Some(candidate) => cluster_points
                            .iter()
                            .any(|in_cluster| in_cluster.is_grid_neighbor(candidate)),
                        None => false,
                    };

                    if is_neighbor {
                        if let Some(candidate) = slot.take() {
                            cluster_points.push(candidate);
                            added = true;
                        }
                    }
                }

                if !added {
                    break;
                }
            }

            let mut curr_clust = Cluster::new();
            for pnt in cluster_points.drain(..) {
                curr_clust.add_pixel(pnt.pixel);
            }

            clusters.push(curr_clust);
        }

        clusters
    }
}

impl Geo for Cluster {
    fn centroid(&self) -> Coord {
        self.pixels.centroid()
    }

    fn bounding_box(&self) -> BoundingBox {
        self.pixels.bounding_box()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::satellite::DataQualityFlagCode;

    fn fire_point(x: isize, y: isize, power: f64) -> FirePoint {
        let lat = 45.0 - y as f64 * 0.02;
        let lon = -120.0 + x as f64 * 0.02;

        let mut pixel = Pixel::from_corners(
            Coord { lat: lat + 0.02, lon },
            Coord { lat, lon },
            Coord {
                lat,
                lon: lon + 0.02,
            },
            Coord {
                lat: lat + 0.02,
                lon: lon + 0.02,
            },
        );

        pixel.power = power;
        pixel.area = 100.0;
        pixel.temperature = 500.0 + power;
        pixel.scan_angle = 5.0 + x as f64 / 100.0;
        pixel.mask_flag = MaskCode(10);
        pixel.data_quality_flag = DataQualityFlagCode(0);

        FirePoint { x, y, pixel }
    }

    fn sizes(clusters: &[Cluster]) -> Vec<usize> {
        clusters.iter().map(|c| c.pixel_count()).collect()
    }

    #[test]
    fn test_separate_groups() {
        let points = vec![
            fire_point(5, 5, 1.0),
            fire_point(5, 6, 2.0),
            fire_point(20, 20, 3.0),
        ];

        let clusters = Cluster::from_fire_points(points);

        assert_eq!(sizes(&clusters), vec![2, 1]);
        assert_eq!(clusters[0].total_power(), 3.0);
        assert_eq!(clusters[1].total_power(), 3.0);
    }

    #[test]
    fn test_diagonal_chain() {
        let points = vec![
            fire_point(0, 0, 1.0),
            fire_point(1, 1, 1.0),
            fire_point(2, 2, 1.0),
        ];

        assert_eq!(sizes(&Cluster::from_fire_points(points)), vec![3]);
    }

    #[test]
    fn test_chain_out_of_order() {
        // The middle of the chain shows up last, a single pass would split this in two.
        let points = vec![
            fire_point(0, 0, 1.0),
            fire_point(2, 2, 1.0),
            fire_point(1, 1, 1.0),
        ];

        assert_eq!(sizes(&Cluster::from_fire_points(points)), vec![3]);

        let points = vec![
            fire_point(0, 0, 1.0),
            fire_point(4, 0, 1.0),
            fire_point(3, 0, 1.0),
            fire_point(2, 0, 1.0),
            fire_point(1, 0, 1.0),
            fire_point(9, 9, 1.0),
        ];

        assert_eq!(sizes(&Cluster::from_fire_points(points)), vec![5, 1]);
    }

    #[test]
    fn test_isolated_points_and_empty_input() {
        assert!(Cluster::from_fire_points(vec![]).is_empty());

        let points = vec![fire_point(0, 0, 1.0), fire_point(0, 2, 1.0), fire_point(2, 0, 1.0)];
        assert_eq!(sizes(&Cluster::from_fire_points(points)), vec![1, 1, 1]);
    }

    #[test]
    fn test_aggregates() {
        let mut missing = fire_point(1, 0, f64::NEG_INFINITY);
        missing.pixel.area = f64::NEG_INFINITY;
        missing.pixel.temperature = f64::NEG_INFINITY;

        let points = vec![fire_point(0, 0, 10.0), missing, fire_point(2, 0, 30.0)];
        let clusters = Cluster::from_fire_points(points);
        assert_eq!(clusters.len(), 1);

        let clust = &clusters[0];
        assert_eq!(clust.total_power(), 40.0);
        assert_eq!(clust.total_area(), 200.0);
        assert_eq!(clust.max_temperature(), 530.0);
        assert!((clust.max_scan_angle() - 5.02).abs() < 1.0e-12);
        assert!(clust.bounding_box().contains_coord(clust.centroid(), 0.0));
    }

    #[test]
    fn test_missing_maxima() {
        let mut clust = Cluster::new();
        assert_eq!(clust.max_temperature(), f64::NEG_INFINITY);
        assert_eq!(clust.max_scan_angle(), f64::NEG_INFINITY);

        let mut pnt = fire_point(0, 0, 10.0);
        pnt.pixel.scan_angle = f64::NEG_INFINITY;
        clust.add_pixel(pnt.pixel);
        assert_eq!(clust.max_scan_angle(), f64::NEG_INFINITY);

        pnt.pixel.scan_angle = 0.25;
        clust.add_pixel(pnt.pixel);
        assert_eq!(clust.max_scan_angle(), 0.25);
    }

    #[test]
    fn test_keeper() {
        let mut clust = Cluster::new();
        let mut pnt = fire_point(0, 0, 1.0);
        pnt.pixel.mask_flag = MaskCode(15);
        clust.add_pixel(pnt.pixel);
        assert!(!clust.is_keeper());

        pnt.pixel.mask_flag = MaskCode(33);
        clust.add_pixel(pnt.pixel);
        assert!(clust.is_keeper());

        assert!(!Cluster::new().is_keeper());
    }
}
