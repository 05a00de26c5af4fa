use super::Cluster;
use crate::{
    firesatimage::FireSatImage,
    geo::{BoundingBox, Geo},
    satellite::{parse_satellite_description_from_file_name, Satellite, Sector},
};
use chrono::{DateTime, Utc};

/**
 * Keep a cluster list with metadata about the file it was derived from.
 *
 * If there is an error, there will be an error message and the list of clusters will be empty.
 */
#[derive(Debug, Clone)]
pub struct ClusterList {
    /// This is the source satellite.
    satellite: Satellite,
    /// The scan sector the clusters were found in.
    sector: Sector,
    /// Start time of the scan.
    scan_start: DateTime<Utc>,
    /// End time of the scan.
    scan_end: DateTime<Utc>,
    /// List of Cluster objects associated with the above metadata.
    clusters: Vec<Cluster>,
    /// Error message.
    err_msg: Option<&'static str>,
}

impl ClusterList {
    /**
     * Analyze a FireSatImage and return a ClusterList including the file metadata.
     *
     * Failures don't return an error; the list carries the error message instead, along with
     * whatever metadata could be parsed from the file name.
     */
    pub fn from_fire_sat_image(fsat: &dyn FireSatImage) -> Self {
        let fname = fsat.file_name();

        let (satellite, sector, scan_start, scan_end) =
            match parse_satellite_description_from_file_name(fname) {
                Ok(vals) => vals,
                Err(err) => {
                    log::warn!("Error parsing file name {}: {}", fname, err);
                    return Self::from_error(
                        Satellite::string_contains_satellite(fname).unwrap_or(Satellite::G16),
                        Sector::string_contains_sector(fname).unwrap_or(Sector::FULL),
                        DateTime::<Utc>::MIN_UTC,
                        DateTime::<Utc>::MIN_UTC,
                        err.msg,
                    );
                }
            };

        let points = match fsat.extract_fire_points() {
            Ok(points) => points,
            Err(err) => {
                log::warn!(
                    target: satellite.name(),
                    "Error extracting fire points from {}: {}",
                    fname,
                    err
                );
                return Self::from_error(
                    satellite,
                    sector,
                    scan_start,
                    scan_end,
                    "error extracting fire points",
                );
            }
        };

        let clusters = Cluster::from_fire_points(points);

        ClusterList {
            satellite,
            sector,
            scan_start,
            scan_end,
            clusters,
            err_msg: None,
        }
    }

    /// Create a list from clusters that were already found.
    pub fn new(
        satellite: Satellite,
        sector: Sector,
        scan_start: DateTime<Utc>,
        scan_end: DateTime<Utc>,
        clusters: Vec<Cluster>,
    ) -> Self {
        ClusterList {
            satellite,
            sector,
            scan_start,
            scan_end,
            clusters,
            err_msg: None,
        }
    }

    fn from_error(
        satellite: Satellite,
        sector: Sector,
        scan_start: DateTime<Utc>,
        scan_end: DateTime<Utc>,
        err_msg: &'static str,
    ) -> Self {
        ClusterList {
            satellite,
            sector,
            scan_start,
            scan_end,
            clusters: vec![],
            err_msg: Some(err_msg),
        }
    }

    /// Remove all the clusters that do not satisfy the predicate.
    pub fn filter<F: FnMut(&Cluster) -> bool>(mut self, pred: F) -> Self {
        self.clusters.retain(pred);
        self
    }

    /// Only keep clusters with a centroid inside the box.
    pub fn filter_box(self, bbox: BoundingBox) -> Self {
        self.filter(|clust| bbox.contains_coord(clust.centroid(), 0.0))
    }

    /// Remove clusters with a scan angle at or above `max_scan_angle`.
    pub fn filter_scan_angle(self, max_scan_angle: f64) -> Self {
        self.filter(|clust| clust.max_scan_angle() < max_scan_angle)
    }

    /// The satellite the clusters came from.
    pub fn satellite(&self) -> Satellite {
        self.satellite
    }

    /// The sector the clusters came from.
    pub fn sector(&self) -> Sector {
        self.sector
    }

    /// The start time of the scan.
    pub fn scan_start(&self) -> DateTime<Utc> {
        self.scan_start
    }

    /// The end time of the scan.
    pub fn scan_end(&self) -> DateTime<Utc> {
        self.scan_end
    }

    /// The error message if this list could not be created.
    pub fn err_msg(&self) -> Option<&'static str> {
        self.err_msg
    }

    /// Check whether there was an error creating this list.
    pub fn is_error(&self) -> bool {
        self.err_msg.is_some()
    }

    /// Get a view of the clusters.
    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    /// Take ownership of the clusters, leaving this list empty.
    pub fn take_clusters(&mut self) -> Vec<Cluster> {
        std::mem::take(&mut self.clusters)
    }

    /// The number of clusters.
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    /// Check if there are any clusters.
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// The sum of the power of all the clusters in megawatts.
    pub fn total_power(&self) -> f64 {
        self.clusters.iter().map(|c| c.total_power()).sum()
    }
}
