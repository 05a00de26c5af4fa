use super::{Cluster, ClusterList};
use crate::{
    geo::Geo,
    satellite::{Satellite, Sector},
};
use chrono::{DateTime, Utc};
use std::fmt::{self, Display};

/// Clusters with a scan angle at or beyond this are too close to the edge of the disk to trust.
pub const MAX_SCAN_ANGLE: f64 = 8.3;

/// The scan a cluster or cluster list came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanInfo {
    pub satellite: Satellite,
    pub sector: Sector,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ScanInfo {
    fn from_list(clist: &ClusterList) -> Self {
        ScanInfo {
            satellite: clist.satellite(),
            sector: clist.sector(),
            start: clist.scan_start(),
            end: clist.scan_end(),
        }
    }
}

impl Display for ScanInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} {} {} - {}",
            self.satellite, self.sector, self.start, self.end
        )
    }
}

/*-------------------------------------------------------------------------------------------------
 *                                   Individual Cluster Stats
 *-----------------------------------------------------------------------------------------------*/
/// Summary statistics of all the individual clusters processed.
#[derive(Debug, Clone, Default)]
pub struct ClusterStats {
    biggest: Option<(ScanInfo, Cluster)>,
    hottest: Option<(ScanInfo, Cluster)>,
    num_power_lt_1mw: u32,
    num_power_lt_10mw: u32,
    num_power_lt_100mw: u32,
    num_power_lt_1gw: u32,
    num_power_lt_10gw: u32,
    num_power_lt_100gw: u32,
    num_clusters: u32,
}

impl ClusterStats {
    /// Add the clusters from a list to the statistics.
    ///
    /// Clusters too close to the limb of the Earth (scan angle >= `max_scan_angle`) are ignored.
    /// The usual limit is [MAX_SCAN_ANGLE].
    pub fn update(&mut self, clist: &ClusterList, max_scan_angle: f64) {
        let info = ScanInfo::from_list(clist);

        for clust in clist
            .clusters()
            .iter()
            .filter(|c| c.max_scan_angle() < max_scan_angle)
        {
            let power = clust.total_power();

            let is_bigger = self
                .biggest
                .as_ref()
                .map(|(_, big)| power > big.total_power())
                .unwrap_or(true);
            if is_bigger {
                self.biggest = Some((info, clust.clone()));
            }

            let is_hotter = self
                .hottest
                .as_ref()
                .map(|(_, hot)| clust.max_temperature() > hot.max_temperature())
                .unwrap_or(true);
            if is_hotter {
                self.hottest = Some((info, clust.clone()));
            }

            if power < 1.0 {
                self.num_power_lt_1mw += 1;
            }
            if power < 10.0 {
                self.num_power_lt_10mw += 1;
            }
            if power < 100.0 {
                self.num_power_lt_100mw += 1;
            }
            if power < 1_000.0 {
                self.num_power_lt_1gw += 1;
            }
            if power < 10_000.0 {
                self.num_power_lt_10gw += 1;
            }
            if power < 100_000.0 {
                self.num_power_lt_100gw += 1;
            }

            self.num_clusters += 1;
        }
    }

    /// The most powerful cluster seen so far.
    pub fn biggest(&self) -> Option<(&ScanInfo, &Cluster)> {
        self.biggest.as_ref().map(|(info, c)| (info, c))
    }

    /// The hottest cluster seen so far.
    pub fn hottest(&self) -> Option<(&ScanInfo, &Cluster)> {
        self.hottest.as_ref().map(|(info, c)| (info, c))
    }

    /// The number of clusters counted.
    pub fn num_clusters(&self) -> u32 {
        self.num_clusters
    }

    /// Counts of clusters with power less than 1 MW, 10 MW, 100 MW, 1 GW, 10 GW, and 100 GW.
    pub fn power_counts(&self) -> [u32; 6] {
        [
            self.num_power_lt_1mw,
            self.num_power_lt_10mw,
            self.num_power_lt_100mw,
            self.num_power_lt_1gw,
            self.num_power_lt_10gw,
            self.num_power_lt_100gw,
        ]
    }
}

fn write_cluster(f: &mut fmt::Formatter, title: &str, info: &ScanInfo, c: &Cluster) -> fmt::Result {
    let centroid = c.centroid();

    writeln!(f, "{:>15}:", title)?;
    writeln!(f, "      satellite: {}", info.satellite)?;
    writeln!(f, "         sector: {}", info.sector)?;
    writeln!(f, "          start: {}", info.start)?;
    writeln!(f, "            end: {}", info.end)?;
    writeln!(f, "            Lat: {:10.6}", centroid.lat)?;
    writeln!(f, "            Lon: {:11.6}", centroid.lon)?;
    writeln!(f, " Max Scan Angle: {:3.0}", c.max_scan_angle())?;
    writeln!(f, "          Count: {:2}", c.pixel_count())?;
    writeln!(f, "          Power: {:5.0} MW", c.total_power())?;
    writeln!(
        f,
        "           Area: {:5.0} square kilometers",
        c.total_area() / (1000.0 * 1000.0)
    )?;
    writeln!(f, "Max Temperature: {:5.0} Kelvin", c.max_temperature())
}

impl Display for ClusterStats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (biggest, hottest) = match (&self.biggest, &self.hottest) {
            (Some(biggest), Some(hottest)) => (biggest, hottest),
            _ => return writeln!(f, "No new clusters added to the database."),
        };

        writeln!(f, "Individual Cluster Stats")?;
        writeln!(f)?;
        write_cluster(f, "Most Powerful", &biggest.0, &biggest.1)?;
        writeln!(f)?;
        write_cluster(f, "Hottest", &hottest.0, &hottest.1)?;
        writeln!(f)?;

        let labels = [
            "  1 MW", " 10 MW", "100 MW", "  1 GW", " 10 GW", "100 GW",
        ];
        let counts = self.power_counts();

        writeln!(f, "        Counts:")?;
        writeln!(f, "         Total: {:10}", self.num_clusters)?;
        for (label, count) in labels.iter().zip(counts) {
            writeln!(f, "Power < {}: {:10}", label, count)?;
        }
        writeln!(f)?;
        for (label, count) in labels.iter().zip(counts) {
            writeln!(f, "  Pct < {}: {:10}%", label, count * 100 / self.num_clusters)?;
        }

        Ok(())
    }
}

/*-------------------------------------------------------------------------------------------------
 *                                      Cluster List Stats
 *-----------------------------------------------------------------------------------------------*/
/// Summary statistics of whole scans.
#[derive(Debug, Clone)]
pub struct ClusterListStats {
    min_num_clusters: u32,
    min_num_clusters_scan: Option<ScanInfo>,
    max_num_clusters: u32,
    max_num_clusters_scan: Option<ScanInfo>,
    min_total_power: f64,
    min_total_power_scan: Option<ScanInfo>,
    max_total_power: f64,
    max_total_power_scan: Option<ScanInfo>,
}

impl Default for ClusterListStats {
    fn default() -> Self {
        ClusterListStats {
            min_num_clusters: u32::MAX,
            min_num_clusters_scan: None,
            max_num_clusters: 0,
            max_num_clusters_scan: None,
            min_total_power: f64::INFINITY,
            min_total_power_scan: None,
            max_total_power: 0.0,
            max_total_power_scan: None,
        }
    }
}

impl ClusterListStats {
    /// Add the statistics of a scan.
    pub fn update(&mut self, clist: &ClusterList) {
        let info = ScanInfo::from_list(clist);
        let num_clust = u32::try_from(clist.len()).unwrap_or(u32::MAX);

        if num_clust > self.max_num_clusters {
            self.max_num_clusters = num_clust;
            self.max_num_clusters_scan = Some(info);
        }

        if num_clust < self.min_num_clusters {
            self.min_num_clusters = num_clust;
            self.min_num_clusters_scan = Some(info);
        }

        let total_power = clist.total_power();
        if total_power > self.max_total_power {
            self.max_total_power = total_power;
            self.max_total_power_scan = Some(info);
        }

        if total_power < self.min_total_power {
            self.min_total_power = total_power;
            self.min_total_power_scan = Some(info);
        }
    }

    /// The scan with the fewest clusters, and that count.
    pub fn min_num_clusters(&self) -> Option<(&ScanInfo, u32)> {
        self.min_num_clusters_scan
            .as_ref()
            .map(|info| (info, self.min_num_clusters))
    }

    /// The scan with the most clusters, and that count.
    pub fn max_num_clusters(&self) -> Option<(&ScanInfo, u32)> {
        self.max_num_clusters_scan
            .as_ref()
            .map(|info| (info, self.max_num_clusters))
    }

    /// The scan with the least total power, and that power in megawatts.
    pub fn min_total_power(&self) -> Option<(&ScanInfo, f64)> {
        self.min_total_power_scan
            .as_ref()
            .map(|info| (info, self.min_total_power))
    }

    /// The scan with the most total power, and that power in megawatts.
    pub fn max_total_power(&self) -> Option<(&ScanInfo, f64)> {
        self.max_total_power_scan
            .as_ref()
            .map(|info| (info, self.max_total_power))
    }
}

impl Display for ClusterListStats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some((info, power)) = self.max_total_power() {
            writeln!(f, "Max Image Power Stats:")?;
            writeln!(f, "    scan: {}", info)?;
            writeln!(f, "    Max Total Power: {:.0} GW", power / 1000.0)?;
        }

        if let Some((info, power)) = self.min_total_power() {
            writeln!(f, "Min Image Power Stats:")?;
            writeln!(f, "    scan: {}", info)?;
            writeln!(f, "    Min Total Power: {:.0} MW", power)?;
        }

        if let Some((info, num)) = self.max_num_clusters() {
            writeln!(f, "Max Image Number Clusters:")?;
            writeln!(f, "    scan: {}", info)?;
            writeln!(f, "    Total Clusters: {}", num)?;
        }

        if let Some((info, num)) = self.min_num_clusters() {
            writeln!(f, "Min Image Number Clusters:")?;
            writeln!(f, "    scan: {}", info)?;
            writeln!(f, "    Total Clusters: {}", num)?;
        }

        Ok(())
    }
}
