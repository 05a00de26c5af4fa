/*!
 * Types and functions for working with clusters.
 *
 * A cluster describes the aggregate properties of a connected group (or cluster) of FirePoint
 * objects from a single satellite scan.
 */

pub use cluster::Cluster;
pub use cluster_list::ClusterList;
pub use cluster_stats::{ClusterListStats, ClusterStats, ScanInfo, MAX_SCAN_ANGLE};

#[allow(clippy::module_inception)]
mod cluster;
mod cluster_list;
mod cluster_stats;
