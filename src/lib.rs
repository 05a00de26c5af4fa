pub use cluster::{
    Cluster, ClusterList, ClusterListStats, ClusterStats, ScanInfo, MAX_SCAN_ANGLE,
};
pub use database::{
    ClusterDatabase, ClusterDatabaseAddCluster, ClusterDatabaseClusterRow,
    ClusterDatabaseQueryClusterPresent, ClusterDatabaseQueryClusters, FiresDatabase,
    FiresDatabaseAddFire, FiresDatabaseQueryFires,
};
pub use error::{ConnectFireError, FindFireError};
pub use fire::{Fire, FireList, FireListUpdateResult};
pub use firepoint::FirePoint;
pub use firesatimage::{FirePointFile, FireSatImage};
pub use geo::{BoundingBox, Coord, Geo, IntersectResult, Line};
pub use pipeline::{
    run_find_fire_pipeline, ClusterSink, PipelineOptions, PipelineSummary, SendFireSatImage,
    SkipStoredScans,
};
pub use pixel::{Pixel, PixelList};
pub use satellite::{
    parse_satellite_description_from_file_name, DataQualityFlagCode, MaskCode, Satellite, Sector,
};
pub use tracker::{FireTracker, TrackerOptions, TrackerResults, TrackerStats};

/// Generic error type used throughout the crate.
pub type FireTrackError = Box<dyn std::error::Error + Send + Sync>;

/// Result type used throughout the crate.
pub type FireTrackResult<T> = Result<T, FireTrackError>;

/**************************************************************************************************
 * Private Implementation
 *************************************************************************************************/
mod cluster;
mod database;
mod error;
mod fire;
mod firepoint;
mod firesatimage;
mod geo;
mod pipeline;
mod pixel;
mod satellite;
mod tracker;
