use chrono::{DateTime, Utc};
use clap::Parser;
use firetrack::{
    BoundingBox, ClusterDatabase, Coord, FireList, FireTrackResult, FireTracker, FiresDatabase,
    FiresDatabaseAddFire, Satellite, TrackerOptions, TrackerResults, TrackerStats,
};
use log::{error, info, LevelFilter};
use simple_logger::SimpleLogger;
use std::{
    fmt::{self, Display},
    path::PathBuf,
    sync::{atomic::AtomicU64, Arc},
    thread::{self, JoinHandle},
};
use strum::IntoEnumIterator;

/// The number of cluster rows to process before saving the fires that are finished.
const BATCH_SIZE: usize = 100_000;

const WHOLE_EARTH: BoundingBox = BoundingBox {
    ll: Coord {
        lat: -90.0,
        lon: -180.0,
    },
    ur: Coord {
        lat: 90.0,
        lon: 180.0,
    },
};

/*-------------------------------------------------------------------------------------------------
 *                                     Command Line Options
 *-----------------------------------------------------------------------------------------------*/

///
/// Connect clusters into wildfires.
///
/// This program replays the clusters in the cluster database through time, connecting clusters
/// that touch each other into wildfires. It picks up where the last run left off.
///
#[derive(Debug, Parser)]
#[clap(bin_name = "connectfire")]
#[clap(author, version, about)]
struct ConnectFireOptionsInit {
    /// The path to the cluster database file.
    ///
    /// If this is not specified, then the program will check for it in the "CLUSTER_DB"
    /// environment variable.
    #[clap(short, long)]
    #[clap(env = "CLUSTER_DB")]
    cluster_store: PathBuf,

    /// The path to the fires database file.
    ///
    /// If this is not specified, then the program will check for it in the "FIRES_DB"
    /// environment variable.
    #[clap(short, long)]
    #[clap(env = "FIRES_DB")]
    fire_store: PathBuf,

    /// Fires with this many pixels are considered noise and dropped from tracking.
    #[clap(long, default_value_t = 1_000)]
    max_fire_pixels: usize,

    /// Fires that burned for less than this many hours are not saved.
    #[clap(long, default_value_t = 1)]
    min_duration_hours: i64,

    /// Verbose output
    #[clap(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone)]
struct ConnectFireOptionsChecked {
    /// The path to the cluster database file.
    cluster_store: PathBuf,

    /// The path to the fires database file.
    fire_store: PathBuf,

    /// The retention policy for the trackers.
    tracker: TrackerOptions,

    /// Verbose output
    verbose: bool,
}

impl Display for ConnectFireOptionsChecked {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        writeln!(f, "\n")?; // yes, two blank lines.
        writeln!(f, "  Cluster Database: {}", self.cluster_store.display())?;
        writeln!(f, "    Fires Database: {}", self.fire_store.display())?;
        writeln!(f, "   Max Fire Pixels: {}", self.tracker.max_fire_pixels)?;
        writeln!(
            f,
            "Min Duration Saved: {} hours",
            self.tracker.min_duration_to_store.num_hours()
        )?;
        writeln!(f, "\n")?; // yes, two blank lines.

        Ok(())
    }
}

/// Get the command line arguments and check them.
///
/// If there is missing data, try to fill it in with environment variables.
fn parse_args() -> FireTrackResult<ConnectFireOptionsChecked> {
    let ConnectFireOptionsInit {
        cluster_store,
        fire_store,
        max_fire_pixels,
        min_duration_hours,
        verbose,
    } = ConnectFireOptionsInit::parse();

    if min_duration_hours < 0 {
        return Err("min-duration-hours cannot be negative".into());
    }

    let tracker = TrackerOptions {
        max_fire_pixels,
        min_duration_to_store: chrono::Duration::hours(min_duration_hours),
        ..TrackerOptions::default()
    };

    Ok(ConnectFireOptionsChecked {
        cluster_store,
        fire_store,
        tracker,
        verbose,
    })
}

/*-------------------------------------------------------------------------------------------------
 *                                             MAIN
 *-----------------------------------------------------------------------------------------------*/
fn main() -> FireTrackResult<()> {
    let opts = parse_args()?;

    let level = if opts.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    SimpleLogger::new().with_level(level).init()?;

    if opts.verbose {
        info!("{}", opts);
    }

    // Make sure the schemas exist before the threads start connecting.
    ClusterDatabase::initialize(&opts.cluster_store)?;
    FiresDatabase::initialize(&opts.fire_store)?;

    let next_id = FiresDatabase::connect(&opts.fire_store)?.next_wildfire_id()?;
    let next_id = Arc::new(AtomicU64::new(next_id));

    let handles = Satellite::iter()
        .map(|sat| start_tracking_thread(sat, opts.clone(), next_id.clone()))
        .collect::<FireTrackResult<Vec<_>>>()?;

    for (sat, jh) in handles {
        match jh.join() {
            Ok(Ok(stats)) => info!(target: sat.name(), "{}", stats),
            Ok(Err(err)) => error!(target: sat.name(), "Error tracking fires: {}", err),
            Err(_) => error!(target: sat.name(), "Tracking thread panicked."),
        }
    }

    Ok(())
}

fn start_tracking_thread(
    sat: Satellite,
    opts: ConnectFireOptionsChecked,
    next_id: Arc<AtomicU64>,
) -> FireTrackResult<(Satellite, JoinHandle<FireTrackResult<TrackerStats>>)> {
    let jh = thread::Builder::new()
        .name(format!("connectfire-{}", sat.name()))
        .spawn(move || track_satellite(sat, &opts, next_id))?;

    Ok((sat, jh))
}

fn track_satellite(
    sat: Satellite,
    opts: &ConnectFireOptionsChecked,
    next_id: Arc<AtomicU64>,
) -> FireTrackResult<TrackerStats> {
    let fires_db = FiresDatabase::connect(&opts.fire_store)?;
    let ongoing = fires_db.ongoing_fires(sat, &opts.tracker)?;
    let start = fires_db
        .last_observed(sat)?
        .unwrap_or(DateTime::<Utc>::MIN_UTC);

    info!(target: sat.name(), "Resuming {} fires, starting at {}", ongoing.len(), start);

    let cluster_db = ClusterDatabase::connect(&opts.cluster_store)?;
    let mut query = cluster_db.query_clusters(
        Some(sat),
        None,
        start,
        DateTime::<Utc>::MAX_UTC,
        WHOLE_EARTH,
    )?;
    let mut rows = query.rows()?;

    let mut add = fires_db.prepare_to_add_fires()?;
    let mut tracker = FireTracker::new(sat, next_id, ongoing, opts.tracker);

    loop {
        let num_rows = tracker.process_rows(rows.by_ref().take(BATCH_SIZE), None)?;

        let (old_fires, associations) = tracker.take_old_fires();
        store_fires(sat, &mut add, &old_fires, associations, &opts.tracker)?;

        if num_rows < BATCH_SIZE {
            break;
        }
    }

    let TrackerResults {
        fires,
        associations,
        stats,
    } = tracker.finish();
    store_fires(sat, &mut add, &fires, associations, &opts.tracker)?;

    Ok(stats)
}

fn store_fires(
    sat: Satellite,
    add: &mut FiresDatabaseAddFire,
    fires: &FireList,
    associations: Vec<(u64, u64)>,
    opts: &TrackerOptions,
) -> FireTrackResult<()> {
    for (fire_id, cluster_id) in associations {
        add.add_association(fire_id, cluster_id);
    }

    let num_stored = add.add_fires(fires, opts.min_duration_to_store)?;
    info!(target: sat.name(), "Saved {} of {} fires.", num_stored, fires.len());

    Ok(())
}
