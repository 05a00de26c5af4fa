use clap::Parser;
use firetrack::{
    run_find_fire_pipeline, ClusterDatabase, FirePointFile, FireTrackResult, PipelineOptions,
    SendFireSatImage, SkipStoredScans, MAX_SCAN_ANGLE,
};
use log::{info, warn, LevelFilter};
use simple_logger::SimpleLogger;
use std::{
    fmt::{self, Display},
    path::PathBuf,
};

/*-------------------------------------------------------------------------------------------------
 *                                     Command Line Options
 *-----------------------------------------------------------------------------------------------*/

///
/// Group individual satellite pixels showing wildfire into connected clusters.
///
/// This program reads fire point listings extracted from GOES Fire Detection Characteristics
/// scans, groups adjacent pixels into clusters, and stores them in the cluster database. Scans
/// already in the database are skipped.
///
#[derive(Debug, Parser)]
#[clap(bin_name = "findfire")]
#[clap(author, version, about)]
struct FindFireOptionsInit {
    /// The path to the cluster database file.
    ///
    /// If this is not specified, then the program will check for it in the "CLUSTER_DB"
    /// environment variable.
    #[clap(short, long)]
    #[clap(env = "CLUSTER_DB")]
    cluster_store: PathBuf,

    /// Only process scans newer than what's already in the database for each satellite and
    /// sector.
    #[clap(short, long)]
    new: bool,

    /// Clusters with a scan angle at or above this are not stored.
    #[clap(long, default_value_t = MAX_SCAN_ANGLE)]
    max_scan_angle: f64,

    /// The number of threads to use finding clusters, defaults to the number of CPUs.
    #[clap(long)]
    workers: Option<usize>,

    /// Verbose output
    #[clap(short, long)]
    verbose: bool,

    /// The fire point listings to process.
    #[clap(required = true)]
    files: Vec<PathBuf>,
}

#[derive(Debug)]
struct FindFireOptionsChecked {
    /// The path to the cluster database file.
    cluster_store: PathBuf,

    /// Only process new scans.
    only_new: bool,

    /// Pipeline configuration.
    pipeline: PipelineOptions,

    /// Verbose output
    verbose: bool,

    /// The files to process.
    files: Vec<PathBuf>,
}

impl Display for FindFireOptionsChecked {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        writeln!(f, "\n")?; // yes, two blank lines.
        writeln!(f, "Cluster Database: {}", self.cluster_store.display())?;
        writeln!(f, "        Only New: {}", if self.only_new { "yes" } else { "no" })?;
        writeln!(f, "  Max Scan Angle: {}", self.pipeline.max_scan_angle)?;
        writeln!(f, "         Workers: {}", self.pipeline.num_workers)?;
        writeln!(f, "           Files: {}", self.files.len())?;
        writeln!(f, "\n")?; // yes, two blank lines.

        Ok(())
    }
}

/// Get the command line arguments and check them.
///
/// If there is missing data, try to fill it in with environment variables.
fn parse_args() -> FireTrackResult<FindFireOptionsChecked> {
    let FindFireOptionsInit {
        cluster_store,
        new,
        max_scan_angle,
        workers,
        verbose,
        files,
    } = FindFireOptionsInit::parse();

    if max_scan_angle.is_nan() || max_scan_angle <= 0.0 {
        return Err("max-scan-angle must be positive".into());
    }

    let mut pipeline = PipelineOptions {
        max_scan_angle,
        ..PipelineOptions::default()
    };

    if let Some(workers) = workers {
        if workers == 0 {
            return Err("workers must be at least 1".into());
        }
        pipeline.num_workers = workers;
    }

    Ok(FindFireOptionsChecked {
        cluster_store,
        only_new: new,
        pipeline,
        verbose,
        files,
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

    ClusterDatabase::initialize(&opts.cluster_store)?;

    let cluster_db = ClusterDatabase::connect(&opts.cluster_store)?;
    let mut skip = SkipStoredScans::new(cluster_db, opts.only_new)?;

    let sources = opts
        .files
        .into_iter()
        .filter_map(|path| match FirePointFile::open(&path) {
            Ok(img) => Some(Box::new(img) as SendFireSatImage),
            Err(err) => {
                warn!("Skipping {}: {}", path.display(), err);
                None
            }
        })
        .filter(move |img| skip.keep(&**img));

    let sink = ClusterDatabase::connect(&opts.cluster_store)?;
    let (_, summary) = run_find_fire_pipeline(sources, sink, &opts.pipeline)?;

    info!("{}", summary);

    if summary.cluster_stats.biggest().is_none() {
        warn!("No new clusters added to the database!");
    }

    Ok(())
}
