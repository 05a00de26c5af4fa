/*!
 * Turn a stream of satellite images into stored clusters.
 *
 * A producer thread feeds images to a pool of workers that find the clusters, and a single
 * writer thread stores them. The stages are connected by bounded channels.
 */
use crate::{
    cluster::{ClusterList, ClusterListStats, ClusterStats, MAX_SCAN_ANGLE},
    database::ClusterDatabase,
    firesatimage::FireSatImage,
    satellite::{parse_satellite_description_from_file_name, Satellite, Sector},
    FireTrackResult,
};
use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, info, warn};
use rustc_hash::FxHashMap as HashMap;
use std::{
    fmt::{self, Display},
    thread::{self, JoinHandle},
};
use strum::IntoEnumIterator;

/// A satellite image that can be handed off to another thread.
pub type SendFireSatImage = Box<dyn FireSatImage + Send>;

/// Configuration for [run_find_fire_pipeline].
#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    /// The capacity of each of the channels between stages.
    pub channel_size: usize,
    /// The number of threads finding clusters.
    pub num_workers: usize,
    /// Clusters with a scan angle at or above this are not stored.
    pub max_scan_angle: f64,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        PipelineOptions {
            channel_size: 100,
            num_workers: num_cpus::get(),
            max_scan_angle: MAX_SCAN_ANGLE,
        }
    }
}

/// Somewhere to put the clusters found by the pipeline.
pub trait ClusterSink {
    /// Store all the clusters from a single scan.
    fn store(&mut self, clist: ClusterList) -> FireTrackResult<()>;
}

impl ClusterSink for ClusterDatabase {
    fn store(&mut self, clist: ClusterList) -> FireTrackResult<()> {
        self.prepare_to_add_clusters()?.add(clist)
    }
}

impl ClusterSink for Vec<ClusterList> {
    fn store(&mut self, clist: ClusterList) -> FireTrackResult<()> {
        self.push(clist);
        Ok(())
    }
}

/**
 * Decides which images still need to be analyzed by checking what is already in the cluster
 * database.
 *
 * Use it to filter the sources handed to [run_find_fire_pipeline], then the checks run lazily on
 * the producer thread.
 */
pub struct SkipStoredScans {
    db: ClusterDatabase,
    newest: Option<HashMap<(Satellite, Sector), DateTime<Utc>>>,
}

impl SkipStoredScans {
    /// Skip scans already in `db`.
    ///
    /// If `only_new` is set, also skip any scan that doesn't start after the newest scan stored
    /// for its satellite and sector.
    pub fn new(db: ClusterDatabase, only_new: bool) -> FireTrackResult<Self> {
        let newest = if only_new {
            let mut newest = HashMap::default();
            for sat in Satellite::iter() {
                for sector in Sector::iter() {
                    let latest = db.newest_scan_start(sat, sector)?;
                    debug!(target: sat.name(), "Latest {} scan is {}", sector, latest);
                    newest.insert((sat, sector), latest);
                }
            }
            Some(newest)
        } else {
            None
        };

        Ok(SkipStoredScans { db, newest })
    }

    /// Should this image be analyzed?
    ///
    /// Images with file names that can't be parsed are skipped. If the database can't be queried
    /// the image is kept.
    pub fn keep(&mut self, image: &dyn FireSatImage) -> bool {
        let fname = image.file_name();

        let (sat, sector, start, end) = match parse_satellite_description_from_file_name(fname) {
            Ok(desc) => desc,
            Err(err) => {
                warn!(target: "producer", "Skipping {}: {}", fname, err);
                return false;
            }
        };

        if let Some(newest) = self.newest.as_ref().and_then(|n| n.get(&(sat, sector))) {
            // Only whole seconds are stored.
            if start.timestamp() <= newest.timestamp() {
                return false;
            }
        }

        let present = self
            .db
            .prepare_to_query_clusters_present()
            .and_then(|mut query| query.present(sat, sector, start, end));

        match present {
            Ok(present) => !present,
            Err(err) => {
                warn!(
                    target: sat.name(),
                    "Error checking for {}, processing anyway: {}",
                    fname,
                    err
                );
                true
            }
        }
    }
}

/// What happened during a run of the pipeline.
#[derive(Debug, Clone, Default)]
pub struct PipelineSummary {
    pub cluster_stats: ClusterStats,
    pub list_stats: ClusterListStats,
    /// Scans stored in the sink.
    pub num_stored: usize,
    /// Scans that could not be turned into clusters.
    pub num_errors: usize,
    /// Scans the sink failed to store.
    pub num_store_errors: usize,
}

impl Display for PipelineSummary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{}", self.cluster_stats)?;
        writeln!(f, "{}", self.list_stats)?;
        writeln!(f, "  Scans stored: {:10}", self.num_stored)?;
        writeln!(f, "   Scan errors: {:10}", self.num_errors)?;
        writeln!(f, "  Store errors: {:10}", self.num_store_errors)
    }
}

/**
 * Find the clusters in every image from `sources` and store them in `sink`.
 *
 * Images that can't be analyzed and lists the sink fails to store are logged and counted, they
 * don't stop the pipeline.
 *
 * # Returns
 * The sink, so it can be used again, and a summary of the run.
 */
pub fn run_find_fire_pipeline<I, S>(
    sources: I,
    sink: S,
    options: &PipelineOptions,
) -> FireTrackResult<(S, PipelineSummary)>
where
    I: IntoIterator<Item = SendFireSatImage> + Send + 'static,
    S: ClusterSink + Send + 'static,
{
    let (to_workers, from_producer) = bounded(options.channel_size);
    let (to_writer, from_workers) = bounded(options.channel_size);

    let producer = start_producer_thread(sources, to_workers)?;

    let mut workers = Vec::with_capacity(options.num_workers.max(1));
    for i in 0..options.num_workers.max(1) {
        workers.push(start_worker_thread(
            i,
            from_producer.clone(),
            to_writer.clone(),
        )?);
    }
    // The workers hold the only copies now, so the channels close when they finish.
    drop(from_producer);
    drop(to_writer);

    let writer = start_writer_thread(from_workers, sink, options.max_scan_angle)?;

    producer.join().map_err(|_| "producer thread panicked")?;
    for worker in workers {
        worker.join().map_err(|_| "cluster worker thread panicked")?;
    }

    Ok(writer.join().map_err(|_| "writer thread panicked")?)
}

fn start_producer_thread<I>(
    sources: I,
    to_workers: Sender<SendFireSatImage>,
) -> FireTrackResult<JoinHandle<()>>
where
    I: IntoIterator<Item = SendFireSatImage> + Send + 'static,
{
    let jh = thread::Builder::new()
        .name("findfire-producer".to_owned())
        .spawn(move || {
            for image in sources {
                debug!(target: "producer", "Processing {}", image.file_name());
                if to_workers.send(image).is_err() {
                    warn!(target: "producer", "Workers hung up early.");
                    break;
                }
            }
        })?;

    Ok(jh)
}

fn start_worker_thread(
    id: usize,
    from_producer: Receiver<SendFireSatImage>,
    to_writer: Sender<ClusterList>,
) -> FireTrackResult<JoinHandle<()>> {
    let jh = thread::Builder::new()
        .name(format!("findfire-cluster-{}", id))
        .spawn(move || {
            for image in from_producer {
                let clist = ClusterList::from_fire_sat_image(&*image)
                    .filter(|clust| clust.is_keeper());

                if to_writer.send(clist).is_err() {
                    warn!(target: "cluster", "Writer hung up early.");
                    break;
                }
            }
        })?;

    Ok(jh)
}

fn start_writer_thread<S>(
    from_workers: Receiver<ClusterList>,
    mut sink: S,
    max_scan_angle: f64,
) -> FireTrackResult<JoinHandle<(S, PipelineSummary)>>
where
    S: ClusterSink + Send + 'static,
{
    let jh = thread::Builder::new()
        .name("findfire-writer".to_owned())
        .spawn(move || {
            let mut summary = PipelineSummary::default();

            for clist in from_workers {
                if let Some(msg) = clist.err_msg() {
                    warn!(
                        target: "writer",
                        "Skipping {} {} scan at {}: {}",
                        clist.satellite(),
                        clist.sector(),
                        clist.scan_start(),
                        msg
                    );
                    summary.num_errors += 1;
                    continue;
                }

                let clist = clist.filter_scan_angle(max_scan_angle);

                summary.cluster_stats.update(&clist, max_scan_angle);
                summary.list_stats.update(&clist);

                let sat = clist.satellite();
                let start = clist.scan_start();
                match sink.store(clist) {
                    Ok(()) => summary.num_stored += 1,
                    Err(err) => {
                        warn!(target: sat.name(), "Error storing scan at {}: {}", start, err);
                        summary.num_store_errors += 1;
                    }
                }
            }

            info!(target: "writer", "Stored {} scans.", summary.num_stored);

            (sink, summary)
        })?;

    Ok(jh)
}
