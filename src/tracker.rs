/*!
 * Connect clusters through time to track wildfires.
 *
 * Cluster rows from a single satellite are replayed in order of scan start time. Each row either
 * updates a fire it touches or starts a new one. Every time the scan time changes, fires that
 * have grown into each other are merged and fires that have burned out are retired.
 */
use crate::{
    database::ClusterDatabaseClusterRow,
    fire::{Fire, FireList, FireListUpdateResult},
    satellite::Satellite,
    ConnectFireError, FireTrackResult,
};
use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use std::{
    fmt::{self, Display},
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
};

/// Knobs for deciding how long to keep fires around and which ones to keep at all.
#[derive(Debug, Clone, Copy)]
pub struct TrackerOptions {
    /// Fires seen more recently than this are never retired.
    pub min_retention: Duration,
    /// Fires not seen for longer than this are always retired.
    pub max_retention: Duration,
    /// A fire with this many pixels is assumed to be noise and retired.
    pub max_fire_pixels: usize,
    /// Fires that burned for less time than this are not stored.
    pub min_duration_to_store: Duration,
    /// How far back from the most recent observation to look for fires to resume tracking.
    pub resume_window: Duration,
}

impl Default for TrackerOptions {
    fn default() -> Self {
        TrackerOptions {
            min_retention: Duration::hours(6),
            max_retention: Duration::days(30),
            max_fire_pixels: 1_000,
            min_duration_to_store: Duration::hours(1),
            resume_window: Duration::days(175),
        }
    }
}

/*-------------------------------------------------------------------------------------------------
 *                                    Stats for this run.
 *-----------------------------------------------------------------------------------------------*/
/// The record holders among the fires that were tracked.
#[derive(Debug, Clone, Default)]
pub struct TrackerStats {
    longest: Option<Fire>,
    most_powerful: Option<Fire>,
    hottest: Option<Fire>,
}

impl TrackerStats {
    /// Check a list of fires for new record holders.
    pub fn update(&mut self, fires: &FireList) {
        for fire in fires.iter() {
            if self
                .longest
                .as_ref()
                .map(|f| fire.duration() > f.duration())
                .unwrap_or(true)
            {
                self.longest = Some(fire.clone());
            }

            if self
                .most_powerful
                .as_ref()
                .map(|f| fire.max_power() > f.max_power())
                .unwrap_or(true)
            {
                self.most_powerful = Some(fire.clone());
            }

            if self
                .hottest
                .as_ref()
                .map(|f| fire.max_temperature() > f.max_temperature())
                .unwrap_or(true)
            {
                self.hottest = Some(fire.clone());
            }
        }
    }

    /// The fire that burned the longest.
    pub fn longest(&self) -> Option<&Fire> {
        self.longest.as_ref()
    }

    /// The fire with the highest power.
    pub fn most_powerful(&self) -> Option<&Fire> {
        self.most_powerful.as_ref()
    }

    /// The fire with the highest temperature.
    pub fn hottest(&self) -> Option<&Fire> {
        self.hottest.as_ref()
    }
}

impl Display for TrackerStats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let records = [
            ("Longest duration fire", &self.longest),
            ("Most powerful fire", &self.most_powerful),
            ("Hottest fire", &self.hottest),
        ];

        for (title, fire) in records {
            if let Some(fire) = fire {
                writeln!(f, "\n{}:", title)?;
                write!(f, "{}", fire)?;
            }
        }

        Ok(())
    }
}

/*-------------------------------------------------------------------------------------------------
 *                                         Fire Tracker
 *-----------------------------------------------------------------------------------------------*/
/// Everything produced by a [FireTracker] once it is finished.
#[derive(Debug)]
pub struct TrackerResults {
    /// Every fire that was touched, including ones merged into others.
    pub fires: FireList,
    /// Pairs of (fire id, cluster row id).
    pub associations: Vec<(u64, u64)>,
    /// The record holders.
    pub stats: TrackerStats,
}

/**
 * Tracks the fires for a single satellite.
 *
 * Fires live in one of three lists. Fires started during the current scan time are kept in the
 * new list so they aren't matched by other clusters from the same scan. The current list holds
 * the fires still being tracked, and the old list holds fires that were merged away or retired.
 */
#[derive(Debug)]
pub struct FireTracker {
    sat: Satellite,
    current_fires: FireList,
    new_fires: FireList,
    old_fires: FireList,
    current_time_step: Option<DateTime<Utc>>,
    next_id: Arc<AtomicU64>,
    num_absorbed: usize,
    associations: Vec<(u64, u64)>,
    stats: TrackerStats,
    options: TrackerOptions,
}

impl FireTracker {
    /**
     * Start tracking fires for a satellite.
     *
     * # Arguments
     * sat - the satellite all the rows will come from.
     * next_id - the source of ids for new fires, it may be shared between trackers.
     * ongoing - fires from a previous run to resume tracking.
     * options - the retention policy.
     */
    pub fn new(
        sat: Satellite,
        next_id: Arc<AtomicU64>,
        ongoing: FireList,
        options: TrackerOptions,
    ) -> Self {
        FireTracker {
            sat,
            current_fires: ongoing,
            new_fires: FireList::new(),
            old_fires: FireList::new(),
            current_time_step: None,
            next_id,
            num_absorbed: 0,
            associations: vec![],
            stats: TrackerStats::default(),
            options,
        }
    }

    /// The satellite this tracker is for.
    pub fn satellite(&self) -> Satellite {
        self.sat
    }

    /// The next id that will be handed out to a new fire.
    pub fn next_id(&self) -> u64 {
        self.next_id.load(Ordering::SeqCst)
    }

    /**
     * Process a stream of cluster rows ordered by scan start time.
     *
     * The `cancel` flag is checked every time the scan time changes. If it is set processing
     * stops there, the row that started the new scan time is not processed.
     *
     * # Returns
     * The number of rows processed.
     */
    pub fn process_rows<I>(
        &mut self,
        rows: I,
        cancel: Option<&AtomicBool>,
    ) -> FireTrackResult<usize>
    where
        I: IntoIterator<Item = FireTrackResult<ClusterDatabaseClusterRow>>,
    {
        let mut num_rows = 0;

        for row in rows {
            let row = row?;

            if Some(row.start) != self.current_time_step
                && cancel.map(|c| c.load(Ordering::Relaxed)).unwrap_or(false)
            {
                info!(target: self.sat.name(), "Cancelled after {} rows.", num_rows);
                break;
            }

            self.process_row(row)?;
            num_rows += 1;
        }

        Ok(num_rows)
    }

    /// Process a single cluster row.
    ///
    /// It is an error to process a row with a scan start earlier than the last one.
    pub fn process_row(&mut self, row: ClusterDatabaseClusterRow) -> FireTrackResult<()> {
        assert_eq!(row.sat, self.sat, "cluster row from the wrong satellite");

        match self.current_time_step {
            Some(step) if row.start < step => {
                return Err(ConnectFireError {
                    msg: "cluster rows out of order",
                }
                .into());
            }
            Some(step) if row.start != step => {
                self.advance_time_step(step);
                self.current_time_step = Some(row.start);
            }
            None => self.current_time_step = Some(row.start),
            Some(_) => {}
        }

        let rowid = row.rowid;
        match self.current_fires.update(row) {
            FireListUpdateResult::Match(id) => {
                self.num_absorbed += 1;
                self.associations.push((id, rowid));
            }
            FireListUpdateResult::NoMatch(row) => {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                self.new_fires.create_add_fire(id, row);
                self.associations.push((id, rowid));
            }
        }

        Ok(())
    }

    fn advance_time_step(&mut self, step: DateTime<Utc>) {
        let num_merged = self.current_fires.merge_fires(&mut self.old_fires);
        let num_old =
            self.current_fires
                .drain_stale_fires(&mut self.old_fires, step, &self.options);
        let num_new = self.current_fires.extend(&mut self.new_fires);

        debug!(
            target: self.sat.name(),
            "Absorbed = {:4} Merged = {:4} Aged out = {:4} New = {:4} at {}",
            self.num_absorbed,
            num_merged,
            num_old,
            num_new,
            step
        );

        self.num_absorbed = 0;
    }

    /// Take the fires that are finished, so they can be stored.
    ///
    /// This also takes the associations recorded so far.
    pub fn take_old_fires(&mut self) -> (FireList, Vec<(u64, u64)>) {
        self.stats.update(&self.old_fires);

        (
            std::mem::take(&mut self.old_fires),
            std::mem::take(&mut self.associations),
        )
    }

    /// Wrap up tracking, every fire still being tracked is returned as well.
    pub fn finish(mut self) -> TrackerResults {
        info!(
            target: self.sat.name(),
            "Run Summary: Old Fires = {} Current Fires = {} New Fires = {}",
            self.old_fires.len(),
            self.current_fires.len(),
            self.new_fires.len()
        );

        self.current_fires.merge_fires(&mut self.old_fires);
        self.old_fires.extend(&mut self.current_fires);
        self.old_fires.extend(&mut self.new_fires);

        self.stats.update(&self.old_fires);

        TrackerResults {
            fires: self.old_fires,
            associations: self.associations,
            stats: self.stats,
        }
    }
}
