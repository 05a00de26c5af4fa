use crate::{
    database::ClusterDatabaseClusterRow,
    geo::{BoundingBox, Coord, Geo},
    pixel::PixelList,
    satellite::Satellite,
    tracker::TrackerOptions,
};
use chrono::{DateTime, Duration, Utc};
use std::{
    cell::Cell,
    fmt::{self, Display, Write},
};

const OVERLAP_FUDGE_FACTOR: f64 = 1.0e-5;

/**
 * The aggregate properties of a temporally connected group of [Cluster](crate::Cluster) objects.
 *
 * While the Clusters that make up a fire may come from any [Sector](crate::Sector) of a satellite
 * scan, they must come from the same [Satellite](crate::Satellite) because of the difficulty
 * associated with the different map projections and parallax. For each satellite the data is
 * reprojected onto the exact same grid every scan, so every image from a given satellite has the
 * exact same Pixel locations on the Earth's surface. As a result, aggregating values for maximum
 * power, area, or temperature is straight forward. Pixels from different satellites only
 * partially overlap, and there is no sensible way to combine them, so updating or merging across
 * satellites is a bug and panics.
 */
#[derive(Debug, Clone)]
pub struct Fire {
    /// The scan start time of the first Cluster where this fire was detected.
    first_observed: DateTime<Utc>,
    /// The scan end time of the last Cluster where this fire was detected.
    last_observed: DateTime<Utc>,
    /// The power of the most powerful Cluster that was associated with this fire. Several
    /// clusters may be associated with a fire at any given scan time, but their powers are NOT
    /// combined. This is the single most powerful Cluster aggregated into this fire.
    max_power: f64,
    /// The maximum temperature of any Pixel that was ever associated with this fire.
    max_temperature: f64,
    /// An unique ID number for this fire, also used to associate it with its Clusters.
    id: u64,
    /// Each Pixel in this contains the maximum power, area, and temperature observed in its
    /// area during the fire. This is a composite of the properties of the fire over its lifetime.
    area: PixelList,
    /// The satellite the Clusters that were a part of this fire were observed with.
    sat: Satellite,
    /// If this fire was merged into another, what was the identity of that fire. The value 0
    /// implies it has not yet been merged into another fire.
    merged_into: u64,

    /// Make a cache for items expensive to calculate.
    cache_up_to_date: Cell<bool>,
    /// Cache the centroid
    centroid: Cell<Coord>,
    /// Cache for Bounding Box
    bbox: Cell<BoundingBox>,
}

impl Display for Fire {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        let mut duration_buf = String::with_capacity(64);
        self.format_duration(&mut duration_buf);

        let centroid = self.centroid();

        writeln!(f, "               ID: {:9}", self.id)?;
        writeln!(f, "        Satellite: {}", self.sat)?;
        writeln!(f, "   First Observed: {}", self.first_observed)?;
        writeln!(f, "    Last Observed: {}", self.last_observed)?;
        writeln!(f, "         Duration: {}", duration_buf)?;
        writeln!(f, "         Centroid: {:.6},{:.6}", centroid.lat, centroid.lon)?;
        writeln!(f, "Pixel List Length: {}", self.area.len())?;
        writeln!(f, "        Max Power: {:.0} MW", self.max_power)?;
        writeln!(f, "  Max Temperature: {:.0}K", self.max_temperature)
    }
}

impl Fire {
    /// Create a new fire from the raw parts.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        first_observed: DateTime<Utc>,
        last_observed: DateTime<Utc>,
        max_power: f64,
        max_temperature: f64,
        id: u64,
        area: PixelList,
        sat: Satellite,
        merged_into: u64,
    ) -> Self {
        Fire {
            first_observed,
            last_observed,
            max_power,
            max_temperature,
            id,
            area,
            sat,
            merged_into,
            cache_up_to_date: Cell::new(false),
            centroid: Cell::new(Coord { lat: 0.0, lon: 0.0 }),
            bbox: Cell::new(BoundingBox::default()),
        }
    }

    /// Create a new fire from a cluster, the pixels of the cluster are moved into the fire.
    pub fn create_from_cluster(id: u64, initial: ClusterDatabaseClusterRow) -> Self {
        let fire = Self::new(
            initial.start,
            initial.end,
            initial.power,
            initial.max_temperature,
            id,
            initial.pixels,
            initial.sat,
            0,
        );

        // Use the centroid as stored rather than recalculating it.
        fire.bbox.set(fire.area.bounding_box());
        fire.centroid.set(initial.centroid);
        fire.cache_up_to_date.set(true);

        fire
    }

    /// Get the id number of the fire.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Get the id of the fire this was merged into.
    pub fn merged_into(&self) -> u64 {
        self.merged_into
    }

    /// Get the time this fire was first observed.
    pub fn first_observed(&self) -> DateTime<Utc> {
        self.first_observed
    }

    /// Get the last time this fire was observed.
    pub fn last_observed(&self) -> DateTime<Utc> {
        self.last_observed
    }

    /// Get the duration of this fire (as observed by the satellite).
    pub fn duration(&self) -> Duration {
        self.last_observed - self.first_observed
    }

    /// Get the maximum power observed for this fire, megawatts.
    pub fn max_power(&self) -> f64 {
        self.max_power
    }

    /// Get the max fire temperature observed on this fire, Kelvin.
    pub fn max_temperature(&self) -> f64 {
        self.max_temperature
    }

    /// Get access to the pixels in the wildfire.
    pub fn pixels(&self) -> &PixelList {
        &self.area
    }

    /// Get the satellite this fire was observed from.
    pub fn satellite(&self) -> Satellite {
        self.sat
    }

    /// Update a wildfire by adding the information in this ClusterDatabaseClusterRow to it.
    pub fn update(&mut self, row: &ClusterDatabaseClusterRow) {
        assert_eq!(row.sat, self.sat, "updating fire with cluster from another satellite");

        self.last_observed = row.end;
        self.max_power = self.max_power.max(row.power);
        self.max_temperature = self.max_temperature.max(row.max_temperature);

        self.invalidate_cache();
        self.area.max_merge(&row.pixels);
    }

    /**
     * Merge two wildfires.
     *
     * When this returns `self` holds the surviving fire and `right` the one absorbed into it. The
     * fire with more pixels survives, and on a tie the fire with the lower id (the older one).
     */
    fn merge_with(&mut self, right: &mut Self) {
        assert_eq!(self.sat, right.sat, "merging fires from different satellites");

        let right_survives = right.area.len() > self.area.len()
            || (right.area.len() == self.area.len() && right.id < self.id);
        if right_survives {
            std::mem::swap(self, right);
        }

        if right.first_observed < self.first_observed {
            self.first_observed = right.first_observed;
        }

        if right.last_observed > self.last_observed {
            self.last_observed = right.last_observed;
        }

        self.invalidate_cache();
        self.area.max_merge(&right.area);

        self.max_power = self.max_power.max(right.max_power);
        self.max_temperature = self.max_temperature.max(right.max_temperature);

        right.merged_into = self.id;
    }

    /// Format the duration in an easy to read way.
    pub fn format_duration(&self, buffer: &mut String) {
        buffer.clear();
        let duration = self.duration();
        let weeks = duration.num_weeks();
        if weeks > 0 {
            let _ = write!(buffer, "{} weeks ", weeks);
        }

        let days = duration.num_days() % 7;
        if days > 0 {
            let _ = write!(buffer, "{} days ", days);
        }

        let hours = duration.num_hours() % 24;
        let _ = write!(buffer, "{} hours", hours);
    }

    /// Check if this fire has likely burned out.
    ///
    /// A fire is stale if it is too big to be real, if it hasn't been seen in a very long time,
    /// or if it has been out longer than it burned.
    pub fn is_stale(&self, current_time: DateTime<Utc>, options: &TrackerOptions) -> bool {
        let duration_since_last_observed = current_time - self.last_observed;

        // If it got this big, it can't be real. It must be a "noise fire"
        if self.area.len() >= options.max_fire_pixels {
            return true;
        }

        // Minimum time to stick around.
        if duration_since_last_observed < options.min_retention {
            return false;
        }

        // Maximum time to stick around after being last observed.
        if duration_since_last_observed > options.max_retention {
            return true;
        }

        // If it's been out longer than it burned, let it go.
        self.duration() < duration_since_last_observed
    }

    fn update_cache(&self) {
        if !self.cache_up_to_date.get() {
            self.bbox.set(self.area.bounding_box());
            self.centroid.set(self.area.centroid());
            self.cache_up_to_date.set(true);
        }
    }

    fn invalidate_cache(&self) {
        self.cache_up_to_date.set(false)
    }
}

impl Geo for Fire {
    fn centroid(&self) -> Coord {
        self.update_cache();
        self.centroid.get()
    }

    fn bounding_box(&self) -> BoundingBox {
        self.update_cache();
        self.bbox.get()
    }
}

/*-------------------------------------------------------------------------------------------------
 *                                          Fire List
 *-----------------------------------------------------------------------------------------------*/
/// A list of [Fire] objects.
///
/// The order of the list is not meaningful, removing fires shuffles it.
#[derive(Debug, Clone, Default)]
pub struct FireList(Vec<Fire>);

/// The outcome of offering a cluster to a [FireList].
#[derive(Debug, Clone)]
pub enum FireListUpdateResult {
    /// No fire matched, so the row is handed back.
    NoMatch(ClusterDatabaseClusterRow),
    /// The row was absorbed into the fire with this id.
    Match(u64),
}

impl From<Vec<Fire>> for FireList {
    fn from(src: Vec<Fire>) -> Self {
        FireList(src)
    }
}

impl FireList {
    /// Create a new, empty list.
    pub fn new() -> Self {
        FireList(vec![])
    }

    /// Get a vector of fires
    pub fn into_vec(self) -> Vec<Fire> {
        self.0
    }

    /// Add a fire to the list.
    pub fn add_fire(&mut self, fire: Fire) {
        self.0.push(fire)
    }

    /// Create a new fire and add it to the list.
    pub fn create_add_fire(&mut self, id: u64, cluster_row: ClusterDatabaseClusterRow) {
        self.add_fire(Fire::create_from_cluster(id, cluster_row))
    }

    /**
     * Update the list with the provided cluster.
     *
     * Matches the cluster to the first wildfire in the list it is adjacent to or overlapping and
     * then updates that wildfire.
     *
     * # Returns
     *
     * [FireListUpdateResult::Match] with the id of the fire that absorbed the row, or
     * [FireListUpdateResult::NoMatch] to give the row back if no fire matched.
     */
    pub fn update(&mut self, row: ClusterDatabaseClusterRow) -> FireListUpdateResult {
        let cluster_pixels: &PixelList = &row.pixels;
        let cluster_bbox = cluster_pixels.bounding_box();

        for fire in self.0.iter_mut() {
            if cluster_bbox.overlap(&fire.bounding_box(), OVERLAP_FUDGE_FACTOR)
                && cluster_pixels.adjacent_to_or_overlaps(&fire.area, OVERLAP_FUDGE_FACTOR)
            {
                fire.update(&row);
                return FireListUpdateResult::Match(fire.id);
            }
        }

        FireListUpdateResult::NoMatch(row)
    }

    /// Extend a fire list using another fire list, the `src` list is left empty.
    ///
    /// Returns the number of items added to this list.
    pub fn extend(&mut self, src: &mut Self) -> usize {
        let src_sz = src.len();
        self.0.append(&mut src.0);
        src_sz
    }

    /**
     * Detect overlaps in the fires in the list and merge them together into a single fire.
     *
     * After a merge the surviving fire is compared against the rest of the list again, so chains
     * of fires connected through each other all end up merged.
     *
     * # Arguments
     * merged_away - is a list to move the absorbed fires into.
     *
     * # Returns
     * The number of mergers that occurred.
     */
    pub fn merge_fires(&mut self, merged_away: &mut Self) -> usize {
        let starting_size = self.0.len();

        let mut i = 0;
        while i < self.0.len() {
            let mut j = i + 1;
            while j < self.0.len() {
                let (left, right) = self.0.split_at_mut(j);
                let fire = &mut left[i];
                let candidate = &mut right[0];

                let mergeable = fire
                    .bounding_box()
                    .overlap(&candidate.bounding_box(), OVERLAP_FUDGE_FACTOR)
                    && fire
                        .area
                        .adjacent_to_or_overlaps(&candidate.area, OVERLAP_FUDGE_FACTOR);

                if mergeable {
                    fire.merge_with(candidate);
                    merged_away.0.push(self.0.swap_remove(j));
                    j = i + 1;
                } else {
                    j += 1;
                }
            }

            i += 1;
        }

        starting_size - self.0.len()
    }

    /// Get the number of fires in the list.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if this list is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /**
     * Remove fires from the list that are likely no longer burning.
     *
     * # Arguments
     * removed - is the list to add the drained elements into.
     * current_time - is the current time of the clusters that are being processed.
     * options - the retention policy, see [Fire::is_stale].
     *
     * # Returns
     * The number of items moved to the `removed` list.
     */
    pub fn drain_stale_fires(
        &mut self,
        removed: &mut Self,
        current_time: DateTime<Utc>,
        options: &TrackerOptions,
    ) -> usize {
        self.drain_where(removed, |f| f.is_stale(current_time, options))
    }

    /// Move every fire last observed before `older_than` into `removed`.
    ///
    /// Returns the number of fires moved.
    pub fn drain_fires_not_seen_since(
        &mut self,
        removed: &mut Self,
        older_than: DateTime<Utc>,
    ) -> usize {
        self.drain_where(removed, |f| f.last_observed < older_than)
    }

    fn drain_where<F: FnMut(&Fire) -> bool>(&mut self, removed: &mut Self, mut pred: F) -> usize {
        let starting_size = self.0.len();

        let mut i = 0;
        while i < self.0.len() {
            if pred(&self.0[i]) {
                removed.0.push(self.0.swap_remove(i));
            } else {
                i += 1;
            }
        }

        starting_size - self.0.len()
    }

    /// Get an iterator over the fires.
    pub fn iter(&self) -> impl Iterator<Item = &Fire> {
        self.0.iter()
    }
}
