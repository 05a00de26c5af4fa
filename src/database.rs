/*!
 * Storage for clusters and fires.
 *
 * Clusters and fires are kept in separate SQLite databases so finding clusters and connecting
 * them into fires can run independently of each other.
 */
use crate::{
    cluster::ClusterList,
    fire::{Fire, FireList},
    geo::{BoundingBox, Coord, Geo},
    pixel::PixelList,
    satellite::{Satellite, Sector},
    tracker::TrackerOptions,
    FireTrackResult,
};
use chrono::{DateTime, Duration, Utc};
use log::{info, warn};
use rusqlite::{types::ValueRef, Connection, OpenFlags, ToSql};
use rustc_hash::FxHashMap as HashMap;
use std::path::Path;

/// Represents a connection to the database where clusters are stored.
pub struct ClusterDatabase {
    conn: Connection,
}

impl ClusterDatabase {
    /// Initialize a database.
    ///
    /// Initialize a database to make sure it exists and is set up properly. This should be run in
    /// the main thread before any other threads open a connection to the database to ensure
    /// consistency.
    pub fn initialize<P: AsRef<Path>>(path: P) -> FireTrackResult<()> {
        let _conn = open_database_to_write(
            path.as_ref(),
            include_str!("database/create_cluster_db.sql"),
        )?;
        Ok(())
    }

    /// Open a connection to the database to store and query clusters.
    pub fn connect<P: AsRef<Path>>(path: P) -> FireTrackResult<Self> {
        let conn = open_database_to_write(
            path.as_ref(),
            include_str!("database/create_cluster_db.sql"),
        )?;
        Ok(ClusterDatabase { conn })
    }

    /// Find the latest valid time in the database so you can safely skip anything older.
    ///
    /// If nothing has been stored for this satellite and sector, this is the Unix epoch.
    pub fn newest_scan_start(
        &self,
        satellite: Satellite,
        sector: Sector,
    ) -> FireTrackResult<DateTime<Utc>> {
        const QUERY: &str = include_str!("database/query_newest_cluster.sql");
        let mut stmt = self.conn.prepare(QUERY)?;

        let timestamp: i64 = stmt.query_row(
            [
                satellite.name(),
                sector.name(),
                satellite.name(),
                sector.name(),
            ],
            |row| row.get(0),
        )?;

        timestamp_to_datetime(timestamp)
    }

    /// Prepare to add cluster rows to the database.
    pub fn prepare_to_add_clusters(&self) -> FireTrackResult<ClusterDatabaseAddCluster> {
        const ADD_CLUSTER_QUERY: &str = include_str!("database/add_cluster.sql");
        const ADD_NO_FIRE_QUERY: &str = include_str!("database/add_no_cluster.sql");

        let add_cluster_stmt = self.conn.prepare(ADD_CLUSTER_QUERY)?;
        let add_no_fire_stmt = self.conn.prepare(ADD_NO_FIRE_QUERY)?;

        Ok(ClusterDatabaseAddCluster {
            add_cluster_stmt,
            add_no_fire_stmt,
            conn: &self.conn,
        })
    }

    /// Prepare to query the database if data from a satellite image is already in the database.
    pub fn prepare_to_query_clusters_present(
        &self,
    ) -> FireTrackResult<ClusterDatabaseQueryClusterPresent> {
        const QUERY_CLUSTER: &str = include_str!("database/query_num_clusters_present.sql");
        const QUERY_NO_FIRE: &str = include_str!("database/query_no_clusters.sql");

        let clusters_stmt = self.conn.prepare(QUERY_CLUSTER)?;
        let no_fire_stmt = self.conn.prepare(QUERY_NO_FIRE)?;

        Ok(ClusterDatabaseQueryClusterPresent {
            clusters_stmt,
            no_fire_stmt,
        })
    }

    /**
     * Query clusters from the database.
     *
     * Only clusters with a scan start at or after `start`, a scan end at or before `end`, and a
     * centroid inside `area` are selected. The rows come back in order of scan start time.
     */
    pub fn query_clusters(
        &self,
        sat: Option<Satellite>,
        sect: Option<Sector>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        area: BoundingBox,
    ) -> FireTrackResult<ClusterDatabaseQueryClusters<'_>> {
        let sat_select = if let Some(sat) = sat {
            format!("AND satellite = '{}'", sat.name())
        } else {
            String::new()
        };

        let sector_select = if let Some(sect) = sect {
            format!("AND sector = '{}'", sect.name())
        } else {
            String::new()
        };

        let query = &format!(
            r#"SELECT
                 cluster_id,
                 satellite,
                 sector,
                 start_time,
                 end_time,
                 power,
                 max_temperature,
                 area,
                 max_scan_angle,
                 lat,
                 lon,
                 pixels
               FROM clusters
               WHERE
                 start_time >= {} AND
                 end_time <= {} AND
                 lat >= {} AND lat <= {} AND
                 lon >= {} AND lon <= {} {} {}
               ORDER BY start_time ASC, cluster_id ASC"#,
            start.timestamp(),
            end.timestamp(),
            area.ll.lat,
            area.ur.lat,
            area.ll.lon,
            area.ur.lon,
            sat_select,
            sector_select
        );

        let stmt = self.conn.prepare(query)?;

        Ok(ClusterDatabaseQueryClusters { stmt })
    }
}

pub struct ClusterDatabaseAddCluster<'a> {
    add_cluster_stmt: rusqlite::Statement<'a>,
    add_no_fire_stmt: rusqlite::Statement<'a>,
    conn: &'a Connection,
}

impl<'a> ClusterDatabaseAddCluster<'a> {
    /// Adds an entire ClusterList to the database.
    ///
    /// A list without any clusters is recorded so the scan is known to have been processed.
    pub fn add(&mut self, clist: ClusterList) -> FireTrackResult<()> {
        if clist.is_empty() {
            self.add_no_fire(clist)
        } else {
            self.add_clusters(clist)
        }
    }

    fn add_clusters(&mut self, mut clist: ClusterList) -> FireTrackResult<()> {
        let satellite = clist.satellite();
        let sector = clist.sector();
        let scan_start = clist.scan_start().timestamp();
        let scan_end = clist.scan_end().timestamp();

        let stmt = &mut self.add_cluster_stmt;

        in_transaction(self.conn, || {
            for cluster in clist.take_clusters().into_iter() {
                let Coord { lat, lon } = cluster.centroid();
                let pixels = cluster.pixels().binary_serialize();
                let power = cluster.total_power();
                let maxt = cluster.max_temperature();
                let area = cluster.total_area();
                let angle = cluster.max_scan_angle();

                stmt.execute([
                    &satellite.name() as &dyn ToSql,
                    &sector.name(),
                    &scan_start,
                    &scan_end,
                    &lat,
                    &lon,
                    &power,
                    &maxt,
                    &area,
                    &angle,
                    &pixels,
                ])?;
            }

            Ok(())
        })
    }

    fn add_no_fire(&mut self, clist: ClusterList) -> FireTrackResult<()> {
        let satellite = clist.satellite();
        let sector = clist.sector();
        let scan_start = clist.scan_start().timestamp();
        let scan_end = clist.scan_end().timestamp();

        self.add_no_fire_stmt.execute([
            &satellite.name() as &dyn ToSql,
            &sector.name(),
            &scan_start,
            &scan_end,
        ])?;

        Ok(())
    }
}

pub struct ClusterDatabaseQueryClusterPresent<'a> {
    clusters_stmt: rusqlite::Statement<'a>,
    no_fire_stmt: rusqlite::Statement<'a>,
}

impl<'a> ClusterDatabaseQueryClusterPresent<'a> {
    /// Check to see if an entry for these values already exists in the database.
    pub fn present(
        &mut self,
        satellite: Satellite,
        sector: Sector,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> FireTrackResult<bool> {
        let start = start.timestamp();
        let end = end.timestamp();
        let params = [
            &satellite.name() as &dyn ToSql,
            &sector.name(),
            &start,
            &end,
        ];

        let num_clusters: i64 = self.clusters_stmt.query_row(params, |row| row.get(0))?;
        if num_clusters > 0 {
            return Ok(true);
        }

        // Processed, but no clusters were found.
        let no_fire: i64 = self.no_fire_stmt.query_row(params, |row| row.get(0))?;
        Ok(no_fire > 0)
    }
}

pub struct ClusterDatabaseQueryClusters<'a> {
    stmt: rusqlite::Statement<'a>,
}

impl<'a> ClusterDatabaseQueryClusters<'a> {
    /// Get an iterator over the rows
    pub fn rows(
        &mut self,
    ) -> FireTrackResult<impl Iterator<Item = FireTrackResult<ClusterDatabaseClusterRow>> + '_>
    {
        Ok(self.stmt.query_and_then([], query_row_to_cluster_row)?)
    }
}

/// All the data about a cluster retrieved from the database.
#[derive(Debug, Clone)]
pub struct ClusterDatabaseClusterRow {
    pub rowid: u64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub power: f64,
    pub max_temperature: f64,
    pub area: f64,
    pub scan_angle: f64,
    pub centroid: Coord,
    pub sector: Sector,
    pub sat: Satellite,
    pub pixels: PixelList,
}

/// Represents a connection to the database where fires and their clusters are stored.
pub struct FiresDatabase {
    conn: Connection,
}

impl FiresDatabase {
    /// Initialize a database.
    ///
    /// Initialize a database to make sure it exists and is set up properly. This should be run in
    /// the main thread before any other threads open a connection to the database to ensure
    /// consistency.
    pub fn initialize<P: AsRef<Path>>(path: P) -> FireTrackResult<()> {
        let _conn = open_database_to_write(
            path.as_ref(),
            include_str!("database/create_fire_db.sql"),
        )?;
        Ok(())
    }

    /// Open a connection to the database to store fires and their associations with clusters.
    pub fn connect<P: AsRef<Path>>(path: P) -> FireTrackResult<Self> {
        let conn = open_database_to_write(
            path.as_ref(),
            include_str!("database/create_fire_db.sql"),
        )?;
        Ok(Self { conn })
    }

    /// Get the next id number for a wildfire.
    pub fn next_wildfire_id(&self) -> FireTrackResult<u64> {
        const QUERY: &str = "SELECT IFNULL(MAX(fire_id) + 1, 1) FROM fires";

        let mut stmt = self.conn.prepare(QUERY)?;
        let res: i64 = stmt.query_row([], |row| row.get(0))?;

        Ok(u64::try_from(res)?)
    }

    /// Get the most recent time any fire from this satellite was observed.
    ///
    /// This is `None` if there are no fires from this satellite in the database.
    pub fn last_observed(&self, sat: Satellite) -> FireTrackResult<Option<DateTime<Utc>>> {
        let time_stamp: Option<i64> = self.conn.query_row(
            "SELECT MAX(last_observed) FROM fires WHERE satellite = ?",
            [sat.name()],
            |row| row.get(0),
        )?;

        time_stamp.map(timestamp_to_datetime).transpose()
    }

    /**
     * Get the fires that are still going so tracking can pick up where it left off.
     *
     * Fires last observed within `resume_window` of the most recent observation are retrieved,
     * then any that are stale as of that observation are discarded.
     */
    pub fn ongoing_fires(
        &self,
        sat: Satellite,
        options: &TrackerOptions,
    ) -> FireTrackResult<FireList> {
        let latest = match self.last_observed(sat)? {
            Some(ts) => ts,
            None => return Ok(FireList::new()),
        };

        let earliest = latest - options.resume_window;

        info!(target: sat.name(), "Latest fire observation => {}", latest);

        const QUERY: &str = include_str!("database/query_most_recent_fires.sql");
        let mut stmt = self.conn.prepare(QUERY)?;

        let mut fires = FireList::new();

        stmt.query_and_then(
            [&earliest.timestamp() as &dyn ToSql, &sat.name()],
            |row| -> FireTrackResult<Fire> {
                let id: u64 = u64::try_from(row.get::<_, i64>(0)?)?;
                let sat = satellite_from_column(row.get_ref(1)?)?;
                let first_observed = timestamp_to_datetime(row.get(2)?)?;
                let last_observed = timestamp_to_datetime(row.get(3)?)?;
                let max_power: f64 = row.get(4)?;
                let max_temperature: f64 = row.get(5)?;
                let pixels = pixels_from_column(row.get_ref(6)?)?;

                Ok(Fire::new(
                    first_observed,
                    last_observed,
                    max_power,
                    max_temperature,
                    id,
                    pixels,
                    sat,
                    0,
                ))
            },
        )?
        .filter_map(|res| match res {
            Ok(fire) => Some(fire),
            Err(err) => {
                warn!(target: sat.name(), "Error retrieving fire - {}", err);
                None
            }
        })
        .for_each(|fire| fires.add_fire(fire));

        info!(target: sat.name(), "Retrieved {} fires from database.", fires.len());

        let mut waste = FireList::default();
        fires.drain_stale_fires(&mut waste, latest, options);

        info!(
            target: sat.name(),
            "Retrieved {} fires from database after filtering out stale fires.",
            fires.len()
        );

        Ok(fires)
    }

    /// Add fires and associations to clusters to the database.
    pub fn prepare_to_add_fires(&self) -> FireTrackResult<FiresDatabaseAddFire> {
        const FIRE_QUERY: &str = include_str!("database/add_fire.sql");
        const ASSOC_QUERY: &str = include_str!("database/add_association.sql");

        let fire_stmt = self.conn.prepare(FIRE_QUERY)?;
        let assoc_stmt = self.conn.prepare(ASSOC_QUERY)?;
        let associations = HashMap::default();

        Ok(FiresDatabaseAddFire {
            conn: &self.conn,
            fire_stmt,
            assoc_stmt,
            associations,
        })
    }

    /**
     * Query fires from the database.
     *
     * Selects fires that were burning at any time between `start` and `end` with a centroid
     * inside `area`, in order of when they were first observed.
     */
    pub fn query_fires(
        &self,
        sat: Option<Satellite>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        area: BoundingBox,
    ) -> FireTrackResult<FiresDatabaseQueryFires<'_>> {
        let sat_select = if let Some(sat) = sat {
            format!("AND satellite = '{}'", sat.name())
        } else {
            String::new()
        };

        let query = &format!(
            r#"SELECT
                 fire_id,
                 merged_into,
                 satellite,
                 first_observed,
                 last_observed,
                 max_power,
                 max_temperature,
                 pixels
               FROM fires
               WHERE
                 first_observed <= {} AND last_observed >= {} AND
                 lat >= {} AND lat <= {} AND
                 lon >= {} AND lon <= {} {}
               ORDER BY first_observed ASC, fire_id ASC"#,
            end.timestamp(),
            start.timestamp(),
            area.ll.lat,
            area.ur.lat,
            area.ll.lon,
            area.ur.lon,
            sat_select,
        );

        let stmt = self.conn.prepare(query)?;

        Ok(FiresDatabaseQueryFires { stmt })
    }
}

pub struct FiresDatabaseAddFire<'a> {
    conn: &'a rusqlite::Connection,
    fire_stmt: rusqlite::Statement<'a>,
    assoc_stmt: rusqlite::Statement<'a>,
    associations: HashMap<u64, Vec<u64>>,
}

impl<'a> FiresDatabaseAddFire<'a> {
    /**
     * Add or update a list of fires in the database, along with their buffered associations.
     *
     * Fires that burned for `min_duration` or less are skipped, and so are their associations.
     * The buffered associations for the listed fires are only dropped once the fires are safely
     * committed, so a failed save can be retried.
     */
    pub fn add_fires(
        &mut self,
        fires: &FireList,
        min_duration: Duration,
    ) -> FireTrackResult<usize> {
        let fire_stmt = &mut self.fire_stmt;
        let assoc_stmt = &mut self.assoc_stmt;
        let associations = &self.associations;

        let num_stored = in_transaction(self.conn, || {
            let mut num_stored = 0;

            for fire in fires.iter() {
                if fire.duration() <= min_duration {
                    continue;
                }

                let Coord { lat, lon } = fire.centroid();
                let pixels = fire.pixels().binary_serialize();

                fire_stmt.execute([
                    &fire.id() as &dyn ToSql,
                    &fire.merged_into(),
                    &fire.satellite().name(),
                    &fire.first_observed().timestamp(),
                    &fire.last_observed().timestamp(),
                    &lat,
                    &lon,
                    &fire.max_power(),
                    &fire.max_temperature(),
                    &fire.pixels().len(),
                    &pixels,
                ])?;

                for &cluster_id in associations.get(&fire.id()).into_iter().flatten() {
                    assoc_stmt.execute([fire.id(), cluster_id])?;
                }

                num_stored += 1;
            }

            Ok(num_stored)
        })?;

        for fire in fires.iter() {
            self.associations.remove(&fire.id());
        }

        Ok(num_stored)
    }

    /// Buffer an association between a fire and a cluster row until the fire is added.
    pub fn add_association(&mut self, fireid: u64, clusterid: u64) {
        let cluster_ids = self.associations.entry(fireid).or_default();
        cluster_ids.push(clusterid);
    }
}

pub struct FiresDatabaseQueryFires<'a> {
    stmt: rusqlite::Statement<'a>,
}

impl<'a> FiresDatabaseQueryFires<'a> {
    /// Get an iterator over the rows
    pub fn rows(&mut self) -> FireTrackResult<impl Iterator<Item = FireTrackResult<Fire>> + '_> {
        Ok(self.stmt.query_and_then([], |row| -> FireTrackResult<Fire> {
            let id: u64 = u64::try_from(row.get::<_, i64>(0)?)?;
            let merged_into: u64 = u64::try_from(row.get::<_, i64>(1)?)?;
            let sat = satellite_from_column(row.get_ref(2)?)?;
            let first_observed = timestamp_to_datetime(row.get(3)?)?;
            let last_observed = timestamp_to_datetime(row.get(4)?)?;
            let max_power: f64 = row.get(5)?;
            let max_temperature: f64 = row.get(6)?;
            let pixels = pixels_from_column(row.get_ref(7)?)?;

            Ok(Fire::new(
                first_observed,
                last_observed,
                max_power,
                max_temperature,
                id,
                pixels,
                sat,
                merged_into,
            ))
        })?)
    }
}

/*-------------------------------------------------------------------------------------------------
 *                                    Shared helpers
 *-----------------------------------------------------------------------------------------------*/
fn open_database_to_write(path: &Path, schema: &str) -> FireTrackResult<Connection> {
    let conn = rusqlite::Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;

    // A 5-second busy time out is WAY too much. If we hit this something has gone terribly wrong.
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    conn.execute_batch(schema)?;

    Ok(conn)
}

fn in_transaction<T, F>(conn: &Connection, body: F) -> FireTrackResult<T>
where
    F: FnOnce() -> FireTrackResult<T>,
{
    conn.execute("BEGIN TRANSACTION", [])?;

    match body() {
        Ok(val) => {
            conn.execute("COMMIT", [])?;
            Ok(val)
        }
        Err(err) => {
            if let Err(rollback_err) = conn.execute("ROLLBACK", []) {
                warn!("Error rolling back transaction: {}", rollback_err);
            }
            Err(err)
        }
    }
}

fn timestamp_to_datetime(timestamp: i64) -> FireTrackResult<DateTime<Utc>> {
    Ok(DateTime::<Utc>::from_timestamp(timestamp, 0).ok_or("Invalid timestamp")?)
}

fn satellite_from_column(value: ValueRef) -> FireTrackResult<Satellite> {
    match value {
        ValueRef::Text(txt) => {
            let txt = std::str::from_utf8(txt)?;
            Ok(Satellite::string_contains_satellite(txt).ok_or("Invalid satellite")?)
        }
        _ => Err("satellite not text".into()),
    }
}

fn sector_from_column(value: ValueRef) -> FireTrackResult<Sector> {
    match value {
        ValueRef::Text(txt) => {
            let txt = std::str::from_utf8(txt)?;
            Ok(Sector::string_contains_sector(txt).ok_or("Invalid sector")?)
        }
        _ => Err("sector not text".into()),
    }
}

fn pixels_from_column(value: ValueRef) -> FireTrackResult<PixelList> {
    match value {
        ValueRef::Blob(bytes) => {
            let mut cursor = std::io::Cursor::new(bytes);
            PixelList::binary_deserialize(&mut cursor)
        }
        _ => Err("Invalid type in pixels column".into()),
    }
}

fn query_row_to_cluster_row(row: &rusqlite::Row) -> FireTrackResult<ClusterDatabaseClusterRow> {
    let rowid: u64 = u64::try_from(row.get::<_, i64>(0)?)?;
    let sat = satellite_from_column(row.get_ref(1)?)?;
    let sector = sector_from_column(row.get_ref(2)?)?;
    let start = timestamp_to_datetime(row.get(3)?)?;
    let end = timestamp_to_datetime(row.get(4)?)?;
    let power: f64 = row.get(5)?;
    let max_temperature: f64 = row.get(6)?;
    let area: f64 = row.get(7)?;
    let scan_angle: f64 = row.get(8)?;
    let lat: f64 = row.get(9)?;
    let lon: f64 = row.get(10)?;
    let centroid = Coord { lat, lon };
    let pixels = pixels_from_column(row.get_ref(11)?)?;

    Ok(ClusterDatabaseClusterRow {
        rowid,
        sat,
        sector,
        start,
        end,
        power,
        max_temperature,
        area,
        scan_angle,
        centroid,
        pixels,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{cluster::Cluster, pixel::Pixel, satellite::MaskCode};
    use chrono::TimeZone;
    use std::path::PathBuf;

    const WORLD: BoundingBox = BoundingBox {
        ll: Coord {
            lat: -90.0,
            lon: -180.0,
        },
        ur: Coord {
            lat: 90.0,
            lon: 180.0,
        },
    };

    struct TempDb(PathBuf);

    impl TempDb {
        fn new(name: &str) -> Self {
            let path = std::env::temp_dir().join(format!(
                "firetrack_{}_{}.sqlite",
                name,
                std::process::id()
            ));
            let _ = std::fs::remove_file(&path);
            TempDb(path)
        }
    }

    impl Drop for TempDb {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.0);
        }
    }

    fn time(hours: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2022, 6, 15, 12, 0, 0).unwrap() + Duration::hours(hours)
    }

    fn pixel(col: i32, power: f64) -> Pixel {
        let lon = -115.0 + col as f64 * 0.02;
        let mut pxl = Pixel::from_corners(
            Coord { lat: 44.02, lon },
            Coord { lat: 44.0, lon },
            Coord {
                lat: 44.0,
                lon: lon + 0.02,
            },
            Coord {
                lat: 44.02,
                lon: lon + 0.02,
            },
        );
        pxl.power = power;
        pxl.temperature = 400.0 + power;
        pxl.scan_angle = 4.0;
        pxl.mask_flag = MaskCode(10);
        pxl
    }

    fn cluster(cols: std::ops::Range<i32>, power: f64) -> Cluster {
        let mut clust = Cluster::new();
        for col in cols {
            clust.add_pixel(pixel(col, power));
        }
        clust
    }

    fn pixels(cols: std::ops::Range<i32>) -> PixelList {
        cols.map(|col| pixel(col, 10.0)).collect::<Vec<_>>().into()
    }

    fn fire(
        id: u64,
        first: DateTime<Utc>,
        last: DateTime<Utc>,
        power: f64,
        pixels: PixelList,
        merged_into: u64,
    ) -> Fire {
        let temperature = 400.0 + power;
        Fire::new(first, last, power, temperature, id, pixels, Satellite::G16, merged_into)
    }

    fn count_associations(db: &FiresDatabase) -> FireTrackResult<i64> {
        let num = db
            .conn
            .query_row("SELECT COUNT(*) FROM associations", [], |row| row.get(0))?;
        Ok(num)
    }

    #[test]
    fn test_cluster_database() -> FireTrackResult<()> {
        let tmp = TempDb::new("clusters");
        ClusterDatabase::initialize(&tmp.0)?;
        let db = ClusterDatabase::connect(&tmp.0)?;

        let epoch = db.newest_scan_start(Satellite::G17, Sector::FULL)?;
        assert_eq!(epoch.timestamp(), 0);

        let fires = ClusterList::new(
            Satellite::G17,
            Sector::FULL,
            time(0),
            time(0) + Duration::minutes(10),
            vec![cluster(0..2, 5.0), cluster(10..13, 7.0)],
        );
        let no_fires = ClusterList::new(
            Satellite::G17,
            Sector::FULL,
            time(1),
            time(1) + Duration::minutes(10),
            vec![],
        );

        {
            let mut add = db.prepare_to_add_clusters()?;
            add.add(fires.clone())?;
            add.add(no_fires)?;
            // Adding the same scan again replaces the rows.
            add.add(fires)?;
        }

        assert_eq!(db.newest_scan_start(Satellite::G17, Sector::FULL)?, time(1));
        assert_eq!(db.newest_scan_start(Satellite::G16, Sector::FULL)?.timestamp(), 0);

        let mut present = db.prepare_to_query_clusters_present()?;
        let ten = Duration::minutes(10);
        assert!(present.present(Satellite::G17, Sector::FULL, time(0), time(0) + ten)?);
        assert!(present.present(Satellite::G17, Sector::FULL, time(1), time(1) + ten)?);
        assert!(!present.present(Satellite::G17, Sector::CONUS, time(0), time(0) + ten)?);
        assert!(!present.present(Satellite::G17, Sector::FULL, time(2), time(2) + ten)?);

        let mut query = db.query_clusters(Some(Satellite::G17), None, time(-1), time(5), WORLD)?;
        let rows: Vec<ClusterDatabaseClusterRow> = query.rows()?.collect::<Result<_, _>>()?;
        assert_eq!(rows.len(), 2);
        assert!(rows[0].rowid < rows[1].rowid);
        assert_eq!(rows[0].sat, Satellite::G17);
        assert_eq!(rows[0].sector, Sector::FULL);
        assert_eq!(rows[0].start, time(0));
        assert_eq!(rows[0].power, 10.0);
        assert_eq!(rows[0].pixels, *cluster(0..2, 5.0).pixels());
        assert_eq!(rows[1].pixels.len(), 3);

        let mut query = db.query_clusters(Some(Satellite::G16), None, time(-1), time(5), WORLD)?;
        assert_eq!(query.rows()?.count(), 0);

        Ok(())
    }

    #[test]
    fn test_fires_database() -> FireTrackResult<()> {
        let tmp = TempDb::new("fires");
        FiresDatabase::initialize(&tmp.0)?;
        let db = FiresDatabase::connect(&tmp.0)?;

        assert_eq!(db.next_wildfire_id()?, 1);
        assert!(db.last_observed(Satellite::G16)?.is_none());
        assert!(db.ongoing_fires(Satellite::G16, &TrackerOptions::default())?.is_empty());

        let mut fires = FireList::new();
        // Long running and recent.
        fires.add_fire(fire(1, time(0), time(3), 50.0, pixels(0..3), 0));
        // Too short to keep.
        let brief = time(2) + Duration::minutes(20);
        fires.add_fire(fire(2, time(2), brief, 5.0, pixels(20..22), 0));
        // Merged into the first.
        fires.add_fire(fire(3, time(0), time(2), 20.0, pixels(3..5), 1));
        // Too long ago to resume.
        let ancient = time(-24 * 200);
        fires.add_fire(Fire::new(
            ancient,
            ancient + Duration::hours(5),
            20.0,
            500.0,
            7,
            pixels(40..42),
            Satellite::G16,
            0,
        ));

        {
            let mut add = db.prepare_to_add_fires()?;
            add.add_association(1, 100);
            add.add_association(1, 101);
            add.add_association(2, 102);
            add.add_association(3, 103);

            let num_stored = add.add_fires(&fires, Duration::hours(1))?;
            assert_eq!(num_stored, 3);
        }

        assert_eq!(db.next_wildfire_id()?, 8);
        assert_eq!(db.last_observed(Satellite::G16)?, Some(time(3)));
        assert!(db.last_observed(Satellite::G17)?.is_none());

        assert_eq!(count_associations(&db)?, 3);

        let ongoing = db.ongoing_fires(Satellite::G16, &TrackerOptions::default())?;
        assert_eq!(ongoing.len(), 1);
        let fire = ongoing.iter().next().unwrap();
        assert_eq!(fire.id(), 1);
        assert_eq!(fire.pixels().len(), 3);
        assert_eq!(fire.first_observed(), time(0));

        let mut query = db.query_fires(Some(Satellite::G16), time(1), time(10), WORLD)?;
        let found: Vec<Fire> = query.rows()?.collect::<Result<_, _>>()?;
        let ids: Vec<u64> = found.iter().map(|f| f.id()).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(found[1].merged_into(), 1);

        Ok(())
    }

    #[test]
    fn test_failed_save_keeps_associations() -> FireTrackResult<()> {
        let tmp = TempDb::new("fires_rollback");
        FiresDatabase::initialize(&tmp.0)?;
        let db = FiresDatabase::connect(&tmp.0)?;

        let good = fire(1, time(0), time(3), 50.0, pixels(0..3), 0);
        // NaN is stored as NULL, which the schema rejects.
        let bad = fire(2, time(0), time(3), f64::NAN, pixels(5..7), 0);
        let fixed = fire(2, time(0), time(3), 30.0, pixels(5..7), 0);

        let mut add = db.prepare_to_add_fires()?;
        add.add_association(1, 100);
        add.add_association(1, 101);
        add.add_association(2, 200);

        let mut fires = FireList::new();
        fires.add_fire(good.clone());
        fires.add_fire(bad);
        assert!(add.add_fires(&fires, Duration::hours(1)).is_err());

        assert_eq!(db.next_wildfire_id()?, 1);
        assert_eq!(count_associations(&db)?, 0);
        assert_eq!(add.associations.len(), 2);

        let mut fires = FireList::new();
        fires.add_fire(good);
        fires.add_fire(fixed);
        assert_eq!(add.add_fires(&fires, Duration::hours(1))?, 2);

        assert!(add.associations.is_empty());
        drop(add);

        assert_eq!(db.next_wildfire_id()?, 3);
        assert_eq!(count_associations(&db)?, 3);

        Ok(())
    }
}
