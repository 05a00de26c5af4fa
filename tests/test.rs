use firetrack::{
    run_find_fire_pipeline, BoundingBox, ClusterDatabase, Coord, FirePoint, FireSatImage,
    FireTrackResult, FireTracker, FiresDatabase, Geo, MaskCode, PipelineOptions, Pixel, PixelList,
    Satellite, SendFireSatImage, TrackerOptions,
};
use std::{
    path::PathBuf,
    sync::{atomic::AtomicU64, Arc},
};

fn coord(lat: f64, lon: f64) -> Coord {
    Coord { lat, lon }
}

fn pxl(ul: (f64, f64), ll: (f64, f64), lr: (f64, f64), ur: (f64, f64)) -> Pixel {
    Pixel::from_corners(
        coord(ul.0, ul.1),
        coord(ll.0, ll.1),
        coord(lr.0, lr.1),
        coord(ur.0, ur.1),
    )
}

/*-------------------------------------------------------------------------------------------------
 *                                     Coordinates & Pixels
 *-----------------------------------------------------------------------------------------------*/
#[test]
fn test_coords_are_close() {
    let left = coord(45.5, -120.0);
    let right = coord(45.5000002, -120.0000002);

    assert!(left.is_close(left, 1.0e-6));
    assert!(right.is_close(right, 1.0e-6));
    assert!(left.is_close(right, 1.0e-6));

    assert!(!left.is_close(right, 1.0e-8));

    for eps in [0.0, 1.0e-12, 1.0, 100.0] {
        assert!(left.is_close(left, eps));
    }
}

#[test]
fn test_pixel_centroid() {
    let pxl = pxl((45.0, -120.0), (44.0, -120.0), (44.0, -119.0), (45.0, -119.0));

    let centroid = pxl.centroid();
    assert!(centroid.is_close(coord(44.5, -119.5), 1.0e-12));
    assert!(pxl.bounding_box().contains_coord(centroid, 0.0));
}

#[test]
fn test_pixels_approx_equal() {
    let pxl1 = pxl((45.0, -120.0), (44.0, -120.0), (44.0, -119.0), (45.0, -119.0));
    let pxl2 = pxl(
        (45.0000002, -120.0000002),
        (44.0000002, -119.9999998),
        (43.9999998, -119.0000002),
        (44.9999998, -118.9999998),
    );

    assert!(pxl1.approx_equal(&pxl1, 1.0e-6));
    assert!(pxl2.approx_equal(&pxl2, 1.0e-6));
    assert!(pxl1.approx_equal(&pxl2, 1.0e-6));

    assert!(!pxl1.approx_equal(&pxl2, 1.0e-8));
}

#[test]
fn test_pixel_contains_coord_square() {
    // A simple square of width & height 1 degree of latitude & longitude
    let pxl1 = pxl((45.0, -120.0), (44.0, -120.0), (44.0, -119.0), (45.0, -119.0));

    assert!(pxl1.contains_coord(coord(44.5, -119.5), 1.0e-6));

    let outside = [
        coord(45.5, -119.5),
        coord(44.5, -120.5),
        coord(43.5, -119.5),
        coord(44.5, -118.5),
        coord(43.5, -118.5),
        coord(45.5, -120.5),
    ];
    for pnt in outside {
        assert!(!pxl1.contains_coord(pnt, 1.0e-6), "{:?}", pnt);
    }

    // The boundary is not inside.
    let boundary = [
        coord(45.0, -119.5),
        coord(44.0, -119.5),
        coord(44.5, -119.0),
        coord(44.5, -120.0),
    ];
    for pnt in boundary {
        assert!(!pxl1.contains_coord(pnt, 1.0e-6), "{:?}", pnt);
    }
}

#[test]
fn test_pixel_contains_coord_skewed() {
    let pxl2 = pxl((3.0, 2.0), (0.0, 0.0), (2.0, 2.0), (5.0, 4.0));

    assert!(pxl2.contains_coord(coord(2.5, 2.0), 1.0e-6));

    for pnt in [coord(2.0, 1.0), coord(1.0, 2.0), coord(-1.5, -119.5)] {
        assert!(!pxl2.contains_coord(pnt, 1.0e-6), "{:?}", pnt);
    }

    for pnt in [coord(1.0, 1.0), coord(4.0, 3.0)] {
        assert!(!pxl2.contains_coord(pnt, 1.0e-6), "{:?}", pnt);
    }
}

#[test]
fn test_pixels_overlap() {
    let pxl1 = pxl((45.0, -120.0), (44.0, -120.0), (44.0, -119.0), (45.0, -119.0));
    let pxl2 = pxl((45.5, -120.5), (44.5, -120.5), (44.5, -119.5), (45.5, -119.5));
    let pxl3 = pxl((46.0, -120.0), (45.0, -120.0), (45.0, -119.0), (46.0, -119.0));
    // The corners of pxl4 lie on the mid-points of the edges of pxl1.
    let pxl4 = pxl((45.0, -119.5), (44.5, -120.0), (44.0, -119.5), (44.5, -119.0));

    for p in [&pxl1, &pxl2, &pxl3, &pxl4] {
        assert!(p.overlap(p, 1.0e-6));
        assert!(p.is_adjacent_to_or_overlaps(p, 1.0e-6));
    }

    // Adjacent, but not overlapping.
    assert!(!pxl1.overlap(&pxl3, 1.0e-6));
    assert!(!pxl3.overlap(&pxl1, 1.0e-6));
    assert!(pxl1.is_adjacent_to_or_overlaps(&pxl3, 1.0e-6));
    assert!(pxl3.is_adjacent_to_or_overlaps(&pxl1, 1.0e-6));

    // pxl2 overlaps pxl1 and pxl3, order doesn't matter.
    for (a, b) in [(&pxl1, &pxl2), (&pxl2, &pxl1), (&pxl3, &pxl2), (&pxl2, &pxl3)] {
        assert!(a.overlap(b, 1.0e-6));
        assert!(a.is_adjacent_to_or_overlaps(b, 1.0e-6));
    }

    // A vertex lying on the boundary.
    for (a, b) in [(&pxl1, &pxl4), (&pxl4, &pxl1)] {
        assert!(a.overlap(b, 1.0e-6));
        assert!(a.is_adjacent_to_or_overlaps(b, 1.0e-6));
    }
}

/*-------------------------------------------------------------------------------------------------
 *                                   Adjacency on a 3x3 grid
 *-----------------------------------------------------------------------------------------------*/
struct Grid {
    nw: Pixel,
    nn: Pixel,
    ne: Pixel,
    ww: Pixel,
    c0: Pixel,
    ee: Pixel,
    sw: Pixel,
    ss: Pixel,
    se: Pixel,
}

impl Grid {
    fn new() -> Self {
        Grid {
            nw: pxl((46.0, -121.0), (45.0, -121.0), (45.0, -120.0), (46.0, -120.0)),
            nn: pxl((46.0, -120.0), (45.0, -120.0), (45.0, -119.0), (46.0, -119.0)),
            ne: pxl((46.0, -119.0), (45.0, -119.0), (45.0, -118.0), (46.0, -118.0)),
            // Slightly perturbed so the eps matters.
            ww: pxl(
                (45.0000002, -121.0000002),
                (44.0000002, -120.9999998),
                (43.9999998, -120.0000002),
                (44.9999998, -119.9999998),
            ),
            c0: pxl((45.0, -120.0), (44.0, -120.0), (44.0, -119.0), (45.0, -119.0)),
            ee: pxl((45.0, -119.0), (44.0, -119.0), (44.0, -118.0), (45.0, -118.0)),
            sw: pxl((44.0, -121.0), (43.0, -121.0), (43.0, -120.0), (44.0, -120.0)),
            ss: pxl((44.0, -120.0), (43.0, -120.0), (43.0, -119.0), (44.0, -119.0)),
            se: pxl((44.0, -119.0), (43.0, -119.0), (43.0, -118.0), (44.0, -118.0)),
        }
    }

    fn all(&self) -> [&Pixel; 9] {
        [
            &self.nw, &self.nn, &self.ne, &self.ww, &self.c0, &self.ee, &self.sw, &self.ss,
            &self.se,
        ]
    }
}

#[test]
fn test_pixels_not_adjacent_to_themselves() {
    let g = Grid::new();

    for p in g.all() {
        assert!(!p.is_adjacent_to(p, 1.0e-6));
        assert!(p.is_adjacent_to_or_overlaps(p, 1.0e-6));
    }
}

#[test]
fn test_grid_adjacency() {
    let g = Grid::new();

    let adjacent = [
        // west to east
        (&g.nw, &g.nn),
        (&g.nn, &g.ne),
        (&g.ww, &g.c0),
        (&g.c0, &g.ee),
        (&g.sw, &g.ss),
        (&g.ss, &g.se),
        // north to south
        (&g.nw, &g.ww),
        (&g.ww, &g.sw),
        (&g.nn, &g.c0),
        (&g.c0, &g.ss),
        (&g.ne, &g.ee),
        (&g.ee, &g.se),
        // diagonals
        (&g.sw, &g.c0),
        (&g.c0, &g.ne),
        (&g.se, &g.c0),
        (&g.c0, &g.nw),
        (&g.ww, &g.nn),
        (&g.ss, &g.ee),
        (&g.ss, &g.ww),
        (&g.ee, &g.nn),
    ];

    let not_adjacent = [
        (&g.nw, &g.ne),
        (&g.ww, &g.ee),
        (&g.sw, &g.se),
        (&g.nw, &g.sw),
        (&g.nn, &g.ss),
        (&g.ne, &g.se),
        (&g.sw, &g.ne),
        (&g.se, &g.nw),
    ];

    // Order doesn't matter.
    for (a, b) in adjacent {
        assert!(a.is_adjacent_to(b, 1.0e-6), "{:?}\n{:?}", a, b);
        assert!(b.is_adjacent_to(a, 1.0e-6), "{:?}\n{:?}", b, a);
        assert!(a.is_adjacent_to_or_overlaps(b, 1.0e-6));
        assert!(b.is_adjacent_to_or_overlaps(a, 1.0e-6));
    }

    for (a, b) in not_adjacent {
        assert!(!a.is_adjacent_to(b, 1.0e-6), "{:?}\n{:?}", a, b);
        assert!(!b.is_adjacent_to(a, 1.0e-6), "{:?}\n{:?}", b, a);
        assert!(!a.is_adjacent_to_or_overlaps(b, 1.0e-6));
        assert!(!b.is_adjacent_to_or_overlaps(a, 1.0e-6));
    }
}

#[test]
fn test_grid_adjacency_small_eps() {
    let g = Grid::new();

    // None of these involve the perturbed pixel.
    let adjacent = [
        (&g.nw, &g.nn),
        (&g.nn, &g.ne),
        (&g.c0, &g.ee),
        (&g.sw, &g.ss),
        (&g.ss, &g.se),
        (&g.nn, &g.c0),
        (&g.c0, &g.ss),
        (&g.ne, &g.ee),
        (&g.ee, &g.se),
        (&g.sw, &g.c0),
        (&g.c0, &g.ne),
        (&g.se, &g.c0),
        (&g.c0, &g.nw),
        (&g.ss, &g.ee),
        (&g.ee, &g.nn),
    ];

    for (a, b) in adjacent {
        assert!(a.is_adjacent_to(b, 1.0e-8), "{:?}\n{:?}", a, b);
        assert!(b.is_adjacent_to(a, 1.0e-8), "{:?}\n{:?}", b, a);
    }

    assert!(!g.nw.is_adjacent_to(&g.ne, 1.0e-8));
    assert!(!g.nw.is_adjacent_to_or_overlaps(&g.ne, 1.0e-8));
    assert!(!g.ww.is_adjacent_to(&g.ee, 1.0e-8));
    assert!(!g.sw.is_adjacent_to(&g.se, 1.0e-8));
    assert!(!g.nn.is_adjacent_to(&g.ss, 1.0e-8));

    // With a tight eps the perturbed pixel overlaps its neighbors instead of touching them.
    for other in [&g.c0, &g.nw, &g.sw] {
        assert!(!g.ww.is_adjacent_to(other, 1.0e-8));
        assert!(!other.is_adjacent_to(&g.ww, 1.0e-8));
        assert!(g.ww.overlap(other, 1.0e-8));
        assert!(other.overlap(&g.ww, 1.0e-8));
        assert!(g.ww.is_adjacent_to_or_overlaps(other, 1.0e-8));
    }

    // And its corners no longer line up with the diagonal neighbors.
    for other in [&g.nn, &g.ss] {
        assert!(!g.ww.is_adjacent_to(other, 1.0e-8));
        assert!(!other.is_adjacent_to(&g.ww, 1.0e-8));
    }
}

#[test]
fn test_sub_pixels_are_not_adjacent() {
    let g = Grid::new();

    // Inside c0, sharing the lower right corner.
    let sub_pxl_01 = pxl((44.5, -119.5), (44.0, -119.5), (44.0, -119.0), (44.5, -119.0));
    assert!(!g.c0.is_adjacent_to(&sub_pxl_01, 1.0e-6));
    assert!(!sub_pxl_01.is_adjacent_to(&g.c0, 1.0e-6));

    // Inside c0, sharing the right edge.
    let sub_pxl_02 = pxl((45.0, -119.5), (44.0, -119.5), (44.0, -119.0), (45.0, -119.0));
    assert!(!g.c0.is_adjacent_to(&sub_pxl_02, 1.0e-6));
    assert!(!sub_pxl_02.is_adjacent_to(&g.c0, 1.0e-6));
}

/*-------------------------------------------------------------------------------------------------
 *                                          Pixel Lists
 *-----------------------------------------------------------------------------------------------*/
#[test]
fn test_pixel_list_binary_round_trip() -> FireTrackResult<()> {
    let g = Grid::new();

    let mut list = PixelList::new();
    for (i, p) in g.all().into_iter().enumerate() {
        let mut p = *p;
        p.power = i as f64 * 10.0;
        p.temperature = 300.0 + i as f64;
        p.mask_flag = MaskCode(10 + i as i16);
        list.push(p);
    }
    assert_eq!(list.len(), 9);

    let buf = list.binary_serialize();
    assert_eq!(buf.len(), list.binary_serialize_buffer_size());

    let decoded = PixelList::binary_deserialize(&mut buf.as_slice())?;
    assert_eq!(decoded.len(), 9);
    for (a, b) in list.iter().zip(decoded.iter()) {
        assert!(a.approx_equal(b, f64::MIN_POSITIVE));
        assert_eq!(a.power.to_bits(), b.power.to_bits());
        assert_eq!(a.area.to_bits(), b.area.to_bits());
        assert_eq!(a.mask_flag, b.mask_flag);
    }
    assert_eq!(decoded, list);

    Ok(())
}

/*-------------------------------------------------------------------------------------------------
 *                                 Clusters to fires, end to end
 *-----------------------------------------------------------------------------------------------*/
struct ScanImage {
    fname: String,
    points: Vec<FirePoint>,
}

impl FireSatImage for ScanImage {
    fn file_name(&self) -> &str {
        &self.fname
    }

    fn extract_fire_points(&self) -> FireTrackResult<Vec<FirePoint>> {
        Ok(self.points.clone())
    }
}

fn fire_point(x: isize) -> FirePoint {
    let lon = -118.0 + x as f64 * 0.02;
    let mut pixel = Pixel::from_corners(
        coord(40.02, lon),
        coord(40.0, lon),
        coord(40.0, lon + 0.02),
        coord(40.02, lon + 0.02),
    );
    pixel.power = 25.0;
    pixel.temperature = 550.0;
    pixel.area = 1_000.0;
    pixel.scan_angle = 5.0;
    pixel.mask_flag = MaskCode(10);

    FirePoint { x, y: 0, pixel }
}

fn scan(hour: u32, minute: u32, cols: std::ops::Range<isize>) -> SendFireSatImage {
    let (end_hour, end_minute) = if minute >= 55 {
        (hour + 1, minute - 55)
    } else {
        (hour, minute + 5)
    };

    Box::new(ScanImage {
        fname: format!(
            "OR_ABI-L2-FDCC-M6_G17_s2021213{:02}{:02}000_e2021213{:02}{:02}000_c20212131000000.nc",
            hour, minute, end_hour, end_minute
        ),
        points: cols.map(fire_point).collect(),
    })
}

struct TempFile(PathBuf);

impl TempFile {
    fn new(name: &str) -> Self {
        let fname = format!("firetrack_it_{}_{}.sqlite", name, std::process::id());
        let path = std::env::temp_dir().join(fname);
        let _ = std::fs::remove_file(&path);
        TempFile(path)
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

#[test]
fn test_clusters_to_fires() -> FireTrackResult<()> {
    let clusters_path = TempFile::new("clusters");
    let fires_path = TempFile::new("fires");

    ClusterDatabase::initialize(&clusters_path.0)?;
    FiresDatabase::initialize(&fires_path.0)?;

    // One fire that keeps growing, and one flash in the pan.
    let mut first_scan: Vec<FirePoint> = (0..2).map(fire_point).collect();
    first_scan.extend((50..52).map(fire_point));
    let scans: Vec<SendFireSatImage> = vec![
        Box::new(ScanImage {
            fname: "OR_ABI-L2-FDCC-M6_G17_s20212131200000_e20212131205000_c20212131210000.nc"
                .to_owned(),
            points: first_scan,
        }),
        scan(12, 30, 0..3),
        scan(13, 0, 1..4),
        scan(13, 30, 2..5),
    ];

    let cluster_db = ClusterDatabase::connect(&clusters_path.0)?;
    let (cluster_db, summary) =
        run_find_fire_pipeline(scans, cluster_db, &PipelineOptions::default())?;
    assert_eq!(summary.num_stored, 4);
    assert_eq!(summary.num_errors, 0);
    assert_eq!(summary.cluster_stats.num_clusters(), 5);

    let world = BoundingBox {
        ll: coord(-90.0, -180.0),
        ur: coord(90.0, 180.0),
    };

    let options = TrackerOptions::default();
    let fires_db = FiresDatabase::connect(&fires_path.0)?;
    let ids = Arc::new(AtomicU64::new(fires_db.next_wildfire_id()?));
    let ongoing = fires_db.ongoing_fires(Satellite::G17, &options)?;
    assert!(ongoing.is_empty());

    let mut tracker = FireTracker::new(Satellite::G17, ids, ongoing, options);
    let mut query = cluster_db.query_clusters(
        Some(Satellite::G17),
        None,
        chrono::DateTime::<chrono::Utc>::MIN_UTC,
        chrono::DateTime::<chrono::Utc>::MAX_UTC,
        world,
    )?;
    let num_rows = tracker.process_rows(query.rows()?, None)?;
    assert_eq!(num_rows, 5);

    let results = tracker.finish();
    assert_eq!(results.fires.len(), 2);
    assert_eq!(results.associations.len(), 5);

    let mut add = fires_db.prepare_to_add_fires()?;
    for (fire_id, cluster_id) in results.associations {
        add.add_association(fire_id, cluster_id);
    }
    assert_eq!(add.add_fires(&results.fires, options.min_duration_to_store)?, 1);
    drop(add);

    let mut query = fires_db.query_fires(
        None,
        chrono::DateTime::<chrono::Utc>::MIN_UTC,
        chrono::DateTime::<chrono::Utc>::MAX_UTC,
        world,
    )?;
    let stored = query.rows()?.collect::<FireTrackResult<Vec<_>>>()?;
    assert_eq!(stored.len(), 1);

    let fire = &stored[0];
    assert_eq!(fire.satellite(), Satellite::G17);
    assert_eq!(fire.merged_into(), 0);
    assert_eq!(fire.pixels().len(), 5);
    assert_eq!(fire.duration(), chrono::Duration::minutes(95));
    assert_eq!(fire.max_power(), 75.0);

    // A second run picks the fire back up.
    let ongoing = fires_db.ongoing_fires(Satellite::G17, &options)?;
    assert_eq!(ongoing.len(), 1);
    assert_eq!(fires_db.next_wildfire_id()?, fire.id() + 1);

    Ok(())
}
