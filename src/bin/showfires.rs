use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use clap::Parser;
use firetrack::{BoundingBox, Coord, FireTrackResult, FiresDatabase, Satellite};
use log::{info, warn, LevelFilter};
use simple_logger::SimpleLogger;
use std::{
    fmt::{self, Display},
    path::PathBuf,
};

/*-------------------------------------------------------------------------------------------------
 *                               Parse Command Line Arguments
 *-----------------------------------------------------------------------------------------------*/
///
/// Show fires from the fires database.
///
/// This program will print a summary of every fire burning in a requested region and time range.
///
#[derive(Debug, Parser)]
#[clap(bin_name = "showfires")]
#[clap(author, version, about)]
struct ShowFiresOptionsInit {
    /// The path to the fires database file.
    ///
    /// If this is not specified, then the program will check for it in the "FIRES_DB"
    /// environment variable.
    #[clap(short, long)]
    #[clap(env = "FIRES_DB")]
    fire_store: PathBuf,

    /// The start time (UTC) in the format YYYY-MM-DD-HH
    #[clap(parse(try_from_str=parse_datetime))]
    start: DateTime<Utc>,

    /// The end time (UTC) in the format YYYY-MM-DD-HH
    #[clap(parse(try_from_str=parse_datetime))]
    end: DateTime<Utc>,

    /// Bounding Box as bottom_lat,left_lon,top_lat,right_lon
    ///
    /// If this is not specified, fires anywhere on Earth are shown.
    #[clap(short, long)]
    #[clap(parse(try_from_str=parse_bbox))]
    bbox: Option<BoundingBox>,

    /// Only show fires from this satellite, G16 or G17.
    #[clap(short, long)]
    #[clap(parse(try_from_str=parse_satellite))]
    sat: Option<Satellite>,

    /// Verbose output
    #[clap(short, long)]
    verbose: bool,
}

/// Parse a bounding box argument.
fn parse_bbox(bbox_str: &str) -> FireTrackResult<BoundingBox> {
    let corners: Vec<_> = bbox_str.split(',').collect();

    if corners.len() != 4 {
        return Err("Invalid number of coords".into());
    }

    let min_lat: f64 = corners[0].trim().parse()?;
    let min_lon: f64 = corners[1].trim().parse()?;
    let max_lat: f64 = corners[2].trim().parse()?;
    let max_lon: f64 = corners[3].trim().parse()?;

    if min_lat >= max_lat || min_lon >= max_lon {
        return Err(format!(
            concat!(
                "Minimum Lat/Lon must be less than Maximum Lat/Lon:",
                " min_lat={} max_lat={} min_lon={} max_lon={}"
            ),
            min_lat, max_lat, min_lon, max_lon
        )
        .into());
    }

    if min_lat < -90.0 || max_lat > 90.0 || min_lon < -180.0 || max_lon > 180.0 {
        return Err(format!(
            concat!(
                "Lat/Lon are out of range (-90.0 to 90.0 and -180.0 to 180.0):",
                " min_lat={} max_lat={} min_lon={} max_lon={}"
            ),
            min_lat, max_lat, min_lon, max_lon
        )
        .into());
    }

    let ll = Coord {
        lat: min_lat,
        lon: min_lon,
    };
    let ur = Coord {
        lat: max_lat,
        lon: max_lon,
    };

    Ok(BoundingBox { ll, ur })
}

/// Parse a command line datetime
fn parse_datetime(dt_str: &str) -> FireTrackResult<DateTime<Utc>> {
    const TIME_FORMAT: &str = "%Y-%m-%d-%H:%M:%S";
    let t_str = format!("{}:00:00", dt_str);

    let naive = NaiveDateTime::parse_from_str(&t_str, TIME_FORMAT)?;
    Ok(Utc.from_utc_datetime(&naive))
}

fn parse_satellite(sat: &str) -> FireTrackResult<Satellite> {
    let sat = Satellite::string_contains_satellite(sat)
        .ok_or_else(|| format!("Argument is not a valid satellite name: {}", sat))?;
    Ok(sat)
}

#[derive(Debug)]
struct ShowFiresOptionsChecked {
    /// The path to the database file.
    fire_store: PathBuf,

    /// The start time.
    start: DateTime<Utc>,

    /// The end time.
    end: DateTime<Utc>,

    /// Bounding Box
    bbox: BoundingBox,

    /// Satellite, or all of them.
    sat: Option<Satellite>,

    /// Verbose output
    verbose: bool,
}

impl Display for ShowFiresOptionsChecked {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        let sat = self.sat.map(|s| s.name()).unwrap_or("all");

        writeln!(f, "\n")?; // yes, two blank lines.
        writeln!(f, "    Database: {}", self.fire_store.display())?;
        writeln!(f, "       Start: {}", self.start)?;
        writeln!(f, "         End: {}", self.end)?;
        writeln!(f, "   Satellite: {}", sat)?;
        writeln!(
            f,
            "Bounding Box: {:.4},{:.4} to {:.4},{:.4}",
            self.bbox.ll.lat, self.bbox.ll.lon, self.bbox.ur.lat, self.bbox.ur.lon
        )?;
        writeln!(f, "\n")?; // yes, two blank lines.

        Ok(())
    }
}

/// Get the command line arguments and check them.
fn parse_args() -> FireTrackResult<ShowFiresOptionsChecked> {
    let ShowFiresOptionsInit {
        fire_store,
        start,
        end,
        bbox,
        sat,
        verbose,
    } = ShowFiresOptionsInit::parse();

    if start >= end {
        return Err(format!("start ({}) must be before end ({})", start, end).into());
    }

    let bbox = bbox.unwrap_or(BoundingBox {
        ll: Coord {
            lat: -90.0,
            lon: -180.0,
        },
        ur: Coord {
            lat: 90.0,
            lon: 180.0,
        },
    });

    Ok(ShowFiresOptionsChecked {
        fire_store,
        start,
        end,
        bbox,
        sat,
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

    let db = FiresDatabase::connect(&opts.fire_store)?;
    let mut query = db.query_fires(opts.sat, opts.start, opts.end, opts.bbox)?;

    let mut num_fires = 0;
    for fire in query.rows()? {
        match fire {
            Ok(fire) => {
                println!("{}", fire);
                num_fires += 1;
            }
            Err(err) => warn!("Error reading fire from database: {}", err),
        }
    }

    info!("Found {} fires.", num_fires);

    Ok(())
}
