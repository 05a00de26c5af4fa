use crate::{
    firepoint::FirePoint,
    geo::Coord,
    pixel::Pixel,
    satellite::{DataQualityFlagCode, MaskCode},
    FireTrackError, FireTrackResult,
};
use std::path::{Path, PathBuf};

/**
 * A source of fire detections from a single satellite scan.
 *
 * Reading the raster files and projecting the grid onto the Earth happens outside this crate. An
 * implementation hands over the points that passed its quality screening, and the name of the
 * file they came from so the scan metadata can be recovered.
 */
pub trait FireSatImage {
    /// The file name the image was loaded from, without any leading directories.
    fn file_name(&self) -> &str;

    /// Get all the points in the image with a fire detection.
    fn extract_fire_points(&self) -> FireTrackResult<Vec<FirePoint>>;
}

/**
 * A text listing of the fire points extracted from a single scan.
 *
 * The file keeps the name of the scan it was extracted from (with any extension) so the
 * satellite, sector, and scan times can be parsed from it. Each line holds one point as 16
 * whitespace separated columns:
 *
 * ```text
 * x y ul_lat ul_lon ll_lat ll_lon lr_lat lr_lon ur_lat ur_lon
 *     power area temperature scan_angle mask dqf
 * ```
 *
 * Blank lines and lines starting with `#` are ignored. Missing values are written as `-inf`.
 * The file isn't read until the points are extracted.
 */
#[derive(Debug, Clone)]
pub struct FirePointFile {
    path: PathBuf,
    fname: String,
}

impl FirePointFile {
    const NUM_COLUMNS: usize = 16;

    pub fn open<P: AsRef<Path>>(path: P) -> FireTrackResult<Self> {
        let path = path.as_ref().to_path_buf();

        let fname = path
            .file_name()
            .map(|fname| fname.to_string_lossy().to_string())
            .ok_or_else(|| format!("not a file: {}", path.display()))?;

        Ok(FirePointFile { path, fname })
    }

    fn parse_line(line: &str) -> FireTrackResult<FirePoint> {
        let cols: Vec<&str> = line.split_whitespace().collect();
        if cols.len() != Self::NUM_COLUMNS {
            return Err(format!(
                "expected {} columns, found {}",
                Self::NUM_COLUMNS,
                cols.len()
            )
            .into());
        }

        let x: isize = cols[0].parse()?;
        let y: isize = cols[1].parse()?;

        let mut vals = [0.0; 12];
        for (val, col) in vals.iter_mut().zip(&cols[2..14]) {
            *val = col.parse()?;
        }

        let mask: i16 = cols[14].parse()?;
        let dqf: i16 = cols[15].parse()?;

        let coord = |i: usize| Coord {
            lat: vals[i],
            lon: vals[i + 1],
        };

        let mut pixel = Pixel::from_corners(coord(0), coord(2), coord(4), coord(6));
        pixel.power = vals[8];
        pixel.area = vals[9];
        pixel.temperature = vals[10];
        pixel.scan_angle = vals[11];
        pixel.mask_flag = MaskCode(mask);
        pixel.data_quality_flag = DataQualityFlagCode(dqf);

        Ok(FirePoint { x, y, pixel })
    }
}

impl FireSatImage for FirePointFile {
    fn file_name(&self) -> &str {
        &self.fname
    }

    fn extract_fire_points(&self) -> FireTrackResult<Vec<FirePoint>> {
        let text = std::fs::read_to_string(&self.path)?;

        text.lines()
            .enumerate()
            .map(|(i, line)| (i, line.trim()))
            .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
            .map(|(i, line)| {
                Self::parse_line(line).map_err(|err| -> FireTrackError {
                    format!("{} line {}: {}", self.path.display(), i + 1, err).into()
                })
            })
            .collect()
    }
}
