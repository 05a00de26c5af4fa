use super::Pixel;
use crate::{
    geo::{BoundingBox, Coord, Geo},
    satellite::{DataQualityFlagCode, MaskCode},
    FindFireError, FireTrackResult,
};
use std::io::Read;

/// Pixels closer than this are the same pixel when merging lists.
const MERGE_EPS: f64 = 1.0e-5;

/// Number of f64 values stored for each pixel in the binary format.
const F64_PER_PIXEL: usize = 12;

/// Size in bytes of a single pixel in the binary format.
const PIXEL_BINARY_SIZE: usize = F64_PER_PIXEL * 8 + 2 * 2;

/// Size in bytes of the length and capacity header in the binary format.
const HEADER_BINARY_SIZE: usize = 2 * 8;

/// A pixel list stores a list of Pixel objects.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PixelList(Vec<Pixel>);

impl From<Vec<Pixel>> for PixelList {
    fn from(src: Vec<Pixel>) -> Self {
        PixelList(src)
    }
}

impl PixelList {
    /// Create a new, empty list.
    pub fn new() -> Self {
        PixelList(vec![])
    }

    /// Create a new list with room for `capacity` pixels before it needs to grow.
    pub fn with_capacity(capacity: usize) -> Self {
        PixelList(Vec::with_capacity(capacity))
    }

    /// Append a pixel to the list.
    pub fn push(&mut self, pixel: Pixel) {
        self.0.push(pixel)
    }

    /// Clear the list but keep the memory intact.
    pub fn clear(&mut self) {
        self.0.clear()
    }

    /// Get the number of pixels in the list.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if this list is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get an iterator over the pixels.
    pub fn iter(&self) -> impl Iterator<Item = &Pixel> {
        self.0.iter()
    }

    /// Calculate the total power in the list, megawatts.
    ///
    /// Missing (non-finite) values are skipped.
    pub fn total_power(&self) -> f64 {
        self.0
            .iter()
            .map(|p| p.power)
            .filter(|p| p.is_finite())
            .sum()
    }

    /// Calculate the total area in the list, square meters.
    ///
    /// Missing (non-finite) values are skipped.
    pub fn total_area(&self) -> f64 {
        self.0
            .iter()
            .map(|p| p.area)
            .filter(|a| a.is_finite())
            .sum()
    }

    /// Calculate the maximum temperature in the list, kelvin.
    pub fn max_temperature(&self) -> f64 {
        self.0
            .iter()
            .map(|p| p.temperature)
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Calculate the maximum scan angle in the list, degrees.
    pub fn max_scan_angle(&self) -> f64 {
        self.0
            .iter()
            .map(|p| p.scan_angle)
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Check to see if these two lists are adjacent or overlapping.
    pub fn adjacent_to_or_overlaps(&self, other: &Self, eps: f64) -> bool {
        if !self.bounding_box().overlap(&other.bounding_box(), eps) {
            return false;
        }

        self.0.iter().any(|lp| {
            other
                .0
                .iter()
                .any(|rp| lp.is_adjacent_to_or_overlaps(rp, eps))
        })
    }

    /**
     * Merge the pixels of another list into this one.
     *
     * A pixel from `other` that matches the location of a pixel already in this list is combined
     * with it via [Pixel::max_merge]. Any other pixel is appended.
     */
    pub fn max_merge(&mut self, other: &Self) {
        for other_pixel in other.0.iter() {
            match self
                .0
                .iter_mut()
                .find(|p| p.approx_equal(other_pixel, MERGE_EPS))
            {
                Some(pixel) => pixel.max_merge(other_pixel),
                None => self.0.push(*other_pixel),
            }
        }
    }

    /*---------------------------------------------------------------------------------------------
     *                                     Binary Format
     *-------------------------------------------------------------------------------------------*/
    /// The number of bytes [PixelList::binary_serialize] will produce.
    pub fn binary_serialize_buffer_size(&self) -> usize {
        HEADER_BINARY_SIZE + self.0.len() * PIXEL_BINARY_SIZE
    }

    /**
     * Encode the list into a binary format suitable for storing in a database.
     *
     * The layout is little endian: the length as a u64, the capacity as a u64 (always equal to
     * the length), then for each pixel the corner coordinates, power, area, temperature, and
     * scan angle as f64 followed by the mask and data quality codes as i16.
     */
    pub fn binary_serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.binary_serialize_buffer_size());

        let len = self.0.len() as u64;
        buf.extend_from_slice(&len.to_le_bytes());
        buf.extend_from_slice(&len.to_le_bytes());

        for pixel in &self.0 {
            let values: [f64; F64_PER_PIXEL] = [
                pixel.ul.lat,
                pixel.ul.lon,
                pixel.ll.lat,
                pixel.ll.lon,
                pixel.lr.lat,
                pixel.lr.lon,
                pixel.ur.lat,
                pixel.ur.lon,
                pixel.power,
                pixel.area,
                pixel.temperature,
                pixel.scan_angle,
            ];

            for val in values {
                buf.extend_from_slice(&val.to_le_bytes());
            }

            buf.extend_from_slice(&pixel.mask_flag.0.to_le_bytes());
            buf.extend_from_slice(&pixel.data_quality_flag.0.to_le_bytes());
        }

        buf
    }

    /// Decode a list that was encoded with [PixelList::binary_serialize].
    pub fn binary_deserialize<R: Read>(rdr: &mut R) -> FireTrackResult<Self> {
        let len = usize::try_from(read_u64(rdr)?)?;
        let capacity = usize::try_from(read_u64(rdr)?)?;

        if capacity < len {
            return Err(FindFireError {
                msg: "pixel list capacity smaller than length",
            }
            .into());
        }

        // Don't trust the length for a big up front allocation, a corrupt header could ask for
        // anything.
        let mut pixels = Vec::with_capacity(len.min(4096));

        for _ in 0..len {
            let mut values = [0.0; F64_PER_PIXEL];
            for val in values.iter_mut() {
                *val = read_f64(rdr)?;
            }

            let mask_flag = MaskCode(read_i16(rdr)?);
            let data_quality_flag = DataQualityFlagCode(read_i16(rdr)?);

            pixels.push(Pixel {
                ul: Coord {
                    lat: values[0],
                    lon: values[1],
                },
                ll: Coord {
                    lat: values[2],
                    lon: values[3],
                },
                lr: Coord {
                    lat: values[4],
                    lon: values[5],
                },
                ur: Coord {
                    lat: values[6],
                    lon: values[7],
                },
                power: values[8],
                area: values[9],
                temperature: values[10],
                scan_angle: values[11],
                mask_flag,
                data_quality_flag,
            });
        }

        pixels.shrink_to_fit();

        Ok(PixelList(pixels))
    }
}

fn read_u64<R: Read>(rdr: &mut R) -> FireTrackResult<u64> {
    let mut buf = [0u8; 8];
    rdr.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_f64<R: Read>(rdr: &mut R) -> FireTrackResult<f64> {
    let mut buf = [0u8; 8];
    rdr.read_exact(&mut buf)?;
    Ok(f64::from_le_bytes(buf))
}

fn read_i16<R: Read>(rdr: &mut R) -> FireTrackResult<i16> {
    let mut buf = [0u8; 2];
    rdr.read_exact(&mut buf)?;
    Ok(i16::from_le_bytes(buf))
}

impl Geo for PixelList {
    /// The average of the centroids of every pixel in the list.
    ///
    /// This is NaN for an empty list.
    fn centroid(&self) -> Coord {
        let mut centroid = Coord { lat: 0.0, lon: 0.0 };

        for pixel in &self.0 {
            let coord = pixel.centroid();
            centroid.lat += coord.lat;
            centroid.lon += coord.lon;
        }

        centroid.lat /= self.0.len() as f64;
        centroid.lon /= self.0.len() as f64;

        centroid
    }

    fn bounding_box(&self) -> BoundingBox {
        let mut min_lat = f64::INFINITY;
        let mut max_lat = f64::NEG_INFINITY;
        let mut min_lon = f64::INFINITY;
        let mut max_lon = f64::NEG_INFINITY;

        for pixel in &self.0 {
            for coord in [pixel.ul, pixel.ll, pixel.lr, pixel.ur] {
                min_lat = min_lat.min(coord.lat);
                min_lon = min_lon.min(coord.lon);
                max_lat = max_lat.max(coord.lat);
                max_lon = max_lon.max(coord.lon);
            }
        }

        BoundingBox {
            ll: Coord {
                lat: min_lat,
                lon: min_lon,
            },
            ur: Coord {
                lat: max_lat,
                lon: max_lon,
            },
        }
    }
}

impl<'a> IntoIterator for &'a PixelList {
    type Item = &'a Pixel;
    type IntoIter = std::slice::Iter<'a, Pixel>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn pixel(lat: f64, lon: f64, power: f64) -> Pixel {
        Pixel {
            ul: Coord {
                lat: lat + 1.0,
                lon,
            },
            ll: Coord { lat, lon },
            lr: Coord {
                lat,
                lon: lon + 1.0,
            },
            ur: Coord {
                lat: lat + 1.0,
                lon: lon + 1.0,
            },
            power,
            area: 10.0,
            temperature: 400.0 + power,
            scan_angle: 3.0,
            mask_flag: MaskCode(10),
            data_quality_flag: DataQualityFlagCode(0),
        }
    }

    #[test]
    fn test_aggregates_skip_missing_values() {
        let mut list = PixelList::new();
        list.push(pixel(44.0, -120.0, 5.0));
        list.push(pixel(44.0, -119.0, f64::NEG_INFINITY));
        list.push(pixel(44.0, -118.0, 7.0));

        assert_eq!(list.len(), 3);
        assert_eq!(list.total_power(), 12.0);
        assert_eq!(list.total_area(), 30.0);
        assert_eq!(list.max_temperature(), 407.0);
        assert_eq!(list.max_scan_angle(), 3.0);

        let centroid = list.centroid();
        assert!(centroid.is_close(Coord { lat: 44.5, lon: -118.5 }, 1.0e-10));

        let bb = list.bounding_box();
        assert_eq!(bb.ll, Coord { lat: 44.0, lon: -120.0 });
        assert_eq!(bb.ur, Coord { lat: 45.0, lon: -117.0 });
    }

    #[test]
    fn test_empty_list() {
        let list = PixelList::new();
        assert!(list.is_empty());
        assert_eq!(list.total_power(), 0.0);
        assert_eq!(list.max_temperature(), f64::NEG_INFINITY);
        assert!(list.centroid().lat.is_nan());
    }

    #[test]
    fn test_max_merge_combines_and_appends() {
        let mut list = PixelList::new();
        list.push(pixel(44.0, -120.0, 5.0));
        list.push(pixel(44.0, -119.0, 6.0));

        let mut other = PixelList::new();
        // Same spot as the first, but a tiny bit off and more powerful.
        let mut same = pixel(44.0, -120.0, 50.0);
        same.ul.lat += 1.0e-7;
        same.mask_flag = MaskCode(13);
        other.push(same);
        other.push(pixel(43.0, -120.0, 1.0));

        list.max_merge(&other);

        assert_eq!(list.len(), 3);
        let first = list.iter().next().unwrap();
        assert_eq!(first.power, 50.0);
        assert_eq!(first.temperature, 450.0);
        assert_eq!(first.mask_flag, MaskCode(10));
        assert_eq!(first.ul.lat, 45.0);
    }

    #[test]
    fn test_binary_layout() {
        let mut list = PixelList::new();
        list.push(pixel(44.0, -120.0, 5.0));
        list.push(pixel(44.0, -119.0, f64::NEG_INFINITY));

        let buf = list.binary_serialize();
        assert_eq!(buf.len(), list.binary_serialize_buffer_size());
        assert_eq!(&buf[0..8], &2u64.to_le_bytes());
        assert_eq!(&buf[8..16], &2u64.to_le_bytes());

        let decoded = PixelList::binary_deserialize(&mut std::io::Cursor::new(&buf)).unwrap();
        assert_eq!(decoded.len(), 2);
        for (a, b) in list.iter().zip(decoded.iter()) {
            assert_eq!(a.power.to_bits(), b.power.to_bits());
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_truncated_input_is_an_error() {
        let mut list = PixelList::new();
        list.push(pixel(44.0, -120.0, 5.0));

        let buf = list.binary_serialize();
        let short = &buf[..buf.len() - 1];
        assert!(PixelList::binary_deserialize(&mut std::io::Cursor::new(short)).is_err());

        let mut bad_header = buf.clone();
        bad_header[8..16].copy_from_slice(&0u64.to_le_bytes());
        assert!(PixelList::binary_deserialize(&mut std::io::Cursor::new(&bad_header)).is_err());
    }
}
