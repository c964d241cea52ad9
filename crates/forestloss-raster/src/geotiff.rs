//! GeoTIFF layers on the pixel lattice.
//!
//! Files are stored north-up (first TIFF row is the northernmost) with the
//! standard ModelPixelScale / ModelTiepoint tags, so they open in ordinary GIS
//! tools. In memory, rows are flipped to the lattice convention of [`PixelGrid`]
//! (row 0 southernmost).

use std::fs::File;
use std::io::{BufWriter, Read, Seek};
use std::path::Path;

use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;

use crate::{PixelGrid, PixelSize, RasterError, Result};

const MODEL_PIXEL_SCALE_TAG: u16 = 33550;
const MODEL_TIEPOINT_TAG: u16 = 33922;
const GDAL_NODATA_TAG: u16 = 42113;

/// Maximum tolerated offset of a file origin from the lattice, in pixels.
const LATTICE_TOLERANCE: f64 = 1e-6;

/// A single-band layer loaded from a GeoTIFF file.
///
/// Canopy cover, loss year and elevation are all held as `f32`.
#[derive(Debug, Clone)]
pub struct GeoLayer {
    /// Pixel values, row 0 southernmost.
    data: Vec<f32>,
    /// Lattice window the layer covers.
    grid: PixelGrid,
    /// No-data value (pixels equal to this are treated as missing).
    no_data: Option<f32>,
}

impl GeoLayer {
    /// Load a layer from a GeoTIFF file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut decoder = open_decoder(path.as_ref())?;
        let grid = read_grid(&mut decoder)?;
        let data = flip_rows(&decode_f32(&mut decoder)?, grid.width as usize);
        let no_data = read_no_data(&mut decoder);

        Self::from_parts(grid, data, no_data)
    }

    /// Build a layer from values laid out with row 0 southernmost.
    pub fn from_parts(grid: PixelGrid, data: Vec<f32>, no_data: Option<f32>) -> Result<Self> {
        if data.len() != grid.len() {
            return Err(RasterError::BufferLength {
                expected: grid.len(),
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            grid,
            no_data,
        })
    }

    /// Lattice window of the layer.
    pub fn grid(&self) -> &PixelGrid {
        &self.grid
    }

    /// Raw pixel values, row 0 southernmost.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Value of a pixel, or `None` for no-data.
    pub fn value(&self, col: u32, row: u32) -> Option<f32> {
        let value = self.data[self.grid.index(col, row)];
        match self.no_data {
            Some(no_data) if (value - no_data).abs() < 0.001 => None,
            _ if value.is_nan() => None,
            _ => Some(value),
        }
    }

    /// Value of this layer at the lattice cell of `grid`'s pixel `(col, row)`.
    ///
    /// Returns `None` outside the layer's footprint or on no-data.
    pub fn value_at(&self, grid: &PixelGrid, col: u32, row: u32) -> Option<f32> {
        let (own_col, own_row) = grid.cell_in(&self.grid, col, row)?;
        self.value(own_col, own_row)
    }

    /// Write the layer as a 32-bit float GeoTIFF.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = BufWriter::new(File::create(path)?);
        let mut encoder = TiffEncoder::new(file)?;
        let mut image =
            encoder.new_image::<colortype::Gray32Float>(self.grid.width, self.grid.height)?;

        write_georeference(image.encoder(), &self.grid)?;
        if let Some(no_data) = self.no_data {
            image
                .encoder()
                .write_tag(Tag::from_u16_exhaustive(GDAL_NODATA_TAG), no_data.to_string().as_str())?;
        }

        let north_first = flip_rows(&self.data, self.grid.width as usize);
        image.write_data(&north_first)?;
        Ok(())
    }
}

/// Write an 8-bit mask (row 0 southernmost) as a GeoTIFF.
pub fn write_mask_u8<P: AsRef<Path>>(
    path: P,
    grid: &PixelGrid,
    data: &[u8],
    no_data: Option<u8>,
) -> Result<()> {
    if data.len() != grid.len() {
        return Err(RasterError::BufferLength {
            expected: grid.len(),
            actual: data.len(),
        });
    }

    let file = BufWriter::new(File::create(path)?);
    let mut encoder = TiffEncoder::new(file)?;
    let mut image = encoder.new_image::<colortype::Gray8>(grid.width, grid.height)?;

    write_georeference(image.encoder(), grid)?;
    if let Some(no_data) = no_data {
        image
            .encoder()
            .write_tag(Tag::from_u16_exhaustive(GDAL_NODATA_TAG), no_data.to_string().as_str())?;
    }

    let north_first = flip_rows(data, grid.width as usize);
    image.write_data(&north_first)?;
    Ok(())
}

/// Read an 8-bit mask GeoTIFF, returning its grid and values (row 0 southernmost).
pub fn read_mask_u8<P: AsRef<Path>>(path: P) -> Result<(PixelGrid, Vec<u8>)> {
    let mut decoder = open_decoder(path.as_ref())?;
    let grid = read_grid(&mut decoder)?;

    match decoder.read_image()? {
        DecodingResult::U8(data) => Ok((grid, flip_rows(&data, grid.width as usize))),
        other => Err(RasterError::UnsupportedDataType(format!(
            "expected 8-bit mask, found {}",
            decoding_kind(&other)
        ))),
    }
}

fn open_decoder(path: &Path) -> Result<Decoder<File>> {
    let file = File::open(path)?;
    let mut decoder = Decoder::new(file)?;

    // Continental range masks and GFC mosaics are far beyond the default limits.
    let mut limits = Limits::default();
    limits.decoding_buffer_size = 1024 * 1024 * 1024; // 1 GB
    limits.intermediate_buffer_size = 1024 * 1024 * 1024; // 1 GB
    limits.ifd_value_size = 1024 * 1024 * 1024;
    decoder = decoder.with_limits(limits);

    Ok(decoder)
}

fn write_georeference<W, K>(
    encoder: &mut tiff::encoder::DirectoryEncoder<'_, W, K>,
    grid: &PixelGrid,
) -> Result<()>
where
    W: std::io::Write + Seek,
    K: tiff::encoder::TiffKind,
{
    let bounds = grid.bounds();
    let scale = [grid.pixel.width, grid.pixel.height, 0.0];
    // Tie the top-left pixel corner to the north-west corner of the grid.
    let tiepoint = [0.0, 0.0, 0.0, bounds.min_lon, bounds.max_lat, 0.0];

    encoder.write_tag(Tag::from_u16_exhaustive(MODEL_PIXEL_SCALE_TAG), &scale[..])?;
    encoder.write_tag(Tag::from_u16_exhaustive(MODEL_TIEPOINT_TAG), &tiepoint[..])?;
    Ok(())
}

/// Read the lattice window from ModelTiepoint (33922) and ModelPixelScale (33550).
fn read_grid<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<PixelGrid> {
    let tiepoint = decoder
        .get_tag_f64_vec(Tag::from_u16_exhaustive(MODEL_TIEPOINT_TAG))
        .map_err(|_| RasterError::InvalidGeoTiff("missing ModelTiepoint tag".to_string()))?;
    let scale = decoder
        .get_tag_f64_vec(Tag::from_u16_exhaustive(MODEL_PIXEL_SCALE_TAG))
        .map_err(|_| RasterError::InvalidGeoTiff("missing ModelPixelScale tag".to_string()))?;

    if tiepoint.len() < 6 || scale.len() < 2 {
        return Err(RasterError::InvalidGeoTiff(
            "truncated georeferencing tags".to_string(),
        ));
    }

    let pixel = PixelSize::new(scale[0], scale[1])
        .map_err(|_| RasterError::InvalidGeoTiff(format!("bad pixel scale {scale:?}")))?;
    let (width, height) = decoder.dimensions()?;

    // Tiepoint format: [i, j, k, x, y, z] where (i,j) is a raster position and (x,y) its location
    let west = tiepoint[3] - tiepoint[0] * pixel.width;
    let north = tiepoint[4] + tiepoint[1] * pixel.height;
    let south = north - height as f64 * pixel.height;

    let col0 = lattice_index(west, pixel.width)?;
    let row0 = lattice_index(south, pixel.height)?;

    Ok(PixelGrid::new(pixel, col0, row0, width, height))
}

fn lattice_index(coordinate: f64, step: f64) -> Result<i64> {
    let cells = coordinate / step;
    let index = cells.round();
    if (cells - index).abs() > LATTICE_TOLERANCE {
        return Err(RasterError::InvalidGeoTiff(format!(
            "origin {coordinate} is not on the {step}° lattice"
        )));
    }
    Ok(index as i64)
}

fn decode_f32<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<Vec<f32>> {
    let result = decoder.read_image()?;

    match result {
        DecodingResult::F32(data) => Ok(data),
        DecodingResult::F64(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::I16(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::I32(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::U16(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::U32(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::U8(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::I8(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::U64(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::I64(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
    }
}

fn decoding_kind(result: &DecodingResult) -> &'static str {
    match result {
        DecodingResult::U8(_) => "u8",
        DecodingResult::U16(_) => "u16",
        DecodingResult::U32(_) => "u32",
        DecodingResult::U64(_) => "u64",
        DecodingResult::I8(_) => "i8",
        DecodingResult::I16(_) => "i16",
        DecodingResult::I32(_) => "i32",
        DecodingResult::I64(_) => "i64",
        DecodingResult::F32(_) => "f32",
        DecodingResult::F64(_) => "f64",
    }
}

/// Read the GDAL_NODATA tag, if present.
fn read_no_data<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<f32> {
    decoder
        .get_tag_ascii_string(Tag::from_u16_exhaustive(GDAL_NODATA_TAG))
        .ok()
        .and_then(|s| s.trim().trim_end_matches('\0').parse().ok())
}

/// Reverse the row order of a row-major buffer.
fn flip_rows<T: Copy>(data: &[T], width: usize) -> Vec<T> {
    if width == 0 {
        return data.to_vec();
    }
    data.chunks(width).rev().flatten().copied().collect()
}
