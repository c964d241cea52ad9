//! 1-bit packed range masks.
//!
//! A mask marks the pixels inside a composite range. Pixels outside the range
//! are background and carry the value 0, which doubles as no-data when the
//! mask is used in area reductions.
//!
//! Binary layout: the magic `FLM1`, then width and height as little-endian
//! `u32`, then the rows (row 0 southernmost), each padded to a whole number of
//! bytes with the most significant bit holding the westernmost pixel.

use crate::{PixelGrid, RasterError, Result};

const MAGIC: &[u8; 4] = b"FLM1";
const HEADER_LEN: usize = 12;

/// A packed binary mask over a [`PixelGrid`].
#[derive(Debug, Clone, PartialEq)]
pub struct PackedMask {
    grid: PixelGrid,
    row_bytes: usize,
    bits: Vec<u8>,
}

impl PackedMask {
    /// An empty mask over `grid`.
    pub fn empty(grid: PixelGrid) -> Self {
        let row_bytes = row_bytes(grid.width);
        Self {
            grid,
            row_bytes,
            bits: vec![0; row_bytes * grid.height as usize],
        }
    }

    /// Pack an 8-bit mask (row 0 southernmost); any nonzero value is inside.
    pub fn from_u8(grid: PixelGrid, values: &[u8]) -> Result<Self> {
        if values.len() != grid.len() {
            return Err(RasterError::BufferLength {
                expected: grid.len(),
                actual: values.len(),
            });
        }

        let mut mask = Self::empty(grid);
        for row in 0..grid.height {
            for col in 0..grid.width {
                if values[grid.index(col, row)] != 0 {
                    mask.set(col, row, true);
                }
            }
        }
        Ok(mask)
    }

    /// Grid the mask covers.
    pub fn grid(&self) -> &PixelGrid {
        &self.grid
    }

    /// Whether pixel `(col, row)` is inside the range.
    pub fn get(&self, col: u32, row: u32) -> bool {
        let (byte, bit) = self.position(col, row);
        self.bits[byte] & bit != 0
    }

    /// Mark pixel `(col, row)` inside or outside the range.
    pub fn set(&mut self, col: u32, row: u32, inside: bool) {
        let (byte, bit) = self.position(col, row);
        if inside {
            self.bits[byte] |= bit;
        } else {
            self.bits[byte] &= !bit;
        }
    }

    /// Number of pixels inside the range.
    pub fn count(&self) -> usize {
        self.bits.iter().map(|b| b.count_ones() as usize).sum()
    }

    /// Serialize to the packed binary layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.bits.len());
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&self.grid.width.to_le_bytes());
        out.extend_from_slice(&self.grid.height.to_le_bytes());
        out.extend_from_slice(&self.bits);
        out
    }

    /// Parse the packed binary layout; dimensions must agree with `grid`.
    pub fn from_bytes(grid: PixelGrid, bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN || &bytes[..4] != MAGIC {
            return Err(RasterError::MalformedMask("missing FLM1 header".to_string()));
        }

        let width = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        let height = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
        if width != grid.width || height != grid.height {
            return Err(RasterError::MalformedMask(format!(
                "mask is {width}x{height}, grid is {}x{}",
                grid.width, grid.height
            )));
        }

        let row_bytes = row_bytes(width);
        let body = &bytes[HEADER_LEN..];
        if body.len() != row_bytes * height as usize {
            return Err(RasterError::MalformedMask(format!(
                "expected {} body bytes, found {}",
                row_bytes * height as usize,
                body.len()
            )));
        }

        Ok(Self {
            grid,
            row_bytes,
            bits: body.to_vec(),
        })
    }

    fn position(&self, col: u32, row: u32) -> (usize, u8) {
        let byte = row as usize * self.row_bytes + col as usize / 8;
        let bit = 0x80u8 >> (col % 8);
        (byte, bit)
    }
}

fn row_bytes(width: u32) -> usize {
    (width as usize).div_ceil(8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PixelSize;

    fn grid(width: u32, height: u32) -> PixelGrid {
        PixelGrid::new(PixelSize::new(1.0, 1.0).unwrap(), 0, 0, width, height)
    }

    #[test]
    fn test_pack_from_u8() {
        let g = grid(3, 2);
        let mask = PackedMask::from_u8(g, &[255, 0, 255, 0, 0, 1]).unwrap();

        assert!(mask.get(0, 0));
        assert!(!mask.get(1, 0));
        assert!(mask.get(2, 0));
        assert!(mask.get(2, 1));
        assert_eq!(mask.count(), 3);
    }

    #[test]
    fn test_rows_are_byte_padded() {
        let g = grid(9, 2);
        let mut mask = PackedMask::empty(g);
        mask.set(8, 0, true);
        mask.set(0, 1, true);

        let bytes = mask.to_bytes();
        assert_eq!(bytes.len(), HEADER_LEN + 4);
        assert_eq!(&bytes[HEADER_LEN..], &[0x00, 0x80, 0x80, 0x00]);

        let back = PackedMask::from_bytes(g, &bytes).unwrap();
        assert_eq!(back, mask);
    }

    #[test]
    fn test_from_bytes_rejects_bad_header() {
        let g = grid(2, 2);
        assert!(matches!(
            PackedMask::from_bytes(g, b"XXXX\x02\0\0\0\x02\0\0\0\0\0"),
            Err(RasterError::MalformedMask(_))
        ));
    }

    #[test]
    fn test_from_bytes_rejects_dimension_mismatch() {
        let bytes = PackedMask::empty(grid(2, 2)).to_bytes();
        assert!(PackedMask::from_bytes(grid(3, 2), &bytes).is_err());
    }

    #[test]
    fn test_from_u8_length_checked() {
        assert!(matches!(
            PackedMask::from_u8(grid(2, 2), &[0; 3]),
            Err(RasterError::BufferLength { .. })
        ));
    }
}
