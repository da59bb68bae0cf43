use image::{Rgba, RgbaImage};
use rayon::prelude::*;
use std::path::Path;

/// Maximum supported surface dimension in pixels (per axis).
pub const MAX_SURFACE_DIM: u32 = 32_768;

/// Error type for raw buffer construction and bulk writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    /// Raw data is not 4 channels per pixel.
    Format { channels: usize },
    /// Raw data length does not match `width * height * 4`.
    Length { expected: usize, actual: usize },
    /// Zero or oversized dimensions.
    InvalidSize { width: u32, height: u32 },
}

impl std::fmt::Display for BufferError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BufferError::Format { channels } => {
                write!(f, "expected RGBA pixel format (4 channels), got {}", channels)
            }
            BufferError::Length { expected, actual } => {
                write!(f, "pixel data has {} bytes, expected {}", actual, expected)
            }
            BufferError::InvalidSize { width, height } => {
                write!(f, "invalid surface size {}x{}", width, height)
            }
        }
    }
}

impl std::error::Error for BufferError {}

// ============================================================================
// PIXEL BUFFER – flat row-major RGBA raster
// ============================================================================

/// Flat RGBA raster, row-major, 4 bytes per pixel.
///
/// The channel layout is validated once at construction; every later access
/// can rely on it.
#[derive(Clone, Debug, PartialEq)]
pub struct PixelBuffer {
    image: RgbaImage,
}

impl PixelBuffer {
    // ---- construction -------------------------------------------------------

    /// Fully transparent buffer.
    pub fn new(width: u32, height: u32) -> Result<Self, BufferError> {
        Self::check_size(width, height)?;
        Ok(Self {
            image: RgbaImage::new(width, height),
        })
    }

    /// Buffer with every pixel set to `color`.
    pub fn new_filled(width: u32, height: u32, color: Rgba<u8>) -> Result<Self, BufferError> {
        let mut buf = Self::new(width, height)?;
        buf.fill(color);
        Ok(buf)
    }

    /// Import raw interleaved pixel data with `channels` bytes per pixel.
    /// Only 4-channel (RGBA) data is accepted.
    pub fn from_raw(
        width: u32,
        height: u32,
        channels: usize,
        data: Vec<u8>,
    ) -> Result<Self, BufferError> {
        if channels != 4 {
            return Err(BufferError::Format { channels });
        }
        Self::check_size(width, height)?;
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(BufferError::Length {
                expected,
                actual: data.len(),
            });
        }
        RgbaImage::from_raw(width, height, data)
            .map(|image| Self { image })
            .ok_or(BufferError::InvalidSize { width, height })
    }

    pub fn from_rgba_image(image: RgbaImage) -> Result<Self, BufferError> {
        Self::check_size(image.width(), image.height())?;
        Ok(Self { image })
    }

    fn check_size(width: u32, height: u32) -> Result<(), BufferError> {
        if width == 0 || height == 0 || width > MAX_SURFACE_DIM || height > MAX_SURFACE_DIM {
            return Err(BufferError::InvalidSize { width, height });
        }
        Ok(())
    }

    // ---- single pixel -------------------------------------------------------

    #[inline]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    #[inline]
    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && x < self.width() as i64 && y < self.height() as i64
    }

    /// Colour at `(x, y)`, or `None` outside the buffer.
    #[inline]
    pub fn get(&self, x: i64, y: i64) -> Option<Rgba<u8>> {
        if self.contains(x, y) {
            Some(*self.image.get_pixel(x as u32, y as u32))
        } else {
            None
        }
    }

    /// Colour at in-bounds `(x, y)`.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> Rgba<u8> {
        *self.image.get_pixel(x, y)
    }

    #[inline]
    pub fn put(&mut self, x: u32, y: u32, color: Rgba<u8>) {
        self.image.put_pixel(x, y, color);
    }

    /// Write `color` if `(x, y)` is inside the buffer; returns whether it was.
    #[inline]
    pub fn put_checked(&mut self, x: i64, y: i64, color: Rgba<u8>) -> bool {
        if self.contains(x, y) {
            self.image.put_pixel(x as u32, y as u32, color);
            true
        } else {
            false
        }
    }

    // ---- bulk ---------------------------------------------------------------

    /// The whole raster as interleaved RGBA bytes.
    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }

    /// Mutable view of the interleaved bytes. Length is fixed.
    pub fn as_raw_mut(&mut self) -> &mut [u8] {
        &mut self.image
    }

    /// Copy of the whole raster.
    pub fn read_all(&self) -> Vec<u8> {
        self.image.as_raw().clone()
    }

    /// Replace the whole raster. `data` must be exactly `width * height * 4`.
    pub fn write_all(&mut self, data: &[u8]) -> Result<(), BufferError> {
        let expected = self.image.as_raw().len();
        if data.len() != expected {
            return Err(BufferError::Length {
                expected,
                actual: data.len(),
            });
        }
        self.as_raw_mut().copy_from_slice(data);
        Ok(())
    }

    /// Set every pixel to `color`.
    pub fn fill(&mut self, color: Rgba<u8>) {
        self.as_raw_mut()
            .par_chunks_exact_mut(4)
            .for_each(|px| px.copy_from_slice(&color.0));
    }

    /// Make every pixel fully transparent.
    pub fn clear(&mut self) {
        self.as_raw_mut().par_iter_mut().for_each(|b| *b = 0);
    }

    pub fn to_rgba_image(&self) -> RgbaImage {
        self.image.clone()
    }

    pub fn into_rgba_image(self) -> RgbaImage {
        self.image
    }

    /// Encode the raster as PNG at `path`.
    pub fn save_png(&self, path: &Path) -> Result<(), String> {
        self.image
            .save_with_format(path, image::ImageFormat::Png)
            .map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_rgba_format() {
        let err = PixelBuffer::from_raw(2, 2, 3, vec![0; 12]).unwrap_err();
        assert_eq!(err, BufferError::Format { channels: 3 });
    }

    #[test]
    fn rejects_wrong_length() {
        let err = PixelBuffer::from_raw(2, 2, 4, vec![0; 15]).unwrap_err();
        assert_eq!(
            err,
            BufferError::Length {
                expected: 16,
                actual: 15
            }
        );
    }

    #[test]
    fn rejects_zero_size() {
        assert!(matches!(
            PixelBuffer::new(0, 4),
            Err(BufferError::InvalidSize { .. })
        ));
    }

    #[test]
    fn raw_layout_is_row_major() {
        let mut data = vec![0u8; 3 * 2 * 4];
        // pixel (2, 1) -> index (1 * 3 + 2) * 4 = 20
        data[20..24].copy_from_slice(&[9, 8, 7, 6]);
        let buf = PixelBuffer::from_raw(3, 2, 4, data).unwrap();
        assert_eq!(buf.get(2, 1), Some(Rgba([9, 8, 7, 6])));
        assert_eq!(buf.get(3, 1), None);
        assert_eq!(buf.get(-1, 0), None);
    }

    #[test]
    fn write_all_checks_length_and_leaves_buffer_alone() {
        let mut buf = PixelBuffer::new_filled(2, 2, Rgba([1, 1, 1, 1])).unwrap();
        assert!(buf.write_all(&[0; 4]).is_err());
        assert_eq!(buf.pixel(0, 0), Rgba([1, 1, 1, 1]));
        buf.write_all(&[5; 16]).unwrap();
        assert_eq!(buf.pixel(1, 1), Rgba([5, 5, 5, 5]));
    }

    #[test]
    fn checked_put_ignores_outside_pixels() {
        let mut buf = PixelBuffer::new(2, 2).unwrap();
        assert!(buf.put_checked(1, 1, Rgba([1, 2, 3, 4])));
        assert!(!buf.put_checked(2, 0, Rgba([1, 2, 3, 4])));
        assert!(!buf.put_checked(0, -1, Rgba([1, 2, 3, 4])));
        assert_eq!(buf.read_all()[12..16], [1, 2, 3, 4]);
    }

    #[test]
    fn image_conversion_keeps_pixels() {
        let mut img = RgbaImage::new(3, 1);
        img.put_pixel(2, 0, Rgba([7, 7, 7, 255]));
        let buf = PixelBuffer::from_rgba_image(img.clone()).unwrap();
        assert_eq!(buf.pixel(2, 0), Rgba([7, 7, 7, 255]));
        assert_eq!(buf.into_rgba_image(), img);
        assert!(PixelBuffer::from_rgba_image(RgbaImage::new(0, 3)).is_err());
    }

    #[test]
    fn fill_and_clear() {
        let mut buf = PixelBuffer::new(4, 3).unwrap();
        buf.fill(Rgba([255, 0, 0, 255]));
        assert!(buf.as_raw().chunks(4).all(|p| p == [255, 0, 0, 255]));
        buf.clear();
        assert!(buf.as_raw().iter().all(|&b| b == 0));
    }
}
