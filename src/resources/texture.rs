/*! Texture records.

The record keeps a CPU-side RGBA8 copy of each 2D texture's base level, which
is what the overlay samples when it needs host pixels. Storage is row-major with
the origin at the first row, matching GL upload order.

# Example

```
use glshare::resources::texture::TextureRecord;

let texture = TextureRecord::new(4);
texture.allocate(2, 2, None).unwrap();
texture.sub_image(1, 1, 1, 1, &[255, 0, 0, 255]).unwrap();
assert_eq!(texture.pixel(1, 1), Some([255, 0, 0, 255]));
```
*/

use crate::error::{Error, Result};
use std::io::Cursor;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Bytes per RGBA8 texel.
pub const BYTES_PER_PIXEL: usize = 4;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct TextureImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl TextureImage {
    fn byte_len(width: u32, height: u32) -> Result<usize> {
        (width as usize)
            .checked_mul(height as usize)
            .and_then(|texels| texels.checked_mul(BYTES_PER_PIXEL))
            .ok_or(Error::OutOfRange {
                offset: 0,
                length: usize::MAX,
                limit: isize::MAX as usize,
            })
    }

    fn check_rect(&self, x: u32, y: u32, width: u32, height: u32) -> Result<()> {
        let fits = |start: u32, extent: u32, limit: u32| {
            start.checked_add(extent).is_some_and(|end| end <= limit)
        };
        if fits(x, width, self.width) && fits(y, height, self.height) {
            Ok(())
        } else {
            //host-supplied coordinates; the reported offset saturates
            let offset = (y as usize)
                .saturating_mul(self.width as usize)
                .saturating_add(x as usize)
                .saturating_mul(BYTES_PER_PIXEL);
            Err(Error::OutOfRange {
                offset,
                length: (width as usize)
                    .saturating_mul(height as usize)
                    .saturating_mul(BYTES_PER_PIXEL),
                limit: self.pixels.len(),
            })
        }
    }

    fn row_range(&self, x: u32, y: u32, width: u32) -> std::ops::Range<usize> {
        let start = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        start..start + width as usize * BYTES_PER_PIXEL
    }
}

#[derive(Debug)]
pub struct TextureRecord {
    id: u32,
    image: RwLock<TextureImage>,
}

impl TextureRecord {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            image: RwLock::new(TextureImage::default()),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    fn image(&self) -> RwLockReadGuard<'_, TextureImage> {
        self.image.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn image_mut(&self) -> RwLockWriteGuard<'_, TextureImage> {
        self.image.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn width(&self) -> u32 {
        self.image().width
    }

    pub fn height(&self) -> u32 {
        self.image().height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        let image = self.image();
        (image.width, image.height)
    }

    /**
    (Re)allocates the base level (`glTexImage2D`).

    `data`, if given, must hold exactly `width * height` RGBA8 texels. Without
    data the texels are zeroed.
    */
    pub fn allocate(&self, width: u32, height: u32, data: Option<&[u8]>) -> Result<()> {
        let len = TextureImage::byte_len(width, height)?;
        let pixels = match data {
            Some(data) if data.len() != len => {
                return Err(Error::OutOfRange {
                    offset: 0,
                    length: data.len(),
                    limit: len,
                });
            }
            Some(data) => data.to_vec(),
            None => vec![0; len],
        };
        *self.image_mut() = TextureImage {
            width,
            height,
            pixels,
        };
        Ok(())
    }

    /// Replaces a rectangle of texels (`glTexSubImage2D`).
    pub fn sub_image(&self, x: u32, y: u32, width: u32, height: u32, data: &[u8]) -> Result<()> {
        let mut image = self.image_mut();
        image.check_rect(x, y, width, height)?;
        let row_bytes = width as usize * BYTES_PER_PIXEL;
        let expected = row_bytes * height as usize;
        if data.len() != expected {
            return Err(Error::OutOfRange {
                offset: 0,
                length: data.len(),
                limit: expected,
            });
        }
        if row_bytes == 0 {
            return Ok(());
        }
        for (row, src) in data.chunks_exact(row_bytes).enumerate() {
            let range = image.row_range(x, y + row as u32, width);
            image.pixels[range].copy_from_slice(src);
        }
        Ok(())
    }

    /**
    Copies a rectangle from `source` into this texture (`glCopyImageSubData`).

    `source` may be `self`.
    */
    #[allow(clippy::too_many_arguments)]
    pub fn copy_sub_image(
        &self,
        source: &TextureRecord,
        src_x: u32,
        src_y: u32,
        dst_x: u32,
        dst_y: u32,
        width: u32,
        height: u32,
    ) -> Result<()> {
        let rows = source.read_rect(src_x, src_y, width, height)?;
        self.sub_image(dst_x, dst_y, width, height, &rows)
    }

    /// Copies a rectangle of texels out, rows packed tightly.
    pub fn read_rect(&self, x: u32, y: u32, width: u32, height: u32) -> Result<Vec<u8>> {
        let image = self.image();
        image.check_rect(x, y, width, height)?;
        let mut out = Vec::with_capacity(TextureImage::byte_len(width, height)?);
        for row in 0..height {
            out.extend_from_slice(&image.pixels[image.row_range(x, y + row, width)]);
        }
        Ok(out)
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let image = self.image();
        image.check_rect(x, y, 1, 1).ok()?;
        let range = image.row_range(x, y, 1);
        image.pixels[range].try_into().ok()
    }

    /// A copy of every texel.
    pub fn pixels(&self) -> Vec<u8> {
        self.image().pixels.clone()
    }

    /// Encodes the current contents as an RGBA8 PNG.
    pub fn encode_png(&self) -> Result<Vec<u8>> {
        let image = self.image();
        let mut out = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut out, image.width, image.height);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header()?;
            writer.write_image_data(&image.pixels)?;
            writer.finish()?;
        }
        Ok(out)
    }

    /// Builds a texture from an RGBA8 PNG.
    pub fn from_png(id: u32, bytes: &[u8]) -> Result<Self> {
        let decoder = png::Decoder::new(Cursor::new(bytes));
        let mut reader = decoder.read_info()?;
        let (width, height, color_type, bit_depth) = {
            let info = reader.info();
            (info.width, info.height, info.color_type, info.bit_depth)
        };
        if color_type != png::ColorType::Rgba {
            return Err(Error::UnsupportedFormat {
                what: "png color type",
                value: color_type as u32,
            });
        }
        if bit_depth != png::BitDepth::Eight {
            return Err(Error::UnsupportedFormat {
                what: "png bit depth",
                value: bit_depth as u32,
            });
        }
        let mut pixels = vec![0; TextureImage::byte_len(width, height)?];
        reader.next_frame(&mut pixels)?;
        let texture = Self::new(id);
        texture.allocate(width, height, Some(&pixels))?;
        Ok(texture)
    }
}
