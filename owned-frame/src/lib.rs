//! Owned image snapshots from machine vision cameras.
//!
//! A [FrameBuffer] holds its own copy of the pixel data, so it stays valid
//! after the acquisition engine recycles the transport buffer it was read
//! from. Accessors cover encoding to PNG/JPEG, demosaicing to RGB8, and
//! simple pixel/region sampling directly on the raw data.

use std::path::{Path, PathBuf};

use machine_vision_formats as formats;

use formats::{
    image_ref::ImageRef, owned::OImage, pixel_format, ImageBufferMutRef, ImageMutStride,
    ImageStride, PixFmt, PixelFormat, Stride,
};

pub type Result<M> = std::result::Result<M, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("unsupported pixel format: {0}")]
    UnsupportedPixelFormat(PixFmt),
    #[error("pixel ({x}, {y}) outside {width}x{height} image")]
    OutOfBounds { x: u32, y: u32, width: u32, height: u32 },
    #[error("sample region does not intersect the image")]
    EmptyRegion,
    #[error("image too small to sample")]
    ImageTooSmall,
    #[error("buffer size does not match image dimensions")]
    InvalidBufferSize,
    #[error("cannot infer image format from path {0:?}")]
    UnknownExtension(PathBuf),
    #[error(transparent)]
    Convert(#[from] convert_image::Error),
    #[error("{source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// File encodings supported by [FrameBuffer::save_as].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveFormat {
    Png,
    /// JPEG with the given quality (0-100).
    Jpeg(u8),
}

impl SaveFormat {
    /// Infer the format from a file extension (`.png`, `.jpg`, `.jpeg`).
    pub fn from_path(path: &Path) -> Option<SaveFormat> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "png" => Some(SaveFormat::Png),
            "jpg" | "jpeg" => Some(SaveFormat::Jpeg(DEFAULT_JPEG_QUALITY)),
            _ => None,
        }
    }
}

/// One decoded image with an owned copy of the pixel data.
#[derive(Clone)]
pub struct FrameBuffer {
    /// width in pixels
    pub width: u32,
    /// height in pixels
    pub height: u32,
    /// number of bytes in an image row
    pub stride: usize,
    /// pixel format of `image_data`
    pub pixel_format: PixFmt,
    /// raw image data
    pub image_data: Vec<u8>,
    /// frame number assigned by the acquisition engine
    pub frame_id: u64,
    /// device-side timestamp of the exposure, in nanoseconds
    pub device_timestamp_ns: u64,
    /// when the frame was received on the host
    pub host_timestamp: chrono::DateTime<chrono::Utc>,
}

fn _test_frame_buffer_is_send() {
    // Compile-time test to ensure FrameBuffer implements Send trait.
    fn implements<T: Send>() {}
    implements::<FrameBuffer>();
}

impl std::fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "FrameBuffer{{{} {}x{}, frame {}}}",
            self.pixel_format, self.width, self.height, self.frame_id
        )
    }
}

impl Stride for FrameBuffer {
    fn stride(&self) -> usize {
        self.stride
    }
}

impl FrameBuffer {
    /// Take ownership of raw image data, validating the buffer layout.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        width: u32,
        height: u32,
        stride: usize,
        image_data: Vec<u8>,
        pixel_format: PixFmt,
        frame_id: u64,
        device_timestamp_ns: u64,
        host_timestamp: chrono::DateTime<chrono::Utc>,
    ) -> Option<FrameBuffer> {
        let min_stride = width as usize * pixel_format.bits_per_pixel() as usize / 8;
        if stride < min_stride || image_data.len() < stride * height as usize {
            return None;
        }
        Some(FrameBuffer {
            width,
            height,
            stride,
            pixel_format,
            image_data,
            frame_id,
            device_timestamp_ns,
            host_timestamp,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel_format(&self) -> PixFmt {
        self.pixel_format
    }

    pub fn image_data(&self) -> &[u8] {
        &self.image_data
    }

    /// One-line description of the frame and its timing.
    pub fn info_string(&self) -> String {
        format!(
            "frame {}: {}x{} {}, device timestamp {} ns, received {}",
            self.frame_id,
            self.width,
            self.height,
            self.pixel_format,
            self.device_timestamp_ns,
            self.host_timestamp.to_rfc3339(),
        )
    }

    /// Demosaic/convert into an RGB8 image.
    pub fn to_rgb8(&self) -> Result<OImage<pixel_format::RGB8>> {
        match self.pixel_format {
            PixFmt::RGB8 => OImage::new(
                self.width,
                self.height,
                self.stride,
                self.image_data.clone(),
            )
            .ok_or(Error::InvalidBufferSize),
            PixFmt::Mono8 => self.convert_to_rgb8::<pixel_format::Mono8>(),
            PixFmt::BayerRG8 => self.convert_to_rgb8::<pixel_format::BayerRG8>(),
            PixFmt::BayerGB8 => self.convert_to_rgb8::<pixel_format::BayerGB8>(),
            PixFmt::BayerGR8 => self.convert_to_rgb8::<pixel_format::BayerGR8>(),
            PixFmt::BayerBG8 => self.convert_to_rgb8::<pixel_format::BayerBG8>(),
            other => Err(Error::UnsupportedPixelFormat(other)),
        }
    }

    fn convert_to_rgb8<F: PixelFormat>(&self) -> Result<OImage<pixel_format::RGB8>> {
        let src = ImageRef::<F>::new(self.width, self.height, self.stride, &self.image_data)
            .ok_or(Error::InvalidBufferSize)?;
        let dest_stride = self.width as usize * 3;
        let mut buf = vec![0u8; dest_stride * self.height as usize];
        {
            let mut dest: ImageBufferMutRef<pixel_format::RGB8> = ImageBufferMutRef::new(&mut buf);
            convert_image::convert_into(&src, &mut dest, dest_stride)?;
        }
        OImage::new(self.width, self.height, dest_stride, buf).ok_or(Error::InvalidBufferSize)
    }

    /// Encode to an in-memory PNG or JPEG buffer.
    pub fn encode(&self, format: SaveFormat) -> Result<Vec<u8>> {
        let opts = match format {
            SaveFormat::Png => convert_image::ImageOptions::Png,
            SaveFormat::Jpeg(quality) => convert_image::ImageOptions::Jpeg(quality),
        };
        match self.pixel_format {
            PixFmt::Mono8 => self.encode_typed::<pixel_format::Mono8>(opts),
            PixFmt::RGB8 => self.encode_typed::<pixel_format::RGB8>(opts),
            PixFmt::BayerRG8 => self.encode_typed::<pixel_format::BayerRG8>(opts),
            PixFmt::BayerGB8 => self.encode_typed::<pixel_format::BayerGB8>(opts),
            PixFmt::BayerGR8 => self.encode_typed::<pixel_format::BayerGR8>(opts),
            PixFmt::BayerBG8 => self.encode_typed::<pixel_format::BayerBG8>(opts),
            other => Err(Error::UnsupportedPixelFormat(other)),
        }
    }

    fn encode_typed<F: PixelFormat>(&self, opts: convert_image::ImageOptions) -> Result<Vec<u8>> {
        let src = ImageRef::<F>::new(self.width, self.height, self.stride, &self.image_data)
            .ok_or(Error::InvalidBufferSize)?;
        Ok(convert_image::frame_to_image(&src, opts)?)
    }

    /// Save with the format inferred from the file extension.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let format = SaveFormat::from_path(path.as_ref())
            .ok_or_else(|| Error::UnknownExtension(path.as_ref().to_path_buf()))?;
        self.save_as(path, format)
    }

    pub fn save_as<P: AsRef<Path>>(&self, path: P, format: SaveFormat) -> Result<()> {
        let buf = self.encode(format)?;
        std::fs::write(path, buf)?;
        Ok(())
    }

    /// Reconstruct the RGB color at one pixel.
    ///
    /// For Bayer RG8 data the missing channels come from the immediate
    /// neighbors of the RGGB cell; at the image border the neighbor is
    /// mirrored inward. Mono8 replicates the luminance into all channels.
    pub fn pixel_rgb(&self, x: u32, y: u32) -> Result<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return Err(Error::OutOfBounds {
                x,
                y,
                width: self.width,
                height: self.height,
            });
        }
        match self.pixel_format {
            PixFmt::Mono8 => {
                let v = self.at(x, y);
                Ok([v, v, v])
            }
            PixFmt::RGB8 => {
                let idx = y as usize * self.stride + x as usize * 3;
                Ok([
                    self.image_data[idx],
                    self.image_data[idx + 1],
                    self.image_data[idx + 2],
                ])
            }
            PixFmt::BayerRG8 => self.bayer_rg8_rgb(x, y),
            other => Err(Error::UnsupportedPixelFormat(other)),
        }
    }

    /// Average RGB over the rectangle `[x, x+w) x [y, y+h)`, clipped to the
    /// image bounds.
    pub fn region_mean_rgb(&self, x: u32, y: u32, w: u32, h: u32) -> Result<[u8; 3]> {
        let x_end = (x.saturating_add(w)).min(self.width);
        let y_end = (y.saturating_add(h)).min(self.height);
        if x >= x_end || y >= y_end {
            return Err(Error::EmptyRegion);
        }
        let mut total = [0u64; 3];
        let mut count = 0u64;
        for yy in y..y_end {
            for xx in x..x_end {
                let rgb = self.pixel_rgb(xx, yy)?;
                total[0] += rgb[0] as u64;
                total[1] += rgb[1] as u64;
                total[2] += rgb[2] as u64;
                count += 1;
            }
        }
        Ok([
            (total[0] / count) as u8,
            (total[1] / count) as u8,
            (total[2] / count) as u8,
        ])
    }

    fn at(&self, x: u32, y: u32) -> u8 {
        self.image_data[y as usize * self.stride + x as usize]
    }

    fn bayer_rg8_rgb(&self, x: u32, y: u32) -> Result<[u8; 3]> {
        if self.width < 2 || self.height < 2 {
            return Err(Error::ImageTooSmall);
        }
        // Mirrored neighbors keep the same RGGB parity (they differ by 2 when
        // reflected at the border).
        let xm = if x > 0 { x - 1 } else { x + 1 };
        let xp = if x + 1 < self.width { x + 1 } else { x - 1 };
        let ym = if y > 0 { y - 1 } else { y + 1 };
        let yp = if y + 1 < self.height { y + 1 } else { y - 1 };

        let (r, g, b) = match (x % 2, y % 2) {
            // red site
            (0, 0) => (
                self.at(x, y),
                ((self.at(xp, y) as u16 + self.at(x, yp) as u16) / 2) as u8,
                self.at(xp, yp),
            ),
            // green site on a red row
            (1, 0) => (self.at(xm, y), self.at(x, y), self.at(x, yp)),
            // green site on a blue row
            (0, 1) => (self.at(x, ym), self.at(x, y), self.at(xp, y)),
            // blue site
            _ => (
                self.at(xm, ym),
                ((self.at(xm, y) as u16 + self.at(x, ym) as u16) / 2) as u8,
                self.at(x, y),
            ),
        };
        Ok([r, g, b])
    }
}

/// Draw a hollow square outline centered on `(x, y)` onto an RGB8 image,
/// e.g. to mark a sampled region before saving. Pixels falling outside the
/// image are skipped.
pub fn draw_square(
    image: &mut dyn ImageMutStride<pixel_format::RGB8>,
    x: i64,
    y: i64,
    half_size: i64,
    rgb: [u8; 3],
) {
    let width = image.width() as i64;
    let height = image.height() as i64;
    let stride = image.stride();
    for i in -half_size..=half_size {
        for j in -half_size..=half_size {
            if i.abs() != half_size && j.abs() != half_size {
                continue;
            }
            let (px, py) = (x + i, y + j);
            if px < 0 || px >= width || py < 0 || py >= height {
                continue;
            }
            let idx = py as usize * stride + px as usize * 3;
            image.buffer_mut_ref().data[idx..idx + 3].copy_from_slice(&rgb);
        }
    }
}

/// Save an already-converted RGB8 image, inferring the format from the file
/// extension as [FrameBuffer::save] does.
pub fn save_rgb8<P: AsRef<Path>>(
    image: &dyn ImageStride<pixel_format::RGB8>,
    path: P,
) -> Result<()> {
    let format = SaveFormat::from_path(path.as_ref())
        .ok_or_else(|| Error::UnknownExtension(path.as_ref().to_path_buf()))?;
    let opts = match format {
        SaveFormat::Png => convert_image::ImageOptions::Png,
        SaveFormat::Jpeg(quality) => convert_image::ImageOptions::Jpeg(quality),
    };
    let buf = convert_image::frame_to_image(image, opts)?;
    std::fs::write(path, buf)?;
    Ok(())
}
