//! Thumbnail rendering.
//!
//! [`ImageRenderer`] is the seam between the cache manager and the actual
//! pixel work. [`ThumbnailRenderer`] is the default implementation: it decodes
//! with the `image` crate, shrinks to the requested size, optionally adds a
//! white border with a soft drop shadow, and optionally centers the result on
//! a transparent square canvas.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage};

use crate::error::{ImageError, ImageResult};
use crate::image_cache::ImageCacheConfig;
use crate::media::MediaKind;

/// A rendered bitmap. Cheap to clone.
#[derive(Clone)]
pub struct Thumbnail(Arc<RgbaImage>);

impl Thumbnail {
    pub fn new(image: RgbaImage) -> Self {
        Self(Arc::new(image))
    }

    /// A fully transparent square of `size` pixels.
    pub fn blank(size: u32) -> Self {
        Self::new(RgbaImage::from_pixel(size, size, Rgba([0xff, 0xff, 0xff, 0])))
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.0.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.0.height()
    }

    /// The RGBA pixels.
    #[inline]
    pub fn pixels(&self) -> &RgbaImage {
        &self.0
    }

    /// Whether both thumbnails share the same pixel buffer.
    #[inline]
    pub fn ptr_eq(&self, other: &Thumbnail) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Thumbnail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Thumbnail({}x{})", self.width(), self.height())
    }
}

/// Cache key: the full set of rendering parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageKey {
    /// Source file. `None` asks for the generic image placeholder.
    pub path: Option<PathBuf>,
    /// Requested edge length in pixels.
    pub size: u32,
    /// Center the result on a `size` x `size` canvas.
    pub fill: bool,
    /// Add a border and drop shadow.
    pub border: bool,
    /// Trade quality for speed when scaling.
    pub draft: bool,
}

impl ImageKey {
    pub fn new(path: impl Into<PathBuf>, size: u32) -> Self {
        Self {
            path: Some(path.into()),
            size,
            fill: false,
            border: false,
            draft: false,
        }
    }

    /// Key for the generic placeholder at `size`.
    pub fn fallback(size: u32) -> Self {
        Self {
            path: None,
            size,
            fill: false,
            border: false,
            draft: false,
        }
    }

    #[must_use]
    pub fn with_fill(mut self, fill: bool) -> Self {
        self.fill = fill;
        self
    }

    #[must_use]
    pub fn with_border(mut self, border: bool) -> Self {
        self.border = border;
        self
    }

    #[must_use]
    pub fn with_draft(mut self, draft: bool) -> Self {
        self.draft = draft;
        self
    }

    /// Media kind of the source file; keys without a path count as images.
    pub fn media_kind(&self) -> MediaKind {
        self.path
            .as_deref()
            .map(MediaKind::guess)
            .unwrap_or(MediaKind::Image)
    }

    /// The same rendering options without a path.
    pub(crate) fn options(&self) -> ImageKey {
        ImageKey {
            path: None,
            ..self.clone()
        }
    }
}

/// Produces bitmaps for cache keys.
///
/// `render` may be slow and is called from the background thread; it must not
/// touch anything but its own inputs.
pub trait ImageRenderer: Send + Sync {
    /// Render the image described by `key`.
    fn render(&self, key: &ImageKey) -> ImageResult<Thumbnail>;

    /// A cheap stand-in shown while `key` is loading or after it failed.
    fn placeholder(&self, kind: MediaKind, key: &ImageKey) -> Thumbnail;
}

/// Default renderer built on the `image` crate.
#[derive(Debug, Clone)]
pub struct ThumbnailRenderer {
    border_size: u32,
    shadow_size: u32,
    shadow_offset: u32,
    fallback_max_size: u32,
}

impl Default for ThumbnailRenderer {
    fn default() -> Self {
        Self::from_config(&ImageCacheConfig::default())
    }
}

impl ThumbnailRenderer {
    pub fn from_config(config: &ImageCacheConfig) -> Self {
        Self {
            border_size: config.border_size,
            shadow_size: config.shadow_size,
            shadow_offset: config.shadow_offset,
            fallback_max_size: config.fallback_max_size,
        }
    }

    /// Edge length of a bordered image rendered at `size`.
    pub fn bordered_size(&self, size: u32) -> u32 {
        size + 2 * self.border_size + 2 * self.shadow_size + self.shadow_offset
    }

    fn decode(path: &Path) -> ImageResult<DynamicImage> {
        image::open(path).map_err(|source| ImageError::Decode {
            path: path.to_path_buf(),
            source,
        })
    }

    fn finish(&self, image: DynamicImage, key: &ImageKey) -> Thumbnail {
        let filter = if key.draft {
            FilterType::Triangle
        } else {
            FilterType::CatmullRom
        };
        // Shrink only, never enlarge.
        let image = if image.width() > key.size || image.height() > key.size {
            image.resize(key.size, key.size, filter)
        } else {
            image
        };

        let mut rgba = image.to_rgba8();
        let mut size = key.size;
        if key.border {
            rgba = self.add_border(&rgba);
            rgba = self.add_drop_shadow(&rgba);
            size = self.bordered_size(size);
        }
        if key.fill {
            rgba = center_on_canvas(&rgba, size);
        }
        Thumbnail::new(rgba)
    }

    fn add_border(&self, image: &RgbaImage) -> RgbaImage {
        let b = self.border_size;
        let mut framed = RgbaImage::from_pixel(
            image.width() + 2 * b,
            image.height() + 2 * b,
            Rgba([0xff, 0xff, 0xff, 0xff]),
        );
        imageops::overlay(&mut framed, image, i64::from(b), i64::from(b));
        framed
    }

    fn add_drop_shadow(&self, image: &RgbaImage) -> RgbaImage {
        let s = self.shadow_size;
        let offset = self.shadow_offset;
        let mut canvas = RgbaImage::new(
            image.width() + 2 * s + offset,
            image.height() + 2 * s + offset,
        );
        let shadow = Rgba([0, 0, 0, 0x80]);
        for y in 0..image.height() {
            for x in 0..image.width() {
                canvas.put_pixel(x + s + offset, y + s + offset, shadow);
            }
        }
        let mut canvas = if s > 0 {
            imageops::blur(&canvas, s as f32 / 2.0)
        } else {
            canvas
        };
        imageops::overlay(&mut canvas, image, i64::from(s), i64::from(s));
        canvas
    }

    fn glyph(&self, kind: MediaKind, size: u32) -> RgbaImage {
        let size = size.clamp(1, self.fallback_max_size.max(1));
        let [r, g, b, a] = kind.glyph_color();
        let frame = Rgba([r / 2, g / 2, b / 2, a]);
        let fill = Rgba([r, g, b, a]);
        RgbaImage::from_fn(size, size, |x, y| {
            if x == 0 || y == 0 || x == size - 1 || y == size - 1 {
                frame
            } else {
                fill
            }
        })
    }
}

impl ImageRenderer for ThumbnailRenderer {
    fn render(&self, key: &ImageKey) -> ImageResult<Thumbnail> {
        let Some(path) = key.path.as_deref() else {
            return Ok(self.placeholder(MediaKind::Image, key));
        };
        match MediaKind::guess(path) {
            MediaKind::Image => Ok(self.finish(Self::decode(path)?, key)),
            kind => Ok(self.placeholder(kind, key)),
        }
    }

    fn placeholder(&self, kind: MediaKind, key: &ImageKey) -> Thumbnail {
        let glyph = self.glyph(kind, key.size);
        self.finish(DynamicImage::ImageRgba8(glyph), key)
    }
}

fn center_on_canvas(image: &RgbaImage, size: u32) -> RgbaImage {
    let mut canvas = RgbaImage::from_pixel(size, size, Rgba([0xff, 0xff, 0xff, 0]));
    let x = (i64::from(size) - i64::from(image.width())) / 2;
    let y = (i64::from(size) - i64::from(image.height())) / 2;
    imageops::overlay(&mut canvas, image, x, y);
    canvas
}
