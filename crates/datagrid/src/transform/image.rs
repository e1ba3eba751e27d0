use std::fmt;
use std::sync::Arc;

use datagrid_image::{ImageCacheManager, ImageKey};

use crate::transform::{CellValue, ImageRequest, Transform, TransformContext};
use crate::value::Value;

/// Renders a file path into a thumbnail through the shared image cache.
///
/// Empty cells get a blank square. Cells that are off screen, and cells
/// without a usable path, get the generic placeholder without touching the
/// disk.
pub struct ImageTransform {
    cache: Arc<ImageCacheManager>,
}

impl ImageTransform {
    pub fn new(cache: Arc<ImageCacheManager>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<ImageCacheManager> {
        &self.cache
    }
}

impl Transform for ImageTransform {
    fn apply(&self, value: &Value, ctx: &TransformContext<'_>) -> CellValue {
        let request = ctx.image.unwrap_or_default();
        let path = match value {
            Value::Null => return CellValue::Image(self.cache.blank(request.size)),
            Value::Text(text) if text.is_empty() => {
                return CellValue::Image(self.cache.blank(request.size));
            }
            Value::Text(text) if ctx.visible => Some(text.as_str()),
            _ => None,
        };

        let ImageRequest {
            size,
            fill,
            border,
            draft,
            load_on_thread,
        } = request;
        let key = match path {
            Some(path) => ImageKey::new(path, size),
            None => ImageKey::fallback(size),
        }
        .with_fill(fill)
        .with_border(border)
        .with_draft(draft);

        CellValue::Image(self.cache.get_image(&key, load_on_thread && path.is_some()))
    }
}

impl fmt::Debug for ImageTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageTransform")
            .field("cached", &self.cache.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datagrid_image::{ImageCacheConfig, ImageRenderer, ImageResult, MediaKind, Thumbnail};
    use image::RgbaImage;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingRenderer {
        renders: Mutex<Vec<ImageKey>>,
    }

    impl ImageRenderer for RecordingRenderer {
        fn render(&self, key: &ImageKey) -> ImageResult<Thumbnail> {
            self.renders.lock().push(key.clone());
            Ok(Thumbnail::new(RgbaImage::new(key.size, key.size)))
        }

        fn placeholder(&self, _kind: MediaKind, _key: &ImageKey) -> Thumbnail {
            Thumbnail::new(RgbaImage::new(1, 1))
        }
    }

    fn transform() -> (ImageTransform, Arc<RecordingRenderer>) {
        let renderer = Arc::new(RecordingRenderer::default());
        let cache =
            ImageCacheManager::with_renderer(ImageCacheConfig::default(), renderer.clone()).unwrap();
        (ImageTransform::new(Arc::new(cache)), renderer)
    }

    fn sync_ctx<'a>() -> TransformContext<'a> {
        TransformContext::new().with_image(ImageRequest {
            size: 32,
            load_on_thread: false,
            ..ImageRequest::default()
        })
    }

    #[test]
    fn test_empty_value_is_blank() {
        let (transform, renderer) = transform();
        let cell = transform.apply(&Value::Null, &sync_ctx());
        let image = cell.as_image().unwrap();
        assert_eq!(image.width(), 32);
        assert!(renderer.renders.lock().is_empty());
        assert!(transform.apply(&Value::from(""), &sync_ctx()).as_image().unwrap().ptr_eq(image));
    }

    #[test]
    fn test_visible_path_is_rendered_with_options() {
        let (transform, renderer) = transform();
        let cell = transform.apply(&Value::from("/photos/a.png"), &sync_ctx());
        assert_eq!(cell.as_image().unwrap().width(), 32);

        let renders = renderer.renders.lock();
        assert_eq!(renders.len(), 1);
        assert_eq!(renders[0].path.as_deref(), Some(std::path::Path::new("/photos/a.png")));
        assert!(renders[0].fill);
        assert!(renders[0].draft);
        assert!(!renders[0].border);
    }

    #[test]
    fn test_hidden_cell_uses_fallback() {
        let (transform, renderer) = transform();
        let ctx = sync_ctx().with_visible(false);
        transform.apply(&Value::from("/photos/a.png"), &ctx);
        let renders = renderer.renders.lock();
        assert_eq!(renders.len(), 1);
        assert_eq!(renders[0].path, None);
    }
}
