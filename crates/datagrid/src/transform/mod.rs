//! Named value transforms.
//!
//! A [`TransformRegistry`] maps transform names, as configured per column,
//! to [`Transform`] implementations that turn stored [`Value`]s into
//! display-ready [`CellValue`]s. Transforms never fail: values they cannot
//! handle come back in string form.
//!
//! # Example
//!
//! ```
//! use datagrid::transform::{CellValue, TransformContext, TransformRegistry};
//! use datagrid::Value;
//!
//! let registry = TransformRegistry::with_defaults();
//! let ctx = TransformContext::new();
//! let cell = registry.apply("bytes", &Value::Integer(2355), &ctx);
//! assert_eq!(cell, Some(CellValue::Text("2.3 kB".into())));
//!
//! registry.register_fn("shout", |value, _ctx| {
//!     CellValue::Text(value.to_string().to_uppercase())
//! });
//! ```

mod image;
mod text;
mod timestamp;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use datagrid_core::logging::targets;
use datagrid_image::{ImageCacheManager, Thumbnail};
use parking_lot::RwLock;

use crate::value::Value;

pub use image::ImageTransform;
pub use text::{
    BooleanTransform, BytesTransform, DegreeDecimalTransform, HtmlTransform, StringTransform,
    format_string, humanize_bytes, unescape_html,
};
pub use timestamp::{DatetimeTransform, MidnightTransform, TimestampTransform};

/// Name of the transform used for columns without one.
pub const DEFAULT_TRANSFORM: &str = "string";

/// Converts bytes that are not valid UTF-8 into display text.
pub type DecodeFallback = dyn Fn(&[u8]) -> String + Send + Sync;

/// A transformed, display-ready cell.
#[derive(Debug, Clone)]
pub enum CellValue {
    Text(String),
    /// A yes/no indicator icon.
    Indicator(bool),
    /// An editable check box.
    Toggle(bool),
    Image(Thumbnail),
    /// The untransformed value.
    Raw(Value),
}

impl CellValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_image(&self) -> Option<&Thumbnail> {
        match self {
            CellValue::Image(image) => Some(image),
            _ => None,
        }
    }
}

impl PartialEq for CellValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (CellValue::Text(a), CellValue::Text(b)) => a == b,
            (CellValue::Indicator(a), CellValue::Indicator(b)) => a == b,
            (CellValue::Toggle(a), CellValue::Toggle(b)) => a == b,
            (CellValue::Image(a), CellValue::Image(b)) => a.ptr_eq(b),
            (CellValue::Raw(a), CellValue::Raw(b)) => a == b,
            _ => false,
        }
    }
}

/// Image rendering parameters for the `image` transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageRequest {
    pub size: u32,
    pub fill: bool,
    pub border: bool,
    pub draft: bool,
    pub load_on_thread: bool,
}

impl Default for ImageRequest {
    fn default() -> Self {
        Self {
            size: 24,
            fill: true,
            border: false,
            draft: true,
            load_on_thread: true,
        }
    }
}

/// Per-call options passed to a transform.
#[derive(Clone, Copy)]
pub struct TransformContext<'a> {
    /// Cut text longer than this many characters.
    pub max_length: Option<usize>,
    /// Join multi-line text into one line.
    pub oneline: bool,
    pub decode_fallback: Option<&'a DecodeFallback>,
    /// The column's configured transform options.
    pub options: Option<&'a serde_json::Value>,
    pub image: Option<ImageRequest>,
    /// Whether the cell is on screen.
    pub visible: bool,
}

impl Default for TransformContext<'_> {
    fn default() -> Self {
        Self {
            max_length: None,
            oneline: false,
            decode_fallback: None,
            options: None,
            image: None,
            visible: true,
        }
    }
}

impl<'a> TransformContext<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    #[must_use]
    pub fn with_oneline(mut self, oneline: bool) -> Self {
        self.oneline = oneline;
        self
    }

    #[must_use]
    pub fn with_decode_fallback(mut self, fallback: &'a DecodeFallback) -> Self {
        self.decode_fallback = Some(fallback);
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: &'a serde_json::Value) -> Self {
        self.options = Some(options);
        self
    }

    #[must_use]
    pub fn with_image(mut self, request: ImageRequest) -> Self {
        self.image = Some(request);
        self
    }

    #[must_use]
    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }
}

impl fmt::Debug for TransformContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformContext")
            .field("max_length", &self.max_length)
            .field("oneline", &self.oneline)
            .field("decode_fallback", &self.decode_fallback.is_some())
            .field("options", &self.options)
            .field("image", &self.image)
            .field("visible", &self.visible)
            .finish()
    }
}

/// Turns a stored value into a display value.
pub trait Transform: Send + Sync {
    fn apply(&self, value: &Value, ctx: &TransformContext<'_>) -> CellValue;

    /// Convert a display-side value back to storage units, e.g. Unix seconds
    /// to the column's timestamp epoch. `None` when the transform has no
    /// inverse or `value` does not fit.
    fn inverse(&self, value: &Value) -> Option<Value> {
        let _ = value;
        None
    }
}

/// A transform backed by a closure.
pub struct FnTransform<F>(pub F);

impl<F> Transform for FnTransform<F>
where
    F: Fn(&Value, &TransformContext<'_>) -> CellValue + Send + Sync,
{
    fn apply(&self, value: &Value, ctx: &TransformContext<'_>) -> CellValue {
        (self.0)(value, ctx)
    }
}

/// Thread-safe map from transform name to implementation.
///
/// Registering an existing name replaces the previous transform.
#[derive(Default)]
pub struct TransformRegistry {
    transforms: RwLock<HashMap<String, Arc<dyn Transform>>>,
}

impl TransformRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every built-in transform except `image`, which needs
    /// a cache manager (see [`register_image_transform`](Self::register_image_transform)).
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.register("string", StringTransform);
        registry.register("html", HtmlTransform);
        registry.register("boolean", BooleanTransform);
        registry.register("bytes", BytesTransform);
        registry.register("datetime", DatetimeTransform);
        registry.register("degree_decimal_str", DegreeDecimalTransform);
        for (name, transform) in timestamp::builtin() {
            registry.register_arc(name, transform);
        }
        registry
    }

    /// Register `transform` under `name`, returning the one it replaced.
    pub fn register(
        &self,
        name: impl Into<String>,
        transform: impl Transform + 'static,
    ) -> Option<Arc<dyn Transform>> {
        self.register_arc(name, Arc::new(transform))
    }

    pub fn register_arc(
        &self,
        name: impl Into<String>,
        transform: Arc<dyn Transform>,
    ) -> Option<Arc<dyn Transform>> {
        let name = name.into();
        tracing::trace!(target: targets::TRANSFORM, %name, "registering transform");
        self.transforms.write().insert(name, transform)
    }

    /// Register a closure as a transform.
    pub fn register_fn<F>(&self, name: impl Into<String>, f: F) -> Option<Arc<dyn Transform>>
    where
        F: Fn(&Value, &TransformContext<'_>) -> CellValue + Send + Sync + 'static,
    {
        self.register(name, FnTransform(f))
    }

    /// Register the `image` transform, rendering through `cache`.
    pub fn register_image_transform(&self, cache: Arc<ImageCacheManager>) {
        self.register("image", ImageTransform::new(cache));
    }

    pub fn unregister(&self, name: &str) -> Option<Arc<dyn Transform>> {
        self.transforms.write().remove(name)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Transform>> {
        self.transforms.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.transforms.read().contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.transforms.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Apply the transform registered as `name`, if any.
    pub fn apply(&self, name: &str, value: &Value, ctx: &TransformContext<'_>) -> Option<CellValue> {
        // Clone out of the lock so a transform may use the registry itself.
        let transform = self.get(name)?;
        Some(transform.apply(value, ctx))
    }

    pub fn inverse(&self, name: &str, value: &Value) -> Option<Value> {
        self.get(name)?.inverse(value)
    }
}

impl fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformRegistry")
            .field("transforms", &self.names())
            .finish()
    }
}

static_assertions::assert_impl_all!(TransformRegistry: Send, Sync);
