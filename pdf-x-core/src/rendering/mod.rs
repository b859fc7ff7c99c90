//! Rasterization.
//!
//! Content streams are replayed by [`status::RenderStatus`] against a
//! [`Device`]. [`SkiaDevice`] paints into a [`Bitmap`] with tiny-skia;
//! [`RecordingDevice`] only records the calls it receives.

pub mod bitmap;
pub mod color_space;
pub mod context;
pub mod device;
pub mod font;
pub mod glyph;
pub mod graphics_state;
pub mod image;
pub mod matrix;
pub mod options;
pub mod path;
pub mod progressive;
pub mod skia_device;
pub mod status;

pub use bitmap::{Bitmap, BitmapFormat};
pub use context::{RenderContext, RenderLayer};
pub use device::{
    Device, DeviceCall, DeviceStateGuard, ImageData, Paint, PathDrawMode, RecordingDevice,
};
pub use graphics_state::{
    Color, ColorSpace, FillRule, GraphicsState, LineCap, LineJoin, StrokeProps, TextRenderingMode,
};
pub use matrix::Matrix;
pub use options::RenderOptions;
pub use path::{Path, PathElement};
pub use progressive::{PauseIndicator, ProgressiveRenderer, RenderProgress};
pub use skia_device::SkiaDevice;
