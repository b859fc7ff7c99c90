//! Device trait for rendering backend abstraction.
//!
//! The interpreter in [`status`](super::status) turns content streams into
//! device calls; a device rasterizes them (see
//! [`SkiaDevice`](super::skia_device::SkiaDevice)) or records them for tests
//! ([`RecordingDevice`]).

use super::graphics_state::{Color, FillRule, StrokeProps};
use super::matrix::Matrix;
use super::path::Path;
use crate::core::error::PDFResult;
use std::ops::{Deref, DerefMut};

/// How to draw a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathDrawMode {
    Fill(FillRule),
    Stroke,
    FillStroke(FillRule),
}

impl PathDrawMode {
    pub fn fills(self) -> bool {
        !matches!(self, PathDrawMode::Stroke)
    }

    pub fn strokes(self) -> bool {
        !matches!(self, PathDrawMode::Fill(_))
    }
}

/// A solid paint: color plus constant alpha.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Paint {
    pub color: Color,
    pub alpha: f64,
}

impl Paint {
    pub fn new(color: Color, alpha: f64) -> Self {
        Paint { color, alpha }
    }

    /// Straight (non-premultiplied) RGBA bytes.
    pub fn rgba8(&self) -> [u8; 4] {
        let [r, g, b] = self.color.rgb8();
        [r, g, b, (self.alpha.clamp(0.0, 1.0) * 255.0).round() as u8]
    }
}

impl Default for Paint {
    fn default() -> Self {
        Paint::new(Color::black(), 1.0)
    }
}

/// A decoded image: straight RGBA, row-major, top row first.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// A rendering backend.
///
/// Paths and images are passed in user space together with the matrix that
/// maps them to device pixels. Images cover the unit square of their matrix,
/// with the first image row at the top (y = 1).
pub trait Device {
    /// Device size in pixels.
    fn width(&self) -> u32;
    fn height(&self) -> u32;

    /// Pushes the clip state.
    fn save_state(&mut self);

    /// Pops the clip state saved by the matching [`Device::save_state`].
    fn restore_state(&mut self);

    /// Intersects the clip with a device-space rectangle
    /// `[left, top, right, bottom]`.
    fn set_clip_rect(&mut self, rect: [f64; 4]);

    /// Intersects the clip with a path.
    fn set_clip_path(&mut self, path: &Path, matrix: &Matrix, rule: FillRule) -> PDFResult<()>;

    /// Fills and/or strokes a path.
    #[allow(clippy::too_many_arguments)]
    fn draw_path(
        &mut self,
        path: &Path,
        matrix: &Matrix,
        mode: PathDrawMode,
        fill: &Paint,
        stroke: &Paint,
        props: &StrokeProps,
        anti_alias: bool,
    ) -> PDFResult<()>;

    /// Draws an image into the unit square transformed by `matrix`.
    fn draw_image(&mut self, image: &ImageData, matrix: &Matrix, alpha: f64) -> PDFResult<()>;
}

/// Saves device state on creation and restores it when dropped, so the
/// restore also runs when rendering fails.
pub struct DeviceStateGuard<'d, D: Device + ?Sized> {
    device: &'d mut D,
}

impl<'d, D: Device + ?Sized> DeviceStateGuard<'d, D> {
    pub fn new(device: &'d mut D) -> Self {
        device.save_state();
        DeviceStateGuard { device }
    }
}

impl<D: Device + ?Sized> Deref for DeviceStateGuard<'_, D> {
    type Target = D;

    fn deref(&self) -> &D {
        self.device
    }
}

impl<D: Device + ?Sized> DerefMut for DeviceStateGuard<'_, D> {
    fn deref_mut(&mut self) -> &mut D {
        self.device
    }
}

impl<D: Device + ?Sized> Drop for DeviceStateGuard<'_, D> {
    fn drop(&mut self) {
        self.device.restore_state();
    }
}

/// One recorded device call.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    SaveState,
    RestoreState,
    ClipRect([f64; 4]),
    ClipPath {
        bbox: Option<[f64; 4]>,
        rule: FillRule,
    },
    DrawPath {
        /// Device-space bounds of the path's control points
        bbox: Option<[f64; 4]>,
        mode: PathDrawMode,
        fill: Paint,
        stroke: Paint,
        line_width: f64,
        anti_alias: bool,
    },
    DrawImage {
        width: u32,
        height: u32,
        /// Device-space bounds of the image
        bbox: [f64; 4],
        alpha: f64,
    },
}

/// A device that records calls instead of drawing.
#[derive(Debug, Default)]
pub struct RecordingDevice {
    pub width: u32,
    pub height: u32,
    pub calls: Vec<DeviceCall>,
}

impl RecordingDevice {
    pub fn new(width: u32, height: u32) -> Self {
        RecordingDevice {
            width,
            height,
            calls: Vec::new(),
        }
    }

    /// The recorded draw calls only.
    pub fn draws(&self) -> impl Iterator<Item = &DeviceCall> {
        self.calls
            .iter()
            .filter(|c| matches!(c, DeviceCall::DrawPath { .. } | DeviceCall::DrawImage { .. }))
    }
}

fn device_bbox(path: &Path, matrix: &Matrix) -> Option<[f64; 4]> {
    let (x0, y0, x1, y1) = path.bounding_box()?;
    Some(matrix.transform_rect([x0, y0, x1, y1]))
}

impl Device for RecordingDevice {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn save_state(&mut self) {
        self.calls.push(DeviceCall::SaveState);
    }

    fn restore_state(&mut self) {
        self.calls.push(DeviceCall::RestoreState);
    }

    fn set_clip_rect(&mut self, rect: [f64; 4]) {
        self.calls.push(DeviceCall::ClipRect(rect));
    }

    fn set_clip_path(&mut self, path: &Path, matrix: &Matrix, rule: FillRule) -> PDFResult<()> {
        self.calls.push(DeviceCall::ClipPath {
            bbox: device_bbox(path, matrix),
            rule,
        });
        Ok(())
    }

    fn draw_path(
        &mut self,
        path: &Path,
        matrix: &Matrix,
        mode: PathDrawMode,
        fill: &Paint,
        stroke: &Paint,
        props: &StrokeProps,
        anti_alias: bool,
    ) -> PDFResult<()> {
        self.calls.push(DeviceCall::DrawPath {
            bbox: device_bbox(path, matrix),
            mode,
            fill: *fill,
            stroke: *stroke,
            line_width: props.line_width,
            anti_alias,
        });
        Ok(())
    }

    fn draw_image(&mut self, image: &ImageData, matrix: &Matrix, alpha: f64) -> PDFResult<()> {
        self.calls.push(DeviceCall::DrawImage {
            width: image.width,
            height: image.height,
            bbox: matrix.transform_rect([0.0, 0.0, 1.0, 1.0]),
            alpha,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_guard_restores_on_drop() {
        let mut device = RecordingDevice::new(10, 10);
        {
            let mut guard = DeviceStateGuard::new(&mut device);
            guard.set_clip_rect([0.0, 0.0, 5.0, 5.0]);
        }
        assert_eq!(
            device.calls,
            vec![
                DeviceCall::SaveState,
                DeviceCall::ClipRect([0.0, 0.0, 5.0, 5.0]),
                DeviceCall::RestoreState
            ]
        );
    }

    #[test]
    fn test_draw_modes() {
        assert!(PathDrawMode::Fill(FillRule::NonZero).fills());
        assert!(!PathDrawMode::Fill(FillRule::EvenOdd).strokes());
        assert!(PathDrawMode::FillStroke(FillRule::NonZero).strokes());
        assert!(!PathDrawMode::Stroke.fills());
    }

    #[test]
    fn test_paint_rgba() {
        let paint = Paint::new(Color::RGB(1.0, 0.0, 0.0), 0.5);
        assert_eq!(paint.rgba8(), [255, 0, 0, 128]);
    }
}
