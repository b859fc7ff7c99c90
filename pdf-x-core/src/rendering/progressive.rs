//! Progressive rendering.
//!
//! A [`ProgressiveRenderer`] walks the layers of a [`RenderContext`] and
//! replays their operations against a device. Rendering can be paused by a
//! [`PauseIndicator`] and resumed with [`ProgressiveRenderer::continue_render`].

use super::context::RenderContext;
use super::device::Device;
use super::options::RenderOptions;
use super::status::RenderStatus;
use crate::core::xref::XRef;
use crate::library;

/// Operations replayed between two pause checks.
const OPS_BETWEEN_PAUSE_CHECKS: usize = 100;

/// Asked periodically whether rendering should yield.
pub trait PauseIndicator {
    fn need_to_pause_now(&mut self) -> bool;
}

impl<F: FnMut() -> bool> PauseIndicator for F {
    fn need_to_pause_now(&mut self) -> bool {
        self()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderProgress {
    Ready,
    ToBeContinued,
    Done,
    Failed,
}

pub struct ProgressiveRenderer<'c> {
    context: &'c RenderContext,
    options: &'c RenderOptions,
    progress: RenderProgress,

    layer: usize,
    next_op: usize,

    /// Interpreter state of the layer in progress
    current: Option<RenderStatus>,
    max_form_depth: usize,
}

impl<'c> ProgressiveRenderer<'c> {
    pub fn new(context: &'c RenderContext, options: &'c RenderOptions) -> Self {
        let max_form_depth = library::config().unwrap_or_default().max_form_depth;
        ProgressiveRenderer {
            context,
            options,
            progress: RenderProgress::Ready,
            layer: 0,
            next_op: 0,
            current: None,
            max_form_depth,
        }
    }

    pub fn status(&self) -> RenderProgress {
        self.progress
    }

    /// Starts rendering. Does nothing unless the renderer is `Ready`.
    pub fn start<D: Device + ?Sized>(
        &mut self,
        xref: &mut XRef,
        device: &mut D,
        pause: Option<&mut dyn PauseIndicator>,
    ) -> RenderProgress {
        if self.progress != RenderProgress::Ready {
            return self.progress;
        }
        self.progress = RenderProgress::ToBeContinued;
        self.continue_render(xref, device, pause)
    }

    /// Resumes a paused render.
    pub fn continue_render<D: Device + ?Sized>(
        &mut self,
        xref: &mut XRef,
        device: &mut D,
        mut pause: Option<&mut dyn PauseIndicator>,
    ) -> RenderProgress {
        if self.progress != RenderProgress::ToBeContinued {
            return self.progress;
        }

        let context = self.context;
        let layers = context.layers();
        while self.layer < layers.len() {
            let layer = &layers[self.layer];
            let mut status = match self.current.take() {
                Some(status) => status,
                None => {
                    log::debug!("rendering layer for page {}", layer.page_index());
                    let mut status =
                        RenderStatus::new(*layer.object_to_device(), self.max_form_depth);
                    status.begin(device);
                    status
                }
            };

            let operations = layer.operations();
            let mut since_check = 0;
            while self.next_op < operations.len() {
                let op = &operations[self.next_op];
                self.next_op += 1;
                if let Err(e) =
                    status.process_operation(xref, device, self.options, op, layer.resources())
                {
                    log::error!("rendering page {} failed: {}", layer.page_index(), e);
                    status.finish(device);
                    self.progress = RenderProgress::Failed;
                    return self.progress;
                }

                since_check += 1;
                if since_check >= OPS_BETWEEN_PAUSE_CHECKS && self.next_op < operations.len() {
                    since_check = 0;
                    if let Some(pause) = pause.as_mut()
                        && pause.need_to_pause_now()
                    {
                        self.current = Some(status);
                        return self.progress;
                    }
                }
            }

            status.finish(device);
            self.layer += 1;
            self.next_op = 0;
        }

        self.progress = RenderProgress::Done;
        self.progress
    }
}
