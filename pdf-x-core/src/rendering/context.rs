//! Render context: the list of object layers to paint.
//!
//! A layer is one page's parsed content together with the matrix that maps
//! its user space to device pixels. The context owns no device and no
//! document; a [`ProgressiveRenderer`](super::progressive::ProgressiveRenderer)
//! walks it against both.

use super::matrix::Matrix;
use crate::core::content_stream::Operation;
use crate::core::page::Page;
use crate::core::parser::Dict;
use std::sync::Arc;

/// One page's objects and their placement.
#[derive(Debug, Clone)]
pub struct RenderLayer {
    page_index: usize,
    operations: Arc<[Operation]>,
    resources: Dict,

    /// User space to device space
    object_to_device: Matrix,
}

impl RenderLayer {
    pub fn page_index(&self) -> usize {
        self.page_index
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn resources(&self) -> &Dict {
        &self.resources
    }

    pub fn object_to_device(&self) -> &Matrix {
        &self.object_to_device
    }
}

#[derive(Debug, Default)]
pub struct RenderContext {
    layers: Vec<RenderLayer>,
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a page's object list. `matrix` maps page space (the rotated
    /// view box with its origin at the lower left) to device space.
    pub fn append_object_list(&mut self, page: &Page, matrix: &Matrix) {
        let object_to_device = page.page_matrix().multiply(matrix);
        log::trace!(
            "layer for page {}: object to device {:?}",
            page.index(),
            object_to_device.to_array()
        );
        self.layers.push(RenderLayer {
            page_index: page.index(),
            operations: page.operations(),
            resources: page.resources().clone(),
            object_to_device,
        });
    }

    pub fn layers(&self) -> &[RenderLayer] {
        &self.layers
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}
