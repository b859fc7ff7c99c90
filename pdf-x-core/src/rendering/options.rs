//! Render options: quality flags and the optional content context.

use crate::core::optional_content::{OCContext, OCUsage};

/// Public render flag: anti-aliased (LCD-optimized) text.
pub const FPDF_LCD_TEXT: u32 = 0x02;

/// Public render flag: render for printing.
pub const FPDF_PRINTING: u32 = 0x800;

/// Option flag: anti-alias glyph fills.
pub const RENDER_CLEARTYPE: u32 = 0x04;

/// Additional flag (the public flags shifted right by 8): printing.
pub const ADD_FLAG_PRINTING: u32 = FPDF_PRINTING >> 8;

/// Options consulted while painting a page.
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    pub flags: u32,
    pub add_flags: u32,
    pub oc_context: Option<OCContext>,
}

impl RenderOptions {
    /// Translates public `FPDF_*` flags into render options.
    pub fn from_public_flags(flags: u32) -> Self {
        let mut options = RenderOptions::default();
        if flags & FPDF_LCD_TEXT != 0 {
            options.flags |= RENDER_CLEARTYPE;
        }
        options.add_flags = flags >> 8;
        options
    }

    pub fn with_oc_context(mut self, context: OCContext) -> Self {
        self.oc_context = Some(context);
        self
    }

    pub fn is_printing(&self) -> bool {
        self.add_flags & ADD_FLAG_PRINTING != 0
    }

    pub fn cleartype(&self) -> bool {
        self.flags & RENDER_CLEARTYPE != 0
    }

    /// Optional content usage implied by the flags.
    pub fn oc_usage(&self) -> OCUsage {
        if self.is_printing() {
            OCUsage::Print
        } else {
            OCUsage::View
        }
    }
}
