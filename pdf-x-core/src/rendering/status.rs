//! Content stream interpreter.
//!
//! [`RenderStatus`] holds the graphics state of one layer while its
//! operations are replayed against a [`Device`]. Malformed operations are
//! logged and skipped; only device failures abort rendering.

use super::color_space::resolve_color_space;
use super::device::{Device, Paint, PathDrawMode};
use super::font::LoadedFont;
use super::graphics_state::{
    Color, ColorSpace, FillRule, GraphicsState, LineCap, LineJoin, TextRenderingMode,
};
use super::image::decode_image;
use super::matrix::Matrix;
use super::options::RenderOptions;
use super::path::Path;
use crate::core::content_stream::{self, OpCode, Operation};
use crate::core::error::{PDFError, PDFResult};
use crate::core::page::normalize_rect;
use crate::core::parser::{Dict, DictExt, PDFObject, PDFStream};
use crate::core::xref::XRef;
use rustc_hash::FxHashMap;
use std::mem;
use std::sync::Arc;

/// Interpreter state for one layer.
pub struct RenderStatus {
    state: GraphicsState,
    state_stack: Vec<GraphicsState>,

    /// Saved states that belong to an enclosing form or glyph; `Q` stops here
    floor: usize,

    path: Path,
    pending_clip: Option<FillRule>,

    /// One entry per open marked-content sequence: true when hidden
    marked_content: Vec<bool>,

    /// Current form XObject / Type3 glyph nesting
    nesting: usize,
    max_nesting: usize,
    glyph_depth: usize,

    /// Inside a `d1` glyph: color operators are ignored
    uncolored_glyph: bool,

    /// Fonts by object number
    fonts: FxHashMap<u32, Arc<LoadedFont>>,
}

impl RenderStatus {
    pub fn new(object_to_device: Matrix, max_nesting: usize) -> Self {
        RenderStatus {
            state: GraphicsState::new(object_to_device),
            state_stack: Vec::new(),
            floor: 0,
            path: Path::new(),
            pending_clip: None,
            marked_content: Vec::new(),
            nesting: 0,
            max_nesting,
            glyph_depth: 0,
            uncolored_glyph: false,
            fonts: FxHashMap::default(),
        }
    }

    pub fn state(&self) -> &GraphicsState {
        &self.state
    }

    /// Saves the device state for the layer.
    pub fn begin<D: Device + ?Sized>(&mut self, device: &mut D) {
        device.save_state();
    }

    /// Unwinds unbalanced `q` operators and the layer's own device state.
    pub fn finish<D: Device + ?Sized>(&mut self, device: &mut D) {
        while let Some(state) = self.state_stack.pop() {
            self.state = state;
            device.restore_state();
        }
        self.floor = 0;
        device.restore_state();
    }

    /// Interprets one operation. Errors are returned only when the device
    /// failed; content errors are logged.
    pub fn process_operation<D: Device + ?Sized>(
        &mut self,
        xref: &mut XRef,
        device: &mut D,
        options: &RenderOptions,
        op: &Operation,
        resources: &Dict,
    ) -> PDFResult<()> {
        Painter {
            status: self,
            xref,
            device,
            options,
        }
        .execute(op, resources)
    }
}

fn is_fatal(err: &PDFError) -> bool {
    matches!(err, PDFError::Rendering(_))
}

/// Borrows everything one operation needs.
struct Painter<'a, D: Device + ?Sized> {
    status: &'a mut RenderStatus,
    xref: &'a mut XRef,
    device: &'a mut D,
    options: &'a RenderOptions,
}

impl<D: Device + ?Sized> Painter<'_, D> {
    fn execute(&mut self, op: &Operation, resources: &Dict) -> PDFResult<()> {
        log::trace!("{}", op.op);
        match self.dispatch(op, resources) {
            Err(e) if is_fatal(&e) => Err(e),
            Err(e) => {
                log::warn!("skipping {}: {}", op.op, e);
                Ok(())
            }
            Ok(()) => Ok(()),
        }
    }

    fn run(&mut self, ops: &[Operation], resources: &Dict) -> PDFResult<()> {
        for op in ops {
            self.execute(op, resources)?;
        }
        Ok(())
    }

    fn state(&mut self) -> &mut GraphicsState {
        &mut self.status.state
    }

    fn is_hidden(&self) -> bool {
        self.status.marked_content.iter().any(|hidden| *hidden)
    }

    fn dispatch(&mut self, op: &Operation, resources: &Dict) -> PDFResult<()> {
        match op.op {
            // Graphics state
            OpCode::Save => self.save(),
            OpCode::Restore => self.restore(),
            OpCode::Transform => {
                let m = matrix_operand(op)?;
                let state = self.state();
                state.ctm = m.multiply(&state.ctm);
            }
            OpCode::SetLineWidth => self.state().stroke.line_width = op.number(0)?,
            OpCode::SetLineCap => self.state().stroke.line_cap = LineCap::from_number(op.number(0)?),
            OpCode::SetLineJoin => {
                self.state().stroke.line_join = LineJoin::from_number(op.number(0)?)
            }
            OpCode::SetMiterLimit => self.state().stroke.miter_limit = op.number(0)?,
            OpCode::SetDash => {
                let dashes = op
                    .args
                    .first()
                    .and_then(PDFObject::as_number_array)
                    .unwrap_or_default();
                let phase = op.number(1).unwrap_or(0.0);
                let stroke = &mut self.state().stroke;
                stroke.dash_array = dashes;
                stroke.dash_offset = phase;
            }
            OpCode::SetRenderingIntent | OpCode::SetFlatness => {}
            OpCode::SetGState => self.set_gstate(op, resources)?,

            // Path construction
            OpCode::MoveTo => {
                op.expect_args(2)?;
                self.status.path.move_to(op.number(0)?, op.number(1)?);
            }
            OpCode::LineTo => {
                op.expect_args(2)?;
                self.status.path.line_to(op.number(0)?, op.number(1)?);
            }
            OpCode::CurveTo => {
                op.expect_args(6)?;
                let n = op.numbers()?;
                self.status.path.curve_to(n[0], n[1], n[2], n[3], n[4], n[5]);
            }
            OpCode::CurveTo2 => {
                op.expect_args(4)?;
                let n = op.numbers()?;
                self.status.path.curve_to_v(n[0], n[1], n[2], n[3]);
            }
            OpCode::CurveTo3 => {
                op.expect_args(4)?;
                let n = op.numbers()?;
                self.status.path.curve_to(n[0], n[1], n[2], n[3], n[2], n[3]);
            }
            OpCode::ClosePath => self.status.path.close_path(),
            OpCode::Rectangle => {
                op.expect_args(4)?;
                let n = op.numbers()?;
                self.status.path.rect(n[0], n[1], n[2], n[3]);
            }

            // Path painting
            OpCode::Stroke => self.paint_path(Some(PathDrawMode::Stroke))?,
            OpCode::CloseStroke => {
                self.status.path.close_path();
                self.paint_path(Some(PathDrawMode::Stroke))?;
            }
            OpCode::Fill | OpCode::FillCompat => {
                self.paint_path(Some(PathDrawMode::Fill(FillRule::NonZero)))?
            }
            OpCode::EOFill => self.paint_path(Some(PathDrawMode::Fill(FillRule::EvenOdd)))?,
            OpCode::FillStroke => {
                self.paint_path(Some(PathDrawMode::FillStroke(FillRule::NonZero)))?
            }
            OpCode::EOFillStroke => {
                self.paint_path(Some(PathDrawMode::FillStroke(FillRule::EvenOdd)))?
            }
            OpCode::CloseFillStroke => {
                self.status.path.close_path();
                self.paint_path(Some(PathDrawMode::FillStroke(FillRule::NonZero)))?;
            }
            OpCode::CloseEOFillStroke => {
                self.status.path.close_path();
                self.paint_path(Some(PathDrawMode::FillStroke(FillRule::EvenOdd)))?;
            }
            OpCode::EndPath => self.paint_path(None)?,
            OpCode::Clip => self.status.pending_clip = Some(FillRule::NonZero),
            OpCode::EOClip => self.status.pending_clip = Some(FillRule::EvenOdd),

            // Text objects and state
            OpCode::BeginText => {
                let text = &mut self.state().text;
                text.text_matrix = Matrix::IDENTITY;
                text.line_matrix = Matrix::IDENTITY;
            }
            OpCode::EndText => {}
            OpCode::SetCharSpacing => self.state().text.char_spacing = op.number(0)?,
            OpCode::SetWordSpacing => self.state().text.word_spacing = op.number(0)?,
            OpCode::SetHScale => self.state().text.horizontal_scaling = op.number(0)? / 100.0,
            OpCode::SetLeading => self.state().text.leading = op.number(0)?,
            OpCode::SetFont => self.set_font(op, resources)?,
            OpCode::SetTextRenderingMode => {
                self.state().text.render_mode = TextRenderingMode::from_number(op.number(0)?)
            }
            OpCode::SetTextRise => self.state().text.rise = op.number(0)?,

            // Text positioning
            OpCode::MoveText => {
                op.expect_args(2)?;
                self.move_text(op.number(0)?, op.number(1)?);
            }
            OpCode::SetLeadingMoveText => {
                op.expect_args(2)?;
                let ty = op.number(1)?;
                self.state().text.leading = -ty;
                self.move_text(op.number(0)?, ty);
            }
            OpCode::SetTextMatrix => {
                let m = matrix_operand(op)?;
                let text = &mut self.state().text;
                text.text_matrix = m;
                text.line_matrix = m;
            }
            OpCode::NextLine => self.next_line(),

            // Text showing
            OpCode::ShowText => self.show_text(string_operand(op, 0)?, resources)?,
            OpCode::ShowSpacedText => self.show_spaced_text(op, resources)?,
            OpCode::NextLineShowText => {
                self.next_line();
                self.show_text(string_operand(op, 0)?, resources)?;
            }
            OpCode::NextLineSetSpacingShowText => {
                op.expect_args(3)?;
                self.state().text.word_spacing = op.number(0)?;
                self.state().text.char_spacing = op.number(1)?;
                self.next_line();
                self.show_text(string_operand(op, 2)?, resources)?;
            }

            // Type3 glyph metrics
            OpCode::SetCharWidth => {}
            OpCode::SetCharWidthAndBounds => {
                if self.status.glyph_depth > 0 {
                    self.status.uncolored_glyph = true;
                }
            }

            // Color
            OpCode::SetStrokeColorSpace | OpCode::SetFillColorSpace => {
                if !self.status.uncolored_glyph {
                    let operand = op.args.first().ok_or_else(|| {
                        PDFError::content_stream_error(op.op.to_command(), "missing color space")
                    })?;
                    let space = resolve_color_space(self.xref, operand, resources)?;
                    let color = space.initial_color();
                    let state = self.state();
                    if op.op == OpCode::SetStrokeColorSpace {
                        state.stroke_space = space;
                        state.stroke_color = color;
                    } else {
                        state.fill_space = space;
                        state.fill_color = color;
                    }
                }
            }
            OpCode::SetStrokeColor | OpCode::SetStrokeColorN => {
                if !self.status.uncolored_glyph {
                    let values = color_operands(op);
                    let state = self.state();
                    state.stroke_color = state.stroke_space.color(&values);
                }
            }
            OpCode::SetFillColor | OpCode::SetFillColorN => {
                if !self.status.uncolored_glyph {
                    let values = color_operands(op);
                    let state = self.state();
                    state.fill_color = state.fill_space.color(&values);
                }
            }
            OpCode::SetStrokeGray => {
                self.set_device_color(true, ColorSpace::DeviceGray, Color::Gray(op.number(0)?))
            }
            OpCode::SetFillGray => {
                self.set_device_color(false, ColorSpace::DeviceGray, Color::Gray(op.number(0)?))
            }
            OpCode::SetStrokeRGBColor | OpCode::SetFillRGBColor => {
                op.expect_args(3)?;
                let n = op.numbers()?;
                let stroke = op.op == OpCode::SetStrokeRGBColor;
                self.set_device_color(stroke, ColorSpace::DeviceRGB, Color::RGB(n[0], n[1], n[2]));
            }
            OpCode::SetStrokeCMYKColor | OpCode::SetFillCMYKColor => {
                op.expect_args(4)?;
                let n = op.numbers()?;
                let stroke = op.op == OpCode::SetStrokeCMYKColor;
                let color = Color::CMYK(n[0], n[1], n[2], n[3]);
                self.set_device_color(stroke, ColorSpace::DeviceCMYK, color);
            }

            OpCode::ShadingFill => log::debug!("shading fill not painted"),

            // Images and XObjects
            OpCode::BeginInlineImage => self.paint_inline_image(op, resources)?,
            OpCode::BeginImageData | OpCode::EndInlineImage => {}
            OpCode::PaintXObject => self.paint_xobject(op, resources)?,

            // Marked content
            OpCode::MarkPoint | OpCode::MarkPointProps => {}
            OpCode::BeginMarkedContent => self.status.marked_content.push(false),
            OpCode::BeginMarkedContentProps => {
                let hidden = match self.marked_content_hidden(op, resources) {
                    Ok(hidden) => hidden,
                    Err(e) => {
                        log::warn!("cannot evaluate optional content: {}", e);
                        false
                    }
                };
                self.status.marked_content.push(hidden);
            }
            OpCode::EndMarkedContent => {
                if self.status.marked_content.pop().is_none() {
                    log::warn!("EMC without matching BMC/BDC");
                }
            }

            OpCode::BeginCompat | OpCode::EndCompat => {}
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Graphics state
    // ------------------------------------------------------------------

    fn save(&mut self) {
        self.status.state_stack.push(self.status.state.clone());
        self.device.save_state();
    }

    fn restore(&mut self) {
        if self.status.state_stack.len() <= self.status.floor {
            log::warn!("Q without matching q");
            return;
        }
        if let Some(state) = self.status.state_stack.pop() {
            self.status.state = state;
            self.device.restore_state();
        }
    }

    fn set_gstate(&mut self, op: &Operation, resources: &Dict) -> PDFResult<()> {
        let name = name_operand(op, 0)?;
        let gs = lookup_resource(self.xref, resources, "ExtGState", name)?;
        let gs = self.xref.fetch_if_ref(&gs)?.as_dict().cloned().unwrap_or_default();

        let state = &mut self.status.state;
        if let Some(width) = gs.get_number("LW") {
            state.stroke.line_width = width;
        }
        if let Some(cap) = gs.get_number("LC") {
            state.stroke.line_cap = LineCap::from_number(cap);
        }
        if let Some(join) = gs.get_number("LJ") {
            state.stroke.line_join = LineJoin::from_number(join);
        }
        if let Some(limit) = gs.get_number("ML") {
            state.stroke.miter_limit = limit;
        }
        if let Some(dash) = gs.get_array("D") {
            state.stroke.dash_array = dash
                .first()
                .and_then(|d| d.as_number_array())
                .unwrap_or_default();
            state.stroke.dash_offset = dash.get(1).and_then(|p| p.as_number()).unwrap_or(0.0);
        }
        if let Some(alpha) = gs.get_number("CA") {
            state.stroke_alpha = alpha.clamp(0.0, 1.0);
        }
        if let Some(alpha) = gs.get_number("ca") {
            state.fill_alpha = alpha.clamp(0.0, 1.0);
        }
        Ok(())
    }

    fn set_device_color(&mut self, stroke: bool, space: ColorSpace, color: Color) {
        if self.status.uncolored_glyph {
            return;
        }
        let state = self.state();
        if stroke {
            state.stroke_space = space;
            state.stroke_color = color;
        } else {
            state.fill_space = space;
            state.fill_color = color;
        }
    }

    // ------------------------------------------------------------------
    // Painting
    // ------------------------------------------------------------------

    fn fill_paint(&self) -> Paint {
        Paint::new(self.status.state.fill_color, self.status.state.fill_alpha)
    }

    fn stroke_paint(&self) -> Paint {
        Paint::new(self.status.state.stroke_color, self.status.state.stroke_alpha)
    }

    /// Glyph fills follow the cleartype option, everything else is
    /// anti-aliased.
    fn anti_alias(&self) -> bool {
        self.status.glyph_depth == 0 || self.options.cleartype()
    }

    /// Paints (or just ends) the current path, then applies a pending clip.
    fn paint_path(&mut self, mode: Option<PathDrawMode>) -> PDFResult<()> {
        let path = mem::take(&mut self.status.path);
        let ctm = self.status.state.ctm;
        if let Some(mode) = mode
            && !path.is_empty()
            && !self.is_hidden()
        {
            let (fill, stroke) = (self.fill_paint(), self.stroke_paint());
            let anti_alias = self.anti_alias();
            self.device.draw_path(
                &path,
                &ctm,
                mode,
                &fill,
                &stroke,
                &self.status.state.stroke,
                anti_alias,
            )?;
        }
        if let Some(rule) = self.status.pending_clip.take() {
            self.device.set_clip_path(&path, &ctm, rule)?;
        }
        Ok(())
    }

    fn paint_xobject(&mut self, op: &Operation, resources: &Dict) -> PDFResult<()> {
        let name = name_operand(op, 0)?;
        let entry = lookup_resource(self.xref, resources, "XObject", name)?;
        let resolved = self.xref.fetch_if_ref(&entry)?;
        let stream = resolved
            .as_stream()
            .cloned()
            .ok_or_else(|| PDFError::Format(format!("XObject /{} is not a stream", name)))?;

        if self.is_hidden() {
            return Ok(());
        }
        if let Some(oc) = stream.dict.get("OC")
            && !self.oc_visible(oc)?
        {
            log::debug!("XObject /{} hidden by optional content", name);
            return Ok(());
        }

        match stream.dict.get_name("Subtype") {
            Some("Image") => self.paint_image(&stream, resources),
            Some("Form") => self.paint_form(&stream, resources),
            other => {
                log::debug!("XObject /{} of subtype {:?} not painted", name, other);
                Ok(())
            }
        }
    }

    fn paint_inline_image(&mut self, op: &Operation, resources: &Dict) -> PDFResult<()> {
        if self.is_hidden() {
            return Ok(());
        }
        let dict = op.args.first().and_then(PDFObject::as_dict).cloned();
        let data = op.args.get(1).and_then(PDFObject::as_bytes).map(<[u8]>::to_vec);
        let (Some(dict), Some(data)) = (dict, data) else {
            return Err(PDFError::content_stream_error("BI", "malformed inline image"));
        };
        self.paint_image(&PDFStream { dict, data }, resources)
    }

    fn paint_image(&mut self, stream: &PDFStream, resources: &Dict) -> PDFResult<()> {
        let fill = self.fill_paint();
        let image = decode_image(self.xref, stream, resources, &fill)?;
        let ctm = self.status.state.ctm;
        self.device.draw_image(&image, &ctm, self.status.state.fill_alpha)
    }

    fn paint_form(&mut self, stream: &PDFStream, resources: &Dict) -> PDFResult<()> {
        if self.status.nesting >= self.status.max_nesting {
            log::warn!("form XObjects nested deeper than {}", self.status.max_nesting);
            return Ok(());
        }
        let data = self.xref.decode_stream_data(stream)?;
        let ops = content_stream::parse_content(&data);

        let matrix = stream
            .dict
            .get("Matrix")
            .and_then(PDFObject::as_number_array)
            .filter(|m| m.len() == 6)
            .map(|m| Matrix::new(m[0], m[1], m[2], m[3], m[4], m[5]))
            .unwrap_or(Matrix::IDENTITY);
        let bbox = stream
            .dict
            .get("BBox")
            .and_then(normalize_rect);
        let form_resources = self
            .xref
            .get_resolved(&stream.dict, "Resources")?
            .and_then(|r| r.as_dict().cloned())
            .unwrap_or_else(|| resources.clone());

        let ctm = matrix.multiply(&self.status.state.ctm);
        self.run_nested(&ops, &form_resources, ctm, bbox)
    }

    /// Runs a form or glyph procedure inside its own saved state.
    fn run_nested(
        &mut self,
        ops: &[Operation],
        resources: &Dict,
        ctm: Matrix,
        clip: Option<[f64; 4]>,
    ) -> PDFResult<()> {
        self.save();
        let saved_floor = mem::replace(&mut self.status.floor, self.status.state_stack.len());
        let saved_path = mem::take(&mut self.status.path);
        let saved_clip = self.status.pending_clip.take();
        let marked_depth = self.status.marked_content.len();
        self.status.state.ctm = ctm;
        self.status.nesting += 1;

        let result = (|| {
            if let Some([x0, y0, x1, y1]) = clip {
                let mut rect = Path::new();
                rect.rect(x0, y0, x1 - x0, y1 - y0);
                self.device.set_clip_path(&rect, &ctm, FillRule::NonZero)?;
            }
            self.run(ops, resources)
        })();

        self.status.nesting -= 1;
        while self.status.state_stack.len() > self.status.floor {
            self.restore();
        }
        self.status.marked_content.truncate(marked_depth);
        self.status.floor = saved_floor;
        self.status.path = saved_path;
        self.status.pending_clip = saved_clip;
        self.restore();
        result
    }

    // ------------------------------------------------------------------
    // Text
    // ------------------------------------------------------------------

    fn set_font(&mut self, op: &Operation, resources: &Dict) -> PDFResult<()> {
        op.expect_args(2)?;
        self.state().text.font_size = op.number(1)?;
        let name = name_operand(op, 0)?;
        let entry = match lookup_resource(self.xref, resources, "Font", name) {
            Ok(entry) => entry,
            Err(e) => {
                self.state().text.font = None;
                return Err(e);
            }
        };

        let cached = entry
            .as_reference()
            .and_then(|r| self.status.fonts.get(&r.num).cloned());
        let font = match cached {
            Some(font) => font,
            None => {
                let dict = self
                    .xref
                    .fetch_if_ref(&entry)?
                    .as_dict()
                    .cloned()
                    .ok_or_else(|| PDFError::Format(format!("font /{} is not a dictionary", name)))?;
                let font = Arc::new(LoadedFont::load(self.xref, &dict)?);
                if let Some(r) = entry.as_reference() {
                    self.status.fonts.insert(r.num, font.clone());
                }
                font
            }
        };
        self.state().text.font = Some(font);
        Ok(())
    }

    fn move_text(&mut self, tx: f64, ty: f64) {
        let text = &mut self.state().text;
        text.line_matrix = Matrix::translate(tx, ty).multiply(&text.line_matrix);
        text.text_matrix = text.line_matrix;
    }

    fn next_line(&mut self) {
        let leading = self.state().text.leading;
        self.move_text(0.0, -leading);
    }

    fn show_text(&mut self, bytes: &[u8], resources: &Dict) -> PDFResult<()> {
        let font = self
            .status
            .state
            .text
            .font
            .clone()
            .ok_or_else(|| PDFError::content_stream_error("Tj", "no font selected"))?;
        let single_byte = font.code_length() == 1;
        let mut outlines = Path::new();

        for code in font.codes(bytes) {
            if font.is_type3() {
                self.paint_type3_glyph(&font, code, resources)?;
            } else if let Some(outline) = font.glyph_outline(code) {
                let glyph_to_user = font.font_matrix().multiply(&self.text_space());
                outlines.append_transformed(&outline, &glyph_to_user);
            }
            let text = &mut self.status.state.text;
            let mut tx = font.advance(code) * text.font_size + text.char_spacing;
            if single_byte && code == 32 {
                tx += text.word_spacing;
            }
            tx *= text.horizontal_scaling;
            text.text_matrix = Matrix::translate(tx, 0.0).multiply(&text.text_matrix);
        }
        self.paint_text_outlines(&outlines)
    }

    /// Text space (font size, scaling and rise applied) to user space.
    fn text_space(&self) -> Matrix {
        let text = &self.status.state.text;
        Matrix::new(
            text.font_size * text.horizontal_scaling,
            0.0,
            0.0,
            text.font_size,
            0.0,
            text.rise,
        )
        .multiply(&text.text_matrix)
    }

    /// Fills and/or strokes glyph outlines collected in user space. Clipping
    /// render modes paint like their non-clipping counterparts.
    fn paint_text_outlines(&mut self, outlines: &Path) -> PDFResult<()> {
        let render_mode = self.status.state.text.render_mode;
        let mode = match (render_mode.fills(), render_mode.strokes()) {
            (true, true) => PathDrawMode::FillStroke(FillRule::NonZero),
            (true, false) => PathDrawMode::Fill(FillRule::NonZero),
            (false, true) => PathDrawMode::Stroke,
            (false, false) => return Ok(()),
        };
        if outlines.is_empty() || self.is_hidden() {
            return Ok(());
        }
        let (fill, stroke) = (self.fill_paint(), self.stroke_paint());
        let ctm = self.status.state.ctm;
        self.device.draw_path(
            outlines,
            &ctm,
            mode,
            &fill,
            &stroke,
            &self.status.state.stroke,
            self.options.cleartype(),
        )
    }

    fn show_spaced_text(&mut self, op: &Operation, resources: &Dict) -> PDFResult<()> {
        let items = op
            .args
            .first()
            .and_then(PDFObject::as_array)
            .ok_or_else(|| PDFError::content_stream_error("TJ", "operand is not an array"))?;
        for item in items {
            match &**item {
                PDFObject::Number(adjust) => {
                    let text = &mut self.status.state.text;
                    let tx = -adjust / 1000.0 * text.font_size * text.horizontal_scaling;
                    text.text_matrix = Matrix::translate(tx, 0.0).multiply(&text.text_matrix);
                }
                PDFObject::String(bytes) | PDFObject::HexString(bytes) => {
                    self.show_text(bytes, resources)?
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn paint_type3_glyph(&mut self, font: &LoadedFont, code: u32, resources: &Dict) -> PDFResult<()> {
        let text = &self.status.state.text;
        if self.is_hidden() || !text.render_mode.fills() {
            return Ok(());
        }
        let Some(ops) = font.glyph_procedure(code) else {
            return Ok(());
        };
        if self.status.nesting >= self.status.max_nesting {
            log::warn!("Type3 glyphs nested deeper than {}", self.status.max_nesting);
            return Ok(());
        }

        let glyph_to_device = font
            .font_matrix()
            .multiply(&self.text_space())
            .multiply(&self.status.state.ctm);
        let glyph_resources = font.resources().cloned().unwrap_or_else(|| resources.clone());

        let saved_uncolored = mem::replace(&mut self.status.uncolored_glyph, false);
        self.status.glyph_depth += 1;
        let result = self.run_nested(&ops, &glyph_resources, glyph_to_device, None);
        self.status.glyph_depth -= 1;
        self.status.uncolored_glyph = saved_uncolored;
        result
    }

    // ------------------------------------------------------------------
    // Optional content
    // ------------------------------------------------------------------

    fn oc_visible(&mut self, oc: &PDFObject) -> PDFResult<bool> {
        let options = self.options;
        match &options.oc_context {
            Some(context) => context.check_visibility(self.xref, oc),
            None => Ok(true),
        }
    }

    /// `/OC /Name BDC` hides its content when the named group or membership
    /// dictionary is off.
    fn marked_content_hidden(&mut self, op: &Operation, resources: &Dict) -> PDFResult<bool> {
        if op.name(0) != Some("OC") || self.options.oc_context.is_none() {
            return Ok(false);
        }
        let properties = match op.args.get(1) {
            Some(PDFObject::Name(name)) => lookup_resource(self.xref, resources, "Properties", name)?,
            Some(inline) => inline.clone(),
            None => return Ok(false),
        };
        Ok(!self.oc_visible(&properties)?)
    }
}

/// Looks up `name` in the resource category `category`, keeping indirect
/// entries unresolved.
fn lookup_resource(
    xref: &mut XRef,
    resources: &Dict,
    category: &str,
    name: &str,
) -> PDFResult<PDFObject> {
    xref.get_resolved(resources, category)?
        .and_then(|entries| entries.as_dict().and_then(|d| d.get(name)).cloned())
        .ok_or_else(|| PDFError::Format(format!("resource /{} /{} not found", category, name)))
}

fn matrix_operand(op: &Operation) -> PDFResult<Matrix> {
    op.expect_args(6)?;
    let n = op.numbers()?;
    Ok(Matrix::new(n[0], n[1], n[2], n[3], n[4], n[5]))
}

fn name_operand(op: &Operation, index: usize) -> PDFResult<&str> {
    op.name(index)
        .ok_or_else(|| PDFError::content_stream_error(op.op.to_command(), "expected a name"))
}

fn string_operand(op: &Operation, index: usize) -> PDFResult<&[u8]> {
    op.args
        .get(index)
        .and_then(PDFObject::as_bytes)
        .ok_or_else(|| PDFError::content_stream_error(op.op.to_command(), "expected a string"))
}

/// Numeric operands of `sc`/`scn`; a trailing pattern name is ignored.
fn color_operands(op: &Operation) -> Vec<f64> {
    op.args.iter().filter_map(PDFObject::as_number).collect()
}
