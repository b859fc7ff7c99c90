//! Content stream parsing.
//!
//! Turns the operand/operator sequence of a page or form into a flat list of
//! [`Operation`]s. Parsing is tolerant: unknown operators are skipped and a
//! syntax error ends the stream, keeping every operation read so far.

use super::error::{PDFError, PDFResult};
use super::lexer::Lexer;
use super::parser::{Dict, PDFObject, Parser};
use super::stream::Stream;
use smallvec::SmallVec;
use std::fmt;

/// PDF content stream operator codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    // General graphics state
    SetLineWidth,
    SetLineCap,
    SetLineJoin,
    SetMiterLimit,
    SetDash,
    SetRenderingIntent,
    SetFlatness,
    SetGState,
    Save,
    Restore,
    Transform,

    // Path construction
    MoveTo,
    LineTo,
    CurveTo,
    CurveTo2,
    CurveTo3,
    ClosePath,
    Rectangle,

    // Path painting
    Stroke,
    CloseStroke,
    Fill,
    FillCompat,
    EOFill,
    FillStroke,
    EOFillStroke,
    CloseFillStroke,
    CloseEOFillStroke,
    EndPath,

    // Clipping
    Clip,
    EOClip,

    // Text objects and state
    BeginText,
    EndText,
    SetCharSpacing,
    SetWordSpacing,
    SetHScale,
    SetLeading,
    SetFont,
    SetTextRenderingMode,
    SetTextRise,

    // Text positioning and showing
    MoveText,
    SetLeadingMoveText,
    SetTextMatrix,
    NextLine,
    ShowText,
    ShowSpacedText,
    NextLineShowText,
    NextLineSetSpacingShowText,

    // Type 3 glyphs
    SetCharWidth,
    SetCharWidthAndBounds,

    // Color
    SetStrokeColorSpace,
    SetFillColorSpace,
    SetStrokeColor,
    SetStrokeColorN,
    SetFillColor,
    SetFillColorN,
    SetStrokeGray,
    SetFillGray,
    SetStrokeRGBColor,
    SetFillRGBColor,
    SetStrokeCMYKColor,
    SetFillCMYKColor,

    ShadingFill,

    /// `BI`; the parser folds `BI ... ID ... EI` into one operation whose
    /// arguments are the image dictionary and the raw data.
    BeginInlineImage,
    BeginImageData,
    EndInlineImage,

    PaintXObject,

    // Marked content
    MarkPoint,
    MarkPointProps,
    BeginMarkedContent,
    BeginMarkedContentProps,
    EndMarkedContent,

    // Compatibility
    BeginCompat,
    EndCompat,
}

const OPERATORS: &[(&str, OpCode)] = &[
    ("w", OpCode::SetLineWidth),
    ("J", OpCode::SetLineCap),
    ("j", OpCode::SetLineJoin),
    ("M", OpCode::SetMiterLimit),
    ("d", OpCode::SetDash),
    ("ri", OpCode::SetRenderingIntent),
    ("i", OpCode::SetFlatness),
    ("gs", OpCode::SetGState),
    ("q", OpCode::Save),
    ("Q", OpCode::Restore),
    ("cm", OpCode::Transform),
    ("m", OpCode::MoveTo),
    ("l", OpCode::LineTo),
    ("c", OpCode::CurveTo),
    ("v", OpCode::CurveTo2),
    ("y", OpCode::CurveTo3),
    ("h", OpCode::ClosePath),
    ("re", OpCode::Rectangle),
    ("S", OpCode::Stroke),
    ("s", OpCode::CloseStroke),
    ("f", OpCode::Fill),
    ("F", OpCode::FillCompat),
    ("f*", OpCode::EOFill),
    ("B", OpCode::FillStroke),
    ("B*", OpCode::EOFillStroke),
    ("b", OpCode::CloseFillStroke),
    ("b*", OpCode::CloseEOFillStroke),
    ("n", OpCode::EndPath),
    ("W", OpCode::Clip),
    ("W*", OpCode::EOClip),
    ("BT", OpCode::BeginText),
    ("ET", OpCode::EndText),
    ("Tc", OpCode::SetCharSpacing),
    ("Tw", OpCode::SetWordSpacing),
    ("Tz", OpCode::SetHScale),
    ("TL", OpCode::SetLeading),
    ("Tf", OpCode::SetFont),
    ("Tr", OpCode::SetTextRenderingMode),
    ("Ts", OpCode::SetTextRise),
    ("Td", OpCode::MoveText),
    ("TD", OpCode::SetLeadingMoveText),
    ("Tm", OpCode::SetTextMatrix),
    ("T*", OpCode::NextLine),
    ("Tj", OpCode::ShowText),
    ("TJ", OpCode::ShowSpacedText),
    ("'", OpCode::NextLineShowText),
    ("\"", OpCode::NextLineSetSpacingShowText),
    ("d0", OpCode::SetCharWidth),
    ("d1", OpCode::SetCharWidthAndBounds),
    ("CS", OpCode::SetStrokeColorSpace),
    ("cs", OpCode::SetFillColorSpace),
    ("SC", OpCode::SetStrokeColor),
    ("SCN", OpCode::SetStrokeColorN),
    ("sc", OpCode::SetFillColor),
    ("scn", OpCode::SetFillColorN),
    ("G", OpCode::SetStrokeGray),
    ("g", OpCode::SetFillGray),
    ("RG", OpCode::SetStrokeRGBColor),
    ("rg", OpCode::SetFillRGBColor),
    ("K", OpCode::SetStrokeCMYKColor),
    ("k", OpCode::SetFillCMYKColor),
    ("sh", OpCode::ShadingFill),
    ("BI", OpCode::BeginInlineImage),
    ("ID", OpCode::BeginImageData),
    ("EI", OpCode::EndInlineImage),
    ("Do", OpCode::PaintXObject),
    ("MP", OpCode::MarkPoint),
    ("DP", OpCode::MarkPointProps),
    ("BMC", OpCode::BeginMarkedContent),
    ("BDC", OpCode::BeginMarkedContentProps),
    ("EMC", OpCode::EndMarkedContent),
    ("BX", OpCode::BeginCompat),
    ("EX", OpCode::EndCompat),
];

impl OpCode {
    /// Looks up an operator keyword.
    pub fn from_command(cmd: &str) -> Option<OpCode> {
        OPERATORS
            .iter()
            .find(|(name, _)| *name == cmd)
            .map(|(_, op)| *op)
    }

    /// The operator keyword as written in a content stream.
    pub fn to_command(self) -> &'static str {
        OPERATORS
            .iter()
            .find(|(_, op)| *op == self)
            .map(|(name, _)| *name)
            .unwrap_or("?")
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_command())
    }
}

/// Operand list. Most operators take six operands or fewer.
pub type Operands = SmallVec<[PDFObject; 6]>;

/// One operator with the operands that preceded it.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub op: OpCode,
    pub args: Operands,
}

impl Operation {
    pub fn new(op: OpCode, args: impl IntoIterator<Item = PDFObject>) -> Self {
        Operation {
            op,
            args: args.into_iter().collect(),
        }
    }

    /// Numeric operand `index`, or a content-stream error naming the operator.
    pub fn number(&self, index: usize) -> PDFResult<f64> {
        self.args
            .get(index)
            .and_then(PDFObject::as_number)
            .ok_or_else(|| {
                PDFError::content_stream_error(
                    self.op.to_command(),
                    format!("operand {} is not a number", index),
                )
            })
    }

    /// All operands as numbers; non-numeric operands are an error.
    pub fn numbers(&self) -> PDFResult<SmallVec<[f64; 6]>> {
        (0..self.args.len()).map(|i| self.number(i)).collect()
    }

    /// Fails unless at least `count` operands are present.
    pub fn expect_args(&self, count: usize) -> PDFResult<()> {
        if self.args.len() < count {
            return Err(PDFError::content_stream_error(
                self.op.to_command(),
                format!("expected {} operands, got {}", count, self.args.len()),
            ));
        }
        Ok(())
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.args.get(index).and_then(PDFObject::as_name)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for arg in &self.args {
            write!(f, "{:?} ", arg)?;
        }
        write!(f, "{}", self.op)
    }
}

/// Operand stacks deeper than this are truncated.
const MAX_OPERANDS: usize = 64;

/// Reads operations from a content stream.
pub struct ContentParser<'s> {
    parser: Parser<'s>,
}

impl<'s> ContentParser<'s> {
    pub fn new(stream: &'s mut Stream) -> PDFResult<Self> {
        Ok(ContentParser {
            parser: Parser::for_content(Lexer::new(stream)?),
        })
    }

    /// Returns the next operation, or `None` at the end of the stream.
    ///
    /// Unknown operators are logged and skipped together with their operands.
    pub fn read_operation(&mut self) -> PDFResult<Option<Operation>> {
        let mut args = Operands::new();
        loop {
            match self.parser.get_object()? {
                PDFObject::EOF => {
                    if !args.is_empty() {
                        log::warn!("content stream ends with {} dangling operands", args.len());
                    }
                    return Ok(None);
                }
                PDFObject::Command(cmd) => match OpCode::from_command(&cmd) {
                    Some(OpCode::BeginInlineImage) => {
                        return self.read_inline_image().map(Some);
                    }
                    Some(op) => {
                        log::trace!("content op {}", cmd);
                        return Ok(Some(Operation { op, args }));
                    }
                    None => {
                        log::warn!("skipping unknown operator '{}'", cmd);
                        args.clear();
                    }
                },
                operand => {
                    if args.len() == MAX_OPERANDS {
                        log::warn!("too many operands, dropping the oldest");
                        args.remove(0);
                    }
                    args.push(operand);
                }
            }
        }
    }

    /// Reads `<key value pairs> ID <data> EI` after a `BI` keyword.
    fn read_inline_image(&mut self) -> PDFResult<Operation> {
        let mut dict = Dict::default();
        loop {
            let key = match self.parser.get_object()? {
                PDFObject::Command(cmd) if cmd == "ID" => break,
                PDFObject::Name(key) => key,
                PDFObject::EOF => {
                    return Err(PDFError::content_stream_error("BI", "missing ID"));
                }
                other => {
                    return Err(PDFError::content_stream_error(
                        "BI",
                        format!("unexpected {:?} in image dictionary", other),
                    ));
                }
            };
            let value = self.parser.get_object()?;
            dict.insert(expand_inline_key(&key).to_string(), expand_inline_value(value));
        }

        let lexer = self.parser.lexer_mut();
        // A single whitespace byte separates ID from the data
        let data_start = lexer.position() + 1;
        let stream = lexer.stream_mut()?;
        let total = stream.length();
        let rest = stream.get_byte_range(data_start.min(total), total)?;

        let end = find_inline_image_end(&rest).ok_or_else(|| {
            PDFError::content_stream_error("ID", "inline image without EI")
        })?;
        let data = rest[..end].to_vec();
        lexer.seek((data_start + end + 3).min(total))?;

        Ok(Operation::new(
            OpCode::BeginInlineImage,
            [PDFObject::Dictionary(dict), PDFObject::String(data)],
        ))
    }
}

/// Finds the whitespace preceding an `EI` keyword that is followed by
/// whitespace, a delimiter or the end of data.
fn find_inline_image_end(data: &[u8]) -> Option<usize> {
    for i in 0..data.len() {
        if Lexer::is_whitespace(data[i])
            && data.get(i + 1) == Some(&b'E')
            && data.get(i + 2) == Some(&b'I')
        {
            let terminated = match data.get(i + 3) {
                None => true,
                Some(b) => Lexer::is_whitespace(*b) || Lexer::is_delimiter(*b),
            };
            if terminated {
                return Some(i);
            }
        }
    }
    None
}

fn expand_inline_key(key: &str) -> &str {
    match key {
        "BPC" => "BitsPerComponent",
        "CS" => "ColorSpace",
        "D" => "Decode",
        "DP" => "DecodeParms",
        "F" => "Filter",
        "H" => "Height",
        "IM" => "ImageMask",
        "I" => "Interpolate",
        "W" => "Width",
        other => other,
    }
}

fn expand_inline_value(value: PDFObject) -> PDFObject {
    match value {
        PDFObject::Name(name) => PDFObject::Name(
            match name.as_str() {
                "G" => "DeviceGray",
                "RGB" => "DeviceRGB",
                "CMYK" => "DeviceCMYK",
                "I" => "Indexed",
                _ => return PDFObject::Name(name),
            }
            .to_string(),
        ),
        PDFObject::Array(items) => PDFObject::Array(
            items
                .into_iter()
                .map(|item| Box::new(expand_inline_value(*item)))
                .collect(),
        ),
        other => other,
    }
}

/// Parses a whole content stream. Errors end parsing early; the operations
/// read before the error are kept.
pub fn parse_content(data: &[u8]) -> Vec<Operation> {
    let mut stream = Stream::from_bytes(data.to_vec());
    let mut ops = Vec::new();
    let mut parser = match ContentParser::new(&mut stream) {
        Ok(parser) => parser,
        Err(e) => {
            log::warn!("cannot read content stream: {}", e);
            return ops;
        }
    };
    loop {
        match parser.read_operation() {
            Ok(Some(op)) => ops.push(op),
            Ok(None) => break,
            Err(e) => {
                log::warn!("content stream truncated after {} operations: {}", ops.len(), e);
                break;
            }
        }
    }
    ops
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ops(content: &str) -> Vec<OpCode> {
        parse_content(content.as_bytes())
            .into_iter()
            .map(|op| op.op)
            .collect()
    }

    #[test]
    fn test_opcode_lookup() {
        assert_eq!(OpCode::from_command("m"), Some(OpCode::MoveTo));
        assert_eq!(OpCode::from_command("cm"), Some(OpCode::Transform));
        assert_eq!(OpCode::from_command("T*"), Some(OpCode::NextLine));
        assert_eq!(OpCode::from_command("xyz"), None);
        assert_eq!(OpCode::SetFillColorN.to_command(), "scn");
        assert_eq!(OpCode::FillCompat.to_string(), "F");
    }

    #[test]
    fn test_read_simple_path() {
        let parsed = parse_content(b"10 20 m\n30 40 l\nS");
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[0].op, OpCode::MoveTo);
        assert_eq!(parsed[0].numbers().unwrap().as_slice(), &[10.0, 20.0]);
        assert_eq!(parsed[1].op, OpCode::LineTo);
        assert_eq!(parsed[2].op, OpCode::Stroke);
        assert!(parsed[2].args.is_empty());
    }

    #[test]
    fn test_unknown_operator_is_skipped() {
        assert_eq!(
            ops("q 1 2 foo 0 0 1 rg Q"),
            vec![OpCode::Save, OpCode::SetFillRGBColor, OpCode::Restore]
        );
    }

    #[test]
    fn test_syntax_error_keeps_prefix() {
        assert_eq!(ops("q 1 0 0 1 0 0 cm ] Q"), vec![OpCode::Save, OpCode::Transform]);
    }

    #[test]
    fn test_marked_content_operands() {
        let parsed = parse_content(b"/OC /oc1 BDC 0 g EMC");
        assert_eq!(parsed[0].op, OpCode::BeginMarkedContentProps);
        assert_eq!(parsed[0].name(0), Some("OC"));
        assert_eq!(parsed[0].name(1), Some("oc1"));
        assert_eq!(parsed[2].op, OpCode::EndMarkedContent);
    }

    #[test]
    fn test_inline_image() {
        let parsed = parse_content(b"q BI /W 2 /H 1 /CS /G /BPC 8 ID \xff\x00 EI Q");
        assert_eq!(
            parsed.iter().map(|op| op.op).collect::<Vec<_>>(),
            vec![OpCode::Save, OpCode::BeginInlineImage, OpCode::Restore]
        );
        let image = &parsed[1];
        let dict = image.args[0].as_dict().unwrap();
        assert_eq!(dict.get("Width"), Some(&PDFObject::Number(2.0)));
        assert_eq!(dict.get("ColorSpace"), Some(&PDFObject::Name("DeviceGray".into())));
        assert_eq!(image.args[1].as_bytes(), Some(&b"\xff\x00"[..]));
    }

    #[test]
    fn test_inline_image_data_containing_ei_bytes() {
        let parsed = parse_content(b"BI /W 4 /H 1 /BPC 8 /CS /G ID EIx\x01 EI");
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].args[1].as_bytes(), Some(&b"EIx\x01"[..]));
    }

    #[test]
    fn test_operand_errors_name_the_operator() {
        let op = Operation::new(OpCode::LineTo, [PDFObject::Name("x".into())]);
        let err = op.number(0).unwrap_err().to_string();
        assert!(err.contains("l:"), "{}", err);
        assert!(op.expect_args(2).is_err());
    }
}
