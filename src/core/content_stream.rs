//! Content stream reading and interpretation.
//!
//! [`ContentStreamReader`] turns a decoded content stream into operations.
//! [`Interpreter`] runs them against a graphics state stack and emits the
//! text and image events that later stages turn into runs and images.

use super::diagnostics::{DiagnosticKind, Diagnostics};
use super::error::{PDFError, PDFResult};
use super::font::{Font, Glyph};
use super::graphics_state::{Color, GraphicsState, Matrix, Point};
use super::lexer::Lexer;
use super::limits::Deadline;
use super::parser::{Dict, PDFObject, Parser};
use super::stream::Stream;
use super::xref::XRef;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

/// PDF content stream operator codes.
///
/// These map to the PDF operator names (like "m", "l", "cm", "Tj", etc.).
/// Anything else in operator position is unknown and skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    // Graphics State Operators
    /// w - Set line width
    SetLineWidth,
    /// J - Set line cap style
    SetLineCap,
    /// j - Set line join style
    SetLineJoin,
    /// M - Set miter limit
    SetMiterLimit,
    /// d - Set line dash pattern
    SetDash,
    /// ri - Set rendering intent
    SetRenderingIntent,
    /// i - Set flatness tolerance
    SetFlatness,
    /// gs - Set graphics state from dictionary
    SetGState,
    /// q - Save graphics state
    Save,
    /// Q - Restore graphics state
    Restore,
    /// cm - Concatenate matrix to current transformation matrix
    Transform,

    // Path Construction Operators
    /// m - Begin new subpath
    MoveTo,
    /// l - Append straight line segment
    LineTo,
    /// c - Append cubic Bézier curve
    CurveTo,
    /// v - Append cubic Bézier curve (initial point replicated)
    CurveTo2,
    /// y - Append cubic Bézier curve (final point replicated)
    CurveTo3,
    /// h - Close subpath
    ClosePath,
    /// re - Append rectangle
    Rectangle,

    // Path Painting Operators
    /// S - Stroke path
    Stroke,
    /// s - Close and stroke path
    CloseStroke,
    /// f or F - Fill path (nonzero winding rule)
    Fill,
    /// f* - Fill path (even-odd rule)
    EOFill,
    /// B - Fill and stroke path (nonzero winding rule)
    FillStroke,
    /// B* - Fill and stroke path (even-odd rule)
    EOFillStroke,
    /// b - Close, fill, and stroke path (nonzero winding rule)
    CloseFillStroke,
    /// b* - Close, fill, and stroke path (even-odd rule)
    CloseEOFillStroke,
    /// n - End path without filling or stroking
    EndPath,

    // Clipping Path Operators
    /// W - Set clipping path (nonzero winding rule)
    Clip,
    /// W* - Set clipping path (even-odd rule)
    EOClip,

    // Text Object Operators
    /// BT - Begin text object
    BeginText,
    /// ET - End text object
    EndText,

    // Text State Operators
    /// Tc - Set character spacing
    SetCharSpacing,
    /// Tw - Set word spacing
    SetWordSpacing,
    /// Tz - Set horizontal scaling
    SetHScale,
    /// TL - Set text leading
    SetLeading,
    /// Tf - Set text font and size
    SetFont,
    /// Tr - Set text rendering mode
    SetTextRenderingMode,
    /// Ts - Set text rise
    SetTextRise,

    // Text Positioning Operators
    /// Td - Move text position
    MoveText,
    /// TD - Move text position and set leading
    SetLeadingMoveText,
    /// Tm - Set text matrix
    SetTextMatrix,
    /// T* - Move to start of next line
    NextLine,

    // Text Showing Operators
    /// Tj - Show text string
    ShowText,
    /// TJ - Show text with individual glyph positioning
    ShowSpacedText,
    /// ' - Move to next line and show text
    NextLineShowText,
    /// " - Set spacing, move to next line, show text
    NextLineSetSpacingShowText,

    // Type 3 Font Operators
    /// d0 - Set glyph width
    SetCharWidth,
    /// d1 - Set glyph width and bounding box
    SetCharWidthAndBounds,

    // Color Operators
    /// CS - Set stroke color space
    SetStrokeColorSpace,
    /// cs - Set fill color space
    SetFillColorSpace,
    /// SC - Set stroke color
    SetStrokeColor,
    /// SCN - Set stroke color (supports Pattern, Separation, DeviceN)
    SetStrokeColorN,
    /// sc - Set fill color
    SetFillColor,
    /// scn - Set fill color (supports Pattern, Separation, DeviceN)
    SetFillColorN,
    /// G - Set stroke gray level
    SetStrokeGray,
    /// g - Set fill gray level
    SetFillGray,
    /// RG - Set stroke RGB color
    SetStrokeRGBColor,
    /// rg - Set fill RGB color
    SetFillRGBColor,
    /// K - Set stroke CMYK color
    SetStrokeCMYKColor,
    /// k - Set fill CMYK color
    SetFillCMYKColor,

    // Shading Operator
    /// sh - Paint with shading pattern
    ShadingFill,

    // Inline Image Operators
    /// BI - Begin inline image
    BeginInlineImage,
    /// ID - Begin inline image data
    BeginImageData,
    /// EI - End inline image; its operand is the parsed image
    EndInlineImage,

    // XObject Operator
    /// Do - Paint XObject
    PaintXObject,

    // Marked Content Operators
    /// MP - Define marked-content point
    MarkPoint,
    /// DP - Define marked-content point with properties
    MarkPointProps,
    /// BMC - Begin marked-content sequence
    BeginMarkedContent,
    /// BDC - Begin marked-content sequence with properties
    BeginMarkedContentProps,
    /// EMC - End marked-content sequence
    EndMarkedContent,

    // Compatibility Operators
    /// BX - Begin compatibility section
    BeginCompat,
    /// EX - End compatibility section
    EndCompat,
}

impl OpCode {
    /// Converts a PDF operator string (command) to an OpCode.
    ///
    /// Returns None for operators outside the PDF vocabulary.
    pub fn from_command(cmd: &str) -> Option<OpCode> {
        let op = match cmd {
            // Graphics state
            "w" => OpCode::SetLineWidth,
            "J" => OpCode::SetLineCap,
            "j" => OpCode::SetLineJoin,
            "M" => OpCode::SetMiterLimit,
            "d" => OpCode::SetDash,
            "ri" => OpCode::SetRenderingIntent,
            "i" => OpCode::SetFlatness,
            "gs" => OpCode::SetGState,
            "q" => OpCode::Save,
            "Q" => OpCode::Restore,
            "cm" => OpCode::Transform,

            // Path construction
            "m" => OpCode::MoveTo,
            "l" => OpCode::LineTo,
            "c" => OpCode::CurveTo,
            "v" => OpCode::CurveTo2,
            "y" => OpCode::CurveTo3,
            "h" => OpCode::ClosePath,
            "re" => OpCode::Rectangle,

            // Path painting
            "S" => OpCode::Stroke,
            "s" => OpCode::CloseStroke,
            "f" | "F" => OpCode::Fill,
            "f*" => OpCode::EOFill,
            "B" => OpCode::FillStroke,
            "B*" => OpCode::EOFillStroke,
            "b" => OpCode::CloseFillStroke,
            "b*" => OpCode::CloseEOFillStroke,
            "n" => OpCode::EndPath,

            // Clipping
            "W" => OpCode::Clip,
            "W*" => OpCode::EOClip,

            // Text object
            "BT" => OpCode::BeginText,
            "ET" => OpCode::EndText,

            // Text state
            "Tc" => OpCode::SetCharSpacing,
            "Tw" => OpCode::SetWordSpacing,
            "Tz" => OpCode::SetHScale,
            "TL" => OpCode::SetLeading,
            "Tf" => OpCode::SetFont,
            "Tr" => OpCode::SetTextRenderingMode,
            "Ts" => OpCode::SetTextRise,

            // Text positioning
            "Td" => OpCode::MoveText,
            "TD" => OpCode::SetLeadingMoveText,
            "Tm" => OpCode::SetTextMatrix,
            "T*" => OpCode::NextLine,

            // Text showing
            "Tj" => OpCode::ShowText,
            "TJ" => OpCode::ShowSpacedText,
            "'" => OpCode::NextLineShowText,
            "\"" => OpCode::NextLineSetSpacingShowText,

            // Type 3 fonts
            "d0" => OpCode::SetCharWidth,
            "d1" => OpCode::SetCharWidthAndBounds,

            // Color
            "CS" => OpCode::SetStrokeColorSpace,
            "cs" => OpCode::SetFillColorSpace,
            "SC" => OpCode::SetStrokeColor,
            "SCN" => OpCode::SetStrokeColorN,
            "sc" => OpCode::SetFillColor,
            "scn" => OpCode::SetFillColorN,
            "G" => OpCode::SetStrokeGray,
            "g" => OpCode::SetFillGray,
            "RG" => OpCode::SetStrokeRGBColor,
            "rg" => OpCode::SetFillRGBColor,
            "K" => OpCode::SetStrokeCMYKColor,
            "k" => OpCode::SetFillCMYKColor,

            // Shading
            "sh" => OpCode::ShadingFill,

            // Inline images
            "BI" => OpCode::BeginInlineImage,
            "ID" => OpCode::BeginImageData,
            "EI" => OpCode::EndInlineImage,

            // XObject
            "Do" => OpCode::PaintXObject,

            // Marked content
            "MP" => OpCode::MarkPoint,
            "DP" => OpCode::MarkPointProps,
            "BMC" => OpCode::BeginMarkedContent,
            "BDC" => OpCode::BeginMarkedContentProps,
            "EMC" => OpCode::EndMarkedContent,

            // Compatibility
            "BX" => OpCode::BeginCompat,
            "EX" => OpCode::EndCompat,

            _ => return None,
        };
        Some(op)
    }

    /// Returns the PDF operator string for this opcode.
    pub fn to_command(&self) -> &'static str {
        match self {
            OpCode::SetLineWidth => "w",
            OpCode::SetLineCap => "J",
            OpCode::SetLineJoin => "j",
            OpCode::SetMiterLimit => "M",
            OpCode::SetDash => "d",
            OpCode::SetRenderingIntent => "ri",
            OpCode::SetFlatness => "i",
            OpCode::SetGState => "gs",
            OpCode::Save => "q",
            OpCode::Restore => "Q",
            OpCode::Transform => "cm",
            OpCode::MoveTo => "m",
            OpCode::LineTo => "l",
            OpCode::CurveTo => "c",
            OpCode::CurveTo2 => "v",
            OpCode::CurveTo3 => "y",
            OpCode::ClosePath => "h",
            OpCode::Rectangle => "re",
            OpCode::Stroke => "S",
            OpCode::CloseStroke => "s",
            OpCode::Fill => "f",
            OpCode::EOFill => "f*",
            OpCode::FillStroke => "B",
            OpCode::EOFillStroke => "B*",
            OpCode::CloseFillStroke => "b",
            OpCode::CloseEOFillStroke => "b*",
            OpCode::EndPath => "n",
            OpCode::Clip => "W",
            OpCode::EOClip => "W*",
            OpCode::BeginText => "BT",
            OpCode::EndText => "ET",
            OpCode::SetCharSpacing => "Tc",
            OpCode::SetWordSpacing => "Tw",
            OpCode::SetHScale => "Tz",
            OpCode::SetLeading => "TL",
            OpCode::SetFont => "Tf",
            OpCode::SetTextRenderingMode => "Tr",
            OpCode::SetTextRise => "Ts",
            OpCode::MoveText => "Td",
            OpCode::SetLeadingMoveText => "TD",
            OpCode::SetTextMatrix => "Tm",
            OpCode::NextLine => "T*",
            OpCode::ShowText => "Tj",
            OpCode::ShowSpacedText => "TJ",
            OpCode::NextLineShowText => "'",
            OpCode::NextLineSetSpacingShowText => "\"",
            OpCode::SetCharWidth => "d0",
            OpCode::SetCharWidthAndBounds => "d1",
            OpCode::SetStrokeColorSpace => "CS",
            OpCode::SetFillColorSpace => "cs",
            OpCode::SetStrokeColor => "SC",
            OpCode::SetStrokeColorN => "SCN",
            OpCode::SetFillColor => "sc",
            OpCode::SetFillColorN => "scn",
            OpCode::SetStrokeGray => "G",
            OpCode::SetFillGray => "g",
            OpCode::SetStrokeRGBColor => "RG",
            OpCode::SetFillRGBColor => "rg",
            OpCode::SetStrokeCMYKColor => "K",
            OpCode::SetFillCMYKColor => "k",
            OpCode::ShadingFill => "sh",
            OpCode::BeginInlineImage => "BI",
            OpCode::BeginImageData => "ID",
            OpCode::EndInlineImage => "EI",
            OpCode::PaintXObject => "Do",
            OpCode::MarkPoint => "MP",
            OpCode::MarkPointProps => "DP",
            OpCode::BeginMarkedContent => "BMC",
            OpCode::BeginMarkedContentProps => "BDC",
            OpCode::EndMarkedContent => "EMC",
            OpCode::BeginCompat => "BX",
            OpCode::EndCompat => "EX",
        }
    }

    /// Number of operands the operator consumes, None when variable.
    pub fn operand_count(&self) -> Option<usize> {
        use OpCode::*;
        let count = match self {
            Save | Restore | ClosePath | Stroke | CloseStroke | Fill | EOFill | FillStroke
            | EOFillStroke | CloseFillStroke | CloseEOFillStroke | EndPath | Clip | EOClip
            | BeginText | EndText | NextLine | BeginInlineImage | BeginImageData
            | EndMarkedContent | BeginCompat | EndCompat => 0,

            SetLineWidth | SetLineCap | SetLineJoin | SetMiterLimit | SetRenderingIntent
            | SetFlatness | SetGState | SetCharSpacing | SetWordSpacing | SetHScale
            | SetLeading | SetTextRenderingMode | SetTextRise | ShowText | ShowSpacedText
            | NextLineShowText | SetStrokeColorSpace | SetFillColorSpace | SetStrokeGray
            | SetFillGray | ShadingFill | EndInlineImage | PaintXObject | MarkPoint
            | BeginMarkedContent => 1,

            SetDash | MoveTo | LineTo | SetFont | MoveText | SetLeadingMoveText
            | SetCharWidth | MarkPointProps | BeginMarkedContentProps => 2,

            NextLineSetSpacingShowText | SetStrokeRGBColor | SetFillRGBColor => 3,

            CurveTo2 | CurveTo3 | Rectangle | SetStrokeCMYKColor | SetFillCMYKColor => 4,

            Transform | CurveTo | SetTextMatrix | SetCharWidthAndBounds => 6,

            SetStrokeColor | SetStrokeColorN | SetFillColor | SetFillColorN => return None,
        };
        Some(count)
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_command())
    }
}

/// A parsed content stream operation.
///
/// Consists of an operator code and its operand arguments.
#[derive(Debug, Clone)]
pub struct Operation {
    /// The operator code
    pub op: OpCode,
    /// The operand arguments (read before the operator)
    pub args: SmallVec<[PDFObject; 8]>,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (", self.op)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", arg.type_name())?;
        }
        write!(f, ")")
    }
}

/// Parse errors tolerated in one content stream before giving up on it.
const MAX_READ_ERRORS: usize = 100;

/// Reads operations from a decoded content stream.
pub struct ContentStreamReader<'a> {
    parser: Parser<'a>,
    operands: SmallVec<[PDFObject; 8]>,
    errors: usize,
}

impl<'a> ContentStreamReader<'a> {
    pub fn new(content: &[u8]) -> PDFResult<Self> {
        let stream = Box::new(Stream::from_bytes(content.to_vec()));
        let parser = Parser::new(Lexer::new(stream)?)?;
        Ok(ContentStreamReader {
            parser,
            operands: SmallVec::new(),
            errors: 0,
        })
    }

    /// Reads the next known operation.
    ///
    /// Operands accumulate until an operator arrives. Unknown operators
    /// consume everything accumulated before them. A known operator with
    /// more operands than it takes keeps the last ones. Returns `Ok(None)`
    /// at the end of the stream.
    pub fn read_operation(&mut self) -> PDFResult<Option<Operation>> {
        loop {
            let obj = match self.parser.get_object() {
                Ok(obj) => obj,
                Err(e) => {
                    self.errors += 1;
                    if self.errors > MAX_READ_ERRORS {
                        return Err(PDFError::syntax(format!(
                            "too many errors in content stream, last: {}",
                            e
                        )));
                    }
                    log::debug!("Skipping bad content: {}", e);
                    self.operands.clear();
                    continue;
                }
            };

            match obj {
                PDFObject::EOF => {
                    if !self.operands.is_empty() {
                        log::debug!(
                            "Content stream ended with {} dangling operands",
                            self.operands.len()
                        );
                        self.operands.clear();
                    }
                    return Ok(None);
                }
                PDFObject::Command(cmd) => {
                    let Some(op) = OpCode::from_command(&cmd) else {
                        log::trace!(
                            "Skipping unknown operator '{}' with {} operands",
                            cmd,
                            self.operands.len()
                        );
                        self.operands.clear();
                        continue;
                    };
                    let mut args = std::mem::take(&mut self.operands);
                    if let Some(count) = op.operand_count() {
                        if args.len() > count {
                            args.drain(..args.len() - count);
                        }
                    }
                    return Ok(Some(Operation { op, args }));
                }
                operand => self.operands.push(operand),
            }
        }
    }
}

/// One string shown by `Tj`, `'`, `"` or a string element of `TJ`.
#[derive(Debug, Clone)]
pub struct TextShowEvent {
    pub glyphs: Vec<Glyph>,
    pub font: Arc<Font>,
    pub font_size: f64,
    pub horizontal_scaling: f64,
    pub rise: f64,
    pub render_mode: i64,
    /// Tm × CTM when the string started
    pub matrix: Matrix,
    /// Pen displacement over the string, in text space before the font
    /// size is applied to y (x includes size, spacing and scaling)
    pub advance: Point,
}

impl TextShowEvent {
    /// Unicode text of all glyphs in order.
    pub fn text(&self) -> String {
        self.glyphs.iter().flat_map(|g| g.text.iter()).collect()
    }
}

/// An image painted by `Do` or an inline image.
#[derive(Debug, Clone)]
pub struct ImagePaintEvent {
    /// XObject resource name, None for inline images
    pub name: Option<String>,
    pub reference: Option<(u32, u32)>,
    pub dict: Dict,
    /// Raw, still-encoded image data
    pub data: Arc<[u8]>,
    /// CTM at paint time; the image occupies the unit square under it
    pub ctm: Matrix,
    /// `/ColorSpace` (or `/CS`) with resource names looked up
    pub color_space: Option<PDFObject>,
    pub inline: bool,
}

#[derive(Debug, Clone)]
pub enum ContentEvent {
    Text(TextShowEvent),
    Image(ImagePaintEvent),
}

/// Nesting limit for Form XObjects.
const MAX_FORM_DEPTH: usize = 16;

/// Operations between two deadline checks.
const DEADLINE_INTERVAL: usize = 256;

/// Executes content streams and collects [`ContentEvent`]s.
pub struct Interpreter<'a> {
    xref: &'a XRef,
    diagnostics: &'a mut Diagnostics,
    deadline: Deadline,
    state: GraphicsState,
    stack: Vec<GraphicsState>,
    /// Fonts by reference, loaded once per interpreter
    fonts: FxHashMap<(u32, u32), Arc<Font>>,
    fallback_font: Option<Arc<Font>>,
    /// Form XObjects being executed, innermost last
    forms: Vec<Option<(u32, u32)>>,
    events: Vec<ContentEvent>,
    operations: usize,
}

impl<'a> Interpreter<'a> {
    pub fn new(xref: &'a XRef, deadline: Deadline, diagnostics: &'a mut Diagnostics) -> Self {
        Interpreter {
            xref,
            diagnostics,
            deadline,
            state: GraphicsState::default(),
            stack: Vec::new(),
            fonts: FxHashMap::default(),
            fallback_font: None,
            forms: Vec::new(),
            events: Vec::new(),
            operations: 0,
        }
    }

    /// Runs a page content stream against its resources.
    ///
    /// Fatal errors and dangling or cyclic references are returned;
    /// everything else becomes a diagnostic and interpretation goes on.
    pub fn run(&mut self, content: &[u8], resources: &Dict) -> PDFResult<()> {
        self.execute(content, resources)
    }

    pub fn into_events(self) -> Vec<ContentEvent> {
        self.events
    }

    fn execute(&mut self, content: &[u8], resources: &Dict) -> PDFResult<()> {
        let mut reader = ContentStreamReader::new(content)?;
        loop {
            let operation = match reader.read_operation() {
                Ok(Some(operation)) => operation,
                Ok(None) => return Ok(()),
                Err(e) => {
                    self.diagnostics.record_error("content stream", &e);
                    return Ok(());
                }
            };

            self.operations += 1;
            if self.operations % DEADLINE_INTERVAL == 0 {
                self.deadline.check()?;
            }

            if let Some(count) = operation.op.operand_count() {
                if operation.args.len() < count {
                    self.diagnostics.record(
                        DiagnosticKind::OperandUnderflow,
                        format!(
                            "{} needs {} operands, found {}",
                            operation.op,
                            count,
                            operation.args.len()
                        ),
                    );
                    continue;
                }
            }

            match self.dispatch(&operation, resources) {
                Ok(()) => {}
                Err(e) if e.aborts_page() => return Err(e),
                Err(e) => self
                    .diagnostics
                    .record_error(&format!("operator {}", operation.op), &e),
            }
        }
    }

    fn dispatch(&mut self, operation: &Operation, resources: &Dict) -> PDFResult<()> {
        let args = operation.args.as_slice();
        match operation.op {
            OpCode::Save => self.stack.push(self.state.clone()),
            OpCode::Restore => match self.stack.pop() {
                Some(state) => self.state = state,
                None => log::debug!("Ignoring Q without matching q"),
            },
            OpCode::Transform => {
                let Some(m) = matrix_operand(args) else {
                    self.bad_operands(operation);
                    return Ok(());
                };
                self.state.ctm = m.multiply(&self.state.ctm);
            }
            OpCode::SetGState => {
                let Some(name) = args[0].as_name() else {
                    self.bad_operands(operation);
                    return Ok(());
                };
                self.apply_ext_gstate(name, resources)?;
            }

            OpCode::BeginText => {
                self.state.text_matrix = Matrix::IDENTITY;
                self.state.text_line_matrix = Matrix::IDENTITY;
            }
            OpCode::EndText => {}

            OpCode::SetCharSpacing
            | OpCode::SetWordSpacing
            | OpCode::SetHScale
            | OpCode::SetLeading
            | OpCode::SetTextRise
            | OpCode::SetTextRenderingMode => {
                let Some(value) = args[0].as_number() else {
                    self.bad_operands(operation);
                    return Ok(());
                };
                match operation.op {
                    OpCode::SetCharSpacing => self.state.char_spacing = value,
                    OpCode::SetWordSpacing => self.state.word_spacing = value,
                    OpCode::SetHScale => self.state.horizontal_scaling = value / 100.0,
                    OpCode::SetLeading => self.state.leading = value,
                    OpCode::SetTextRise => self.state.rise = value,
                    _ => self.state.render_mode = value as i64,
                }
            }
            OpCode::SetFont => {
                let (Some(name), Some(size)) = (args[0].as_name(), args[1].as_number()) else {
                    self.bad_operands(operation);
                    return Ok(());
                };
                let font = self.load_font(name, resources)?;
                self.state.font = Some(font);
                self.state.font_name = Some(name.to_string());
                self.state.font_size = size;
            }

            OpCode::MoveText | OpCode::SetLeadingMoveText => {
                let [tx, ty] = match numbers::<2>(args) {
                    Some(values) => values,
                    None => {
                        self.bad_operands(operation);
                        return Ok(());
                    }
                };
                if operation.op == OpCode::SetLeadingMoveText {
                    self.state.leading = -ty;
                }
                self.move_text(tx, ty);
            }
            OpCode::SetTextMatrix => {
                let Some(m) = matrix_operand(args) else {
                    self.bad_operands(operation);
                    return Ok(());
                };
                self.state.text_matrix = m;
                self.state.text_line_matrix = m;
            }
            OpCode::NextLine => self.move_text(0.0, -self.state.leading),

            OpCode::ShowText => {
                let Some(bytes) = args[0].as_string() else {
                    self.bad_operands(operation);
                    return Ok(());
                };
                self.show_text(bytes);
            }
            OpCode::NextLineShowText => {
                let Some(bytes) = args[0].as_string() else {
                    self.bad_operands(operation);
                    return Ok(());
                };
                self.move_text(0.0, -self.state.leading);
                self.show_text(bytes);
            }
            OpCode::NextLineSetSpacingShowText => {
                let (Some(aw), Some(ac), Some(bytes)) =
                    (args[0].as_number(), args[1].as_number(), args[2].as_string())
                else {
                    self.bad_operands(operation);
                    return Ok(());
                };
                self.state.word_spacing = aw;
                self.state.char_spacing = ac;
                self.move_text(0.0, -self.state.leading);
                self.show_text(bytes);
            }
            OpCode::ShowSpacedText => {
                let Some(items) = args[0].as_array() else {
                    self.bad_operands(operation);
                    return Ok(());
                };
                for item in items {
                    if let Some(bytes) = item.as_string() {
                        self.show_text(bytes);
                    } else if let Some(adjustment) = item.as_number() {
                        self.adjust_text(adjustment);
                    }
                }
            }

            OpCode::SetFillGray | OpCode::SetStrokeGray => {
                self.set_device_color(operation, args, "DeviceGray")
            }
            OpCode::SetFillRGBColor | OpCode::SetStrokeRGBColor => {
                self.set_device_color(operation, args, "DeviceRGB")
            }
            OpCode::SetFillCMYKColor | OpCode::SetStrokeCMYKColor => {
                self.set_device_color(operation, args, "DeviceCMYK")
            }
            OpCode::SetFillColorSpace | OpCode::SetStrokeColorSpace => {
                let Some(space) = args[0].as_name() else {
                    self.bad_operands(operation);
                    return Ok(());
                };
                let color = Color {
                    space: space.to_string(),
                    components: SmallVec::from_slice(&[0.0]),
                };
                if operation.op == OpCode::SetFillColorSpace {
                    self.state.fill_color = color;
                } else {
                    self.state.stroke_color = color;
                }
            }
            OpCode::SetFillColor
            | OpCode::SetFillColorN
            | OpCode::SetStrokeColor
            | OpCode::SetStrokeColorN => {
                // Pattern names among the operands carry no components
                let components = args.iter().filter_map(PDFObject::as_number).collect();
                let fill = matches!(operation.op, OpCode::SetFillColor | OpCode::SetFillColorN);
                let color = if fill {
                    &mut self.state.fill_color
                } else {
                    &mut self.state.stroke_color
                };
                color.components = components;
            }

            OpCode::PaintXObject => {
                let Some(name) = args[0].as_name() else {
                    self.bad_operands(operation);
                    return Ok(());
                };
                self.paint_xobject(name, resources)?;
            }
            OpCode::EndInlineImage => {
                let PDFObject::Stream { dict, data } = &args[0] else {
                    self.bad_operands(operation);
                    return Ok(());
                };
                let color_space = dict.get("ColorSpace").or_else(|| dict.get("CS")).cloned();
                let color_space = match color_space {
                    Some(cs) => Some(self.resolve_color_space(cs, resources)?),
                    None => None,
                };
                self.events.push(ContentEvent::Image(ImagePaintEvent {
                    name: None,
                    reference: None,
                    dict: dict.clone(),
                    data: data.clone(),
                    ctm: self.state.ctm,
                    color_space,
                    inline: true,
                }));
            }

            // Path geometry, line style, clipping, shading, marked content,
            // Type3 glyph metrics and compatibility sections do not affect
            // text or image placement.
            OpCode::SetLineWidth
            | OpCode::SetLineCap
            | OpCode::SetLineJoin
            | OpCode::SetMiterLimit
            | OpCode::SetDash
            | OpCode::SetRenderingIntent
            | OpCode::SetFlatness
            | OpCode::MoveTo
            | OpCode::LineTo
            | OpCode::CurveTo
            | OpCode::CurveTo2
            | OpCode::CurveTo3
            | OpCode::ClosePath
            | OpCode::Rectangle
            | OpCode::Stroke
            | OpCode::CloseStroke
            | OpCode::Fill
            | OpCode::EOFill
            | OpCode::FillStroke
            | OpCode::EOFillStroke
            | OpCode::CloseFillStroke
            | OpCode::CloseEOFillStroke
            | OpCode::EndPath
            | OpCode::Clip
            | OpCode::EOClip
            | OpCode::SetCharWidth
            | OpCode::SetCharWidthAndBounds
            | OpCode::ShadingFill
            | OpCode::BeginInlineImage
            | OpCode::BeginImageData
            | OpCode::MarkPoint
            | OpCode::MarkPointProps
            | OpCode::BeginMarkedContent
            | OpCode::BeginMarkedContentProps
            | OpCode::EndMarkedContent
            | OpCode::BeginCompat
            | OpCode::EndCompat => {}
        }
        Ok(())
    }

    fn bad_operands(&mut self, operation: &Operation) {
        self.diagnostics.record(
            DiagnosticKind::Syntax,
            format!("bad operands for {}", operation),
        );
    }

    fn move_text(&mut self, tx: f64, ty: f64) {
        self.state.text_line_matrix =
            Matrix::translate(tx, ty).multiply(&self.state.text_line_matrix);
        self.state.text_matrix = self.state.text_line_matrix;
    }

    /// Applies a `TJ` number: thousandths of text space, subtracted from
    /// the pen position.
    fn adjust_text(&mut self, adjustment: f64) {
        let shift = -adjustment / 1000.0 * self.state.font_size;
        let vertical = self.state.font.as_ref().is_some_and(|f| f.is_vertical());
        let translation = if vertical {
            Matrix::translate(0.0, shift)
        } else {
            Matrix::translate(shift * self.state.horizontal_scaling, 0.0)
        };
        self.state.text_matrix = translation.multiply(&self.state.text_matrix);
    }

    fn show_text(&mut self, bytes: &[u8]) {
        let font = match &self.state.font {
            Some(font) => font.clone(),
            None => {
                self.diagnostics
                    .record(DiagnosticKind::MissingFont, "text shown before any Tf");
                let font = self.fallback_font();
                self.state.font = Some(font.clone());
                font
            }
        };

        let glyphs = font.decode(bytes);
        if glyphs.is_empty() {
            return;
        }

        let size = self.state.font_size;
        let vertical = font.is_vertical();
        let mut advance = Point::default();
        for glyph in &glyphs {
            let spacing = self.state.char_spacing
                + if glyph.is_word_space { self.state.word_spacing } else { 0.0 };
            if vertical {
                advance.y -= size + spacing;
            } else {
                advance.x += (glyph.width * size + spacing) * self.state.horizontal_scaling;
            }
        }

        let matrix = self.state.text_matrix.multiply(&self.state.ctm);
        self.state.text_matrix =
            Matrix::translate(advance.x, advance.y).multiply(&self.state.text_matrix);

        self.events.push(ContentEvent::Text(TextShowEvent {
            glyphs,
            font,
            font_size: size,
            horizontal_scaling: self.state.horizontal_scaling,
            rise: self.state.rise,
            render_mode: self.state.render_mode,
            matrix,
            advance,
        }));
    }

    fn set_device_color(&mut self, operation: &Operation, args: &[PDFObject], space: &str) {
        let components: Option<SmallVec<[f64; 4]>> =
            args.iter().map(PDFObject::as_number).collect();
        let Some(components) = components else {
            self.bad_operands(operation);
            return;
        };
        let color = Color {
            space: space.to_string(),
            components,
        };
        match operation.op {
            OpCode::SetFillGray | OpCode::SetFillRGBColor | OpCode::SetFillCMYKColor => {
                self.state.fill_color = color
            }
            _ => self.state.stroke_color = color,
        }
    }

    fn fallback_font(&mut self) -> Arc<Font> {
        self.fallback_font
            .get_or_insert_with(|| Arc::new(Font::fallback("Helvetica")))
            .clone()
    }

    /// Looks up `/Font /name` and loads it once per reference.
    ///
    /// Missing or broken fonts fall back to a Latin-1 font with a
    /// diagnostic, so the text still comes through.
    fn load_font(&mut self, name: &str, resources: &Dict) -> PDFResult<Arc<Font>> {
        let entry = match resource_entry(self.xref, resources, "Font", name) {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                self.diagnostics.record(
                    DiagnosticKind::MissingFont,
                    format!("font /{} not found in resources", name),
                );
                return Ok(self.fallback_font());
            }
            Err(e) if e.aborts_page() => return Err(e),
            Err(e) => {
                self.diagnostics.record_error(&format!("font /{}", name), &e);
                return Ok(self.fallback_font());
            }
        };

        let key = entry.as_reference();
        if let Some(font) = key.and_then(|key| self.fonts.get(&key)) {
            return Ok(font.clone());
        }

        let loaded = self.xref.fetch_if_ref(&entry).and_then(|obj| match obj.as_dict() {
            Some(dict) => Font::load(dict, self.xref, self.diagnostics),
            None => Err(PDFError::Generic(format!(
                "font resource is a {}",
                obj.type_name()
            ))),
        });
        let font = match loaded {
            Ok(font) => Arc::new(font),
            Err(e) if e.aborts_page() => return Err(e),
            Err(e) => {
                let mut diagnostic_kind = e.kind();
                if diagnostic_kind == DiagnosticKind::Other {
                    diagnostic_kind = DiagnosticKind::MissingFont;
                }
                self.diagnostics
                    .record(diagnostic_kind, format!("font /{}: {}", name, e));
                Arc::new(Font::fallback(name))
            }
        };
        if let Some(key) = key {
            self.fonts.insert(key, font.clone());
        }
        Ok(font)
    }

    /// `gs`: only `/Font` matters for extraction.
    fn apply_ext_gstate(&mut self, name: &str, resources: &Dict) -> PDFResult<()> {
        let Some(entry) = resource_entry(self.xref, resources, "ExtGState", name)? else {
            self.diagnostics.record(
                DiagnosticKind::Other,
                format!("ExtGState /{} not found in resources", name),
            );
            return Ok(());
        };
        let gstate = self.xref.fetch_if_ref(&entry)?;
        let Some(font_entry) = gstate.get("Font") else {
            return Ok(());
        };
        let font_entry = self.xref.fetch_if_ref(font_entry)?;
        let Some([font_ref, size]) = font_entry.as_array() else {
            return Ok(());
        };

        let key = font_ref.as_reference();
        let cached = key.and_then(|key| self.fonts.get(&key).cloned());
        let font = match cached {
            Some(font) => font,
            None => {
                let dict = self.xref.fetch_if_ref(font_ref)?;
                let font = match dict.as_dict() {
                    Some(dict) => Arc::new(Font::load(dict, self.xref, self.diagnostics)?),
                    None => self.fallback_font(),
                };
                if let Some(key) = key {
                    self.fonts.insert(key, font.clone());
                }
                font
            }
        };
        self.state.font = Some(font);
        self.state.font_name = None;
        self.state.font_size = size.as_number().unwrap_or(self.state.font_size);
        Ok(())
    }

    fn paint_xobject(&mut self, name: &str, resources: &Dict) -> PDFResult<()> {
        let Some(entry) = resource_entry(self.xref, resources, "XObject", name)? else {
            self.diagnostics.record(
                DiagnosticKind::BadImage,
                format!("XObject /{} not found in resources", name),
            );
            return Ok(());
        };
        let reference = entry.as_reference();
        let PDFObject::Stream { dict, data } = self.xref.fetch_if_ref(&entry)? else {
            self.diagnostics.record(
                DiagnosticKind::BadImage,
                format!("XObject /{} is not a stream", name),
            );
            return Ok(());
        };

        match dict.get("Subtype").and_then(PDFObject::as_name) {
            Some("Image") => {
                let color_space = match self.xref.get(&dict, "ColorSpace")? {
                    Some(cs) => Some(self.resolve_color_space(cs, resources)?),
                    None => None,
                };
                self.events.push(ContentEvent::Image(ImagePaintEvent {
                    name: Some(name.to_string()),
                    reference,
                    dict,
                    data,
                    ctm: self.state.ctm,
                    color_space,
                    inline: false,
                }));
                Ok(())
            }
            Some("Form") => self.run_form(name, reference, &dict, &data, resources),
            other => {
                log::debug!("Ignoring XObject /{} with subtype {:?}", name, other);
                Ok(())
            }
        }
    }

    fn run_form(
        &mut self,
        name: &str,
        reference: Option<(u32, u32)>,
        dict: &Dict,
        data: &[u8],
        parent_resources: &Dict,
    ) -> PDFResult<()> {
        if self.forms.len() >= MAX_FORM_DEPTH {
            self.diagnostics.record(
                DiagnosticKind::FormRecursion,
                format!("form /{} nested deeper than {}", name, MAX_FORM_DEPTH),
            );
            return Ok(());
        }
        if reference.is_some() && self.forms.contains(&reference) {
            self.diagnostics.record(
                DiagnosticKind::FormRecursion,
                format!("form /{} paints itself", name),
            );
            return Ok(());
        }

        let content = match self.xref.decode_stream(dict, data).and_then(|d| d.into_data()) {
            Ok(content) => content,
            Err(e) if e.aborts_page() => return Err(e),
            Err(e) => {
                self.diagnostics.record_error(&format!("form /{}", name), &e);
                return Ok(());
            }
        };

        let matrix = self
            .xref
            .get(dict, "Matrix")?
            .and_then(|m| m.as_number_array())
            .and_then(|values| Matrix::from_slice(&values))
            .unwrap_or(Matrix::IDENTITY);
        let own_resources = self.xref.get(dict, "Resources")?.and_then(|r| r.as_dict().cloned());
        let resources = own_resources.as_ref().unwrap_or(parent_resources);

        let depth = self.stack.len();
        self.stack.push(self.state.clone());
        self.state.ctm = matrix.multiply(&self.state.ctm);
        self.forms.push(reference);

        let result = self.execute(&content, resources);

        self.forms.pop();
        // Unbalanced q/Q inside the form must not leak out
        self.stack.truncate(depth + 1);
        if let Some(state) = self.stack.pop() {
            self.state = state;
        }
        result
    }

    /// Replaces a color space resource name by its definition.
    fn resolve_color_space(&self, cs: PDFObject, resources: &Dict) -> PDFResult<PDFObject> {
        let Some(name) = cs.as_name() else {
            return self.xref.fetch_if_ref(&cs);
        };
        match resource_entry(self.xref, resources, "ColorSpace", name)? {
            Some(entry) => self.xref.fetch_if_ref(&entry),
            None => Ok(cs),
        }
    }
}

/// Returns `resources[category][name]`, with the category dictionary
/// resolved and the entry itself left as stored.
fn resource_entry(
    xref: &XRef,
    resources: &Dict,
    category: &str,
    name: &str,
) -> PDFResult<Option<PDFObject>> {
    let Some(entries) = xref.get(resources, category)? else {
        return Ok(None);
    };
    Ok(entries.as_dict().and_then(|d| d.get(name)).cloned())
}

fn numbers<const N: usize>(args: &[PDFObject]) -> Option<[f64; N]> {
    if args.len() < N {
        return None;
    }
    let mut values = [0.0; N];
    for (value, arg) in values.iter_mut().zip(args) {
        *value = arg.as_number()?;
    }
    Some(values)
}

fn matrix_operand(args: &[PDFObject]) -> Option<Matrix> {
    numbers::<6>(args).and_then(|v| Matrix::from_slice(&v))
}
