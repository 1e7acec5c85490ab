pub mod base_stream;
pub mod cmap;
pub mod content_stream;
pub mod decode;
pub mod diagnostics;
pub mod document;
pub mod encoding;
pub mod error;
pub mod extract;
pub mod font;
pub mod graphics_state;
pub mod image;
pub mod lexer;
pub mod limits;
pub mod page;
pub mod parser;
pub mod stream;
pub mod text_layout;
pub mod xref;

pub use base_stream::BaseStream;
pub use content_stream::{
    ContentEvent, ContentStreamReader, ImagePaintEvent, Interpreter, OpCode, Operation,
    TextShowEvent,
};
pub use decode::{DecodedStream, ImageCodec};
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
pub use document::{DocumentInfo, PDFDocument};
pub use error::{ExtractionError, LimitKind, PDFError, PDFResult};
pub use extract::{ExtractOptions, ExtractionResult, PageContent, extract_document};
pub use font::Font;
pub use graphics_state::{Color, GraphicsState, Matrix, Point, Rect};
pub use image::{ExtractedImage, ImageEncoding};
pub use lexer::{Lexer, Token};
pub use limits::{Deadline, ExtractionLimits};
pub use page::Page;
pub use parser::{Dict, PDFObject, Parser};
pub use stream::Stream;
pub use text_layout::{LayoutConfig, TextBlock, TextLayout, TextLine, TextRun};
pub use xref::{XRef, XRefEntry, XRefStats};
