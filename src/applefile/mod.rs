//! Decoders for the file formats found on Apple II ProDOS volumes.
//!
//! Every decoder produces a value implementing [`DataSource`], and
//! [`DecodedFile`] gathers them into one enum, which is what the
//! [`dispatch`] module hands back for any catalog entry.

mod assembler;
mod basic;
mod container;
mod double_hires;
mod error;
mod font;
mod hires;
mod listing;
mod lode_runner;
mod options;
mod packed;
mod pixels;
mod shape;
mod shr;
mod text;
mod variables;

pub mod dispatch;

use std::io::{self, Write};

use crate::util;

pub use self::assembler::AssemblerProgram;
pub use self::basic::{ApplesoftProgram, IntegerBasicProgram};
pub use self::container::ContainerImage;
pub use self::double_hires::DoubleHiResImage;
pub use self::error::FormatError;
pub use self::font::{FontFile, QuickDrawFont};
pub use self::hires::{apply_quirks, merge_colours, unscrunch, HiResImage};
pub use self::listing::{DirectoryListing, VolumeSummary};
pub use self::lode_runner::LodeRunnerLevels;
pub use self::options::{set_default_colour_quirks, set_default_monochrome, RenderOptions};
pub use self::packed::unpack_bytes;
pub use self::pixels::{PixelGrid, PixelKind};
pub use self::shape::ShapeTable;
pub use self::shr::SuperHiResImage;
pub use self::text::{MerlinSource, SimpleText, TextFile};
pub use self::variables::StoredVariables;

/// Methods common to every decoded file.
pub trait DataSource {
    /// The name of the file this was decoded from.
    fn name(&self) -> &str;
    /// The bytes the decoder worked from.
    fn buffer(&self) -> &[u8];
    /// A textual rendering: a listing, the text itself, or a summary.
    fn text(&self) -> String;
    /// The decoded picture, for formats that have one.
    fn image(&self) -> Option<&PixelGrid> {
        None
    }

    /// Hex-dump the decoder's buffer to the provided writer.
    fn dump(&self, writer: &mut dyn Write) -> io::Result<()> {
        writeln!(writer, "Name: {}", self.name())?;
        writeln!(writer, "{}", util::hex(self.buffer()))
    }
}

/// A file of a type this crate has no special knowledge of, shown as a
/// labelled hex dump.
pub struct DefaultFile {
    name: String,
    label: Option<String>,
    buffer: Vec<u8>,
}

impl DefaultFile {
    pub fn new(name: &str, buffer: &[u8]) -> DefaultFile {
        DefaultFile {
            name: name.to_string(),
            label: None,
            buffer: buffer.to_vec(),
        }
    }

    pub fn labelled(name: &str, label: &str, buffer: &[u8]) -> DefaultFile {
        DefaultFile {
            label: Some(label.to_string()),
            ..DefaultFile::new(name, buffer)
        }
    }
}

impl DataSource for DefaultFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    fn text(&self) -> String {
        let title = match &self.label {
            Some(label) => format!("{} ({})", self.name, label),
            None => self.name.clone(),
        };
        format!("{}\n\n{}\n", title, util::hex(&self.buffer))
    }
}

/// Stands in for a file whose decoder failed.
pub struct ErrorFile {
    name: String,
    message: String,
    buffer: Vec<u8>,
}

impl ErrorFile {
    pub fn new(name: &str, message: &str, buffer: &[u8]) -> ErrorFile {
        ErrorFile {
            name: name.to_string(),
            message: message.to_string(),
            buffer: buffer.to_vec(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl DataSource for ErrorFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    fn text(&self) -> String {
        format!(
            "Error decoding {}: {}\n\n{}\n",
            self.name,
            self.message,
            util::hex(&self.buffer)
        )
    }
}

/// The result of decoding one catalog entry.
pub enum DecodedFile {
    HiRes(HiResImage),
    DoubleHiRes(DoubleHiResImage),
    SuperHiRes(SuperHiResImage),
    Container(ContainerImage),
    ShapeTable(ShapeTable),
    SimpleText(SimpleText),
    Text(TextFile),
    Merlin(MerlinSource),
    Applesoft(ApplesoftProgram),
    IntegerBasic(IntegerBasicProgram),
    Variables(StoredVariables),
    Assembler(AssemblerProgram),
    Font(FontFile),
    QuickDrawFont(QuickDrawFont),
    LodeRunner(LodeRunnerLevels),
    Directory(DirectoryListing),
    Default(DefaultFile),
    Error(ErrorFile),
}

impl DecodedFile {
    /// A short name for the decoder that produced this file.
    pub fn kind(&self) -> &'static str {
        match self {
            DecodedFile::HiRes(_) => "hi-res image",
            DecodedFile::DoubleHiRes(_) => "double hi-res image",
            DecodedFile::SuperHiRes(_) => "super hi-res image",
            DecodedFile::Container(_) => "image",
            DecodedFile::ShapeTable(_) => "shape table",
            DecodedFile::SimpleText(_) => "simple text",
            DecodedFile::Text(_) => "text",
            DecodedFile::Merlin(_) => "merlin source",
            DecodedFile::Applesoft(_) => "applesoft program",
            DecodedFile::IntegerBasic(_) => "integer basic program",
            DecodedFile::Variables(_) => "stored variables",
            DecodedFile::Assembler(_) => "assembler program",
            DecodedFile::Font(_) => "font",
            DecodedFile::QuickDrawFont(_) => "quickdraw font",
            DecodedFile::LodeRunner(_) => "lode runner levels",
            DecodedFile::Directory(_) => "directory",
            DecodedFile::Default(_) => "default",
            DecodedFile::Error(_) => "error",
        }
    }

    /// True for results that depend on the render options.
    pub fn is_image(&self) -> bool {
        matches!(
            self,
            DecodedFile::HiRes(_)
                | DecodedFile::DoubleHiRes(_)
                | DecodedFile::SuperHiRes(_)
                | DecodedFile::ShapeTable(_)
                | DecodedFile::Font(_)
        )
    }

    /// Return a reference to the underlying decoder.
    fn get_specialized_file(&self) -> &dyn DataSource {
        match self {
            DecodedFile::HiRes(ref f) => f,
            DecodedFile::DoubleHiRes(ref f) => f,
            DecodedFile::SuperHiRes(ref f) => f,
            DecodedFile::Container(ref f) => f,
            DecodedFile::ShapeTable(ref f) => f,
            DecodedFile::SimpleText(ref f) => f,
            DecodedFile::Text(ref f) => f,
            DecodedFile::Merlin(ref f) => f,
            DecodedFile::Applesoft(ref f) => f,
            DecodedFile::IntegerBasic(ref f) => f,
            DecodedFile::Variables(ref f) => f,
            DecodedFile::Assembler(ref f) => f,
            DecodedFile::Font(ref f) => f,
            DecodedFile::QuickDrawFont(ref f) => f,
            DecodedFile::LodeRunner(ref f) => f,
            DecodedFile::Directory(ref f) => f,
            DecodedFile::Default(ref f) => f,
            DecodedFile::Error(ref f) => f,
        }
    }
}

impl DataSource for DecodedFile {
    fn name(&self) -> &str {
        self.get_specialized_file().name()
    }

    fn buffer(&self) -> &[u8] {
        self.get_specialized_file().buffer()
    }

    fn text(&self) -> String {
        self.get_specialized_file().text()
    }

    fn image(&self) -> Option<&PixelGrid> {
        self.get_specialized_file().image()
    }
}
