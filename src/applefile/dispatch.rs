//! Choosing a decoder for a catalog entry.
//!
//! Most file types map straight to one decoder.  The binary-like types
//! (`BIN`, `REL`, `SYS`, `BAT` and user type `$F1`) hold anything from
//! machine code to pictures, so they go through an ordered list of rules
//! and the first rule that matches picks the decoder.

use std::io;
use std::panic::{self, AssertUnwindSafe};

use log::{debug, warn};

use crate::applefile::container::{ContainerFormat, ContainerImage};
use crate::applefile::font::{self, FontFile, QuickDrawFont};
use crate::applefile::hires::HiResImage;
use crate::applefile::lode_runner::{self, LodeRunnerLevels};
use crate::applefile::shape::{self, ShapeTable};
use crate::applefile::text::{self, MerlinSource, SimpleText, TextFile};
use crate::applefile::{
    ApplesoftProgram, AssemblerProgram, DecodedFile, DefaultFile, DirectoryListing,
    DoubleHiResImage, ErrorFile, IntegerBasicProgram, RenderOptions, StoredVariables,
    SuperHiResImage, VolumeSummary,
};
use crate::disk::filetype;
use crate::disk::random_access::TextBuffer;

/// Everything a decoder may need to know about one file.
#[derive(Clone, Copy, Debug)]
pub struct DecodeRequest<'a> {
    pub name: &'a str,
    pub file_type: u8,
    pub aux_type: u16,
    pub eof: usize,
    /// The file's bytes cut or padded to its end-of-file.
    pub exact: &'a [u8],
    /// Every byte of every data block.
    pub raw: &'a [u8],
    /// Every data block of a linked double hi-res companion.
    pub link: Option<&'a [u8]>,
    /// Block runs of a random-access text file.
    pub runs: Option<&'a [TextBuffer]>,
    pub volume: VolumeSummary,
}

impl<'a> DecodeRequest<'a> {
    pub fn new(
        name: &'a str,
        file_type: u8,
        aux_type: u16,
        eof: usize,
        exact: &'a [u8],
        raw: &'a [u8],
    ) -> DecodeRequest<'a> {
        DecodeRequest {
            name,
            file_type,
            aux_type,
            eof,
            exact,
            raw,
            link: None,
            runs: None,
            volume: VolumeSummary::default(),
        }
    }

    pub fn with_link(self, link: &'a [u8]) -> DecodeRequest<'a> {
        DecodeRequest {
            link: Some(link),
            ..self
        }
    }

    pub fn with_runs(self, runs: &'a [TextBuffer]) -> DecodeRequest<'a> {
        DecodeRequest {
            runs: Some(runs),
            ..self
        }
    }

    pub fn with_volume(self, volume: VolumeSummary) -> DecodeRequest<'a> {
        DecodeRequest { volume, ..self }
    }
}

type Matcher = fn(&DecodeRequest) -> bool;
type Builder = fn(&DecodeRequest, RenderOptions) -> io::Result<DecodedFile>;

/// One step of the binary-like decision list.
struct Rule {
    name: &'static str,
    matches: Matcher,
    build: Builder,
}

static BINARY_RULES: [Rule; 9] = [
    Rule {
        name: "shape table",
        matches: |r| shape::is_shape_table(r.exact),
        build: |r, _| Ok(DecodedFile::ShapeTable(ShapeTable::new(r.name, r.exact))),
    },
    Rule {
        name: "html",
        matches: |r| text::is_html(r.exact),
        build: |r, _| Ok(DecodedFile::SimpleText(SimpleText::new(r.name, r.exact))),
    },
    Rule {
        name: "container image",
        matches: |r| ContainerFormat::detect(r.name, r.exact).is_some(),
        build: |r, options| {
            let image = ContainerImage::new(r.name, r.exact, r.aux_type, options)?;
            Ok(DecodedFile::Container(image))
        },
    },
    Rule {
        name: "font",
        matches: |r| r.name.ends_with(".FNT") && font::is_font(r.exact),
        build: |r, _| Ok(DecodedFile::Font(FontFile::new(r.name, r.exact)?)),
    },
    Rule {
        name: "double hi-res pair",
        matches: |r| r.link.is_some(),
        build: |r, options| {
            let link = r.link.unwrap_or(&[]);
            let (aux, main) = if r.name.ends_with(".AUX") {
                (r.exact, link)
            } else {
                (link, r.exact)
            };
            let image = DoubleHiResImage::new(r.name, aux, main, options)?;
            Ok(DecodedFile::DoubleHiRes(image))
        },
    },
    Rule {
        name: "double hi-res file",
        matches: |r| r.name.ends_with(".PAC") || r.name.ends_with(".A2FC"),
        build: |r, options| {
            let image = DoubleHiResImage::from_single(r.name, r.exact, options)?;
            Ok(DecodedFile::DoubleHiRes(image))
        },
    },
    Rule {
        name: "hi-res",
        matches: |r| {
            matches!(r.eof, 0x1FF8 | 0x1FFF | 0x2000 | 0x4000)
                && matches!(r.aux_type, 0x1FFF | 0x2000 | 0x4000)
        },
        build: |r, options| {
            let image = HiResImage::new(r.name, r.exact, r.file_type, r.aux_type, options);
            Ok(DecodedFile::HiRes(image))
        },
    },
    Rule {
        name: "lode runner levels",
        matches: |r| lode_runner::is_level_file(r.name, r.eof),
        build: |r, _| Ok(DecodedFile::LodeRunner(LodeRunnerLevels::new(r.name, r.exact))),
    },
    Rule {
        name: "assembler",
        matches: |_| true,
        build: |r, _| {
            let program = if r.exact.len() < r.raw.len() {
                AssemblerProgram::with_extra(r.name, r.exact, r.aux_type, &r.raw[r.exact.len()..])
            } else {
                AssemblerProgram::new(r.name, r.exact, r.aux_type)
            };
            Ok(DecodedFile::Assembler(program))
        },
    },
];

/// The name of the binary-like rule that claims `request`.
pub fn binary_rule(request: &DecodeRequest) -> &'static str {
    BINARY_RULES
        .iter()
        .find(|rule| (rule.matches)(request))
        .map(|rule| rule.name)
        .unwrap_or("assembler")
}

fn decode_binary(request: &DecodeRequest, options: RenderOptions) -> io::Result<DecodedFile> {
    for rule in &BINARY_RULES {
        if (rule.matches)(request) {
            debug!("{}: decoding as {}", request.name, rule.name);
            return (rule.build)(request, options);
        }
    }
    Ok(DecodedFile::Assembler(AssemblerProgram::new(
        request.name,
        request.exact,
        request.aux_type,
    )))
}

fn decode_text(request: &DecodeRequest) -> DecodedFile {
    let is_source = request.name.ends_with(".S");
    if request.aux_type == 0 {
        return if is_source {
            DecodedFile::Merlin(MerlinSource::new(request.name, request.exact))
        } else {
            DecodedFile::Text(TextFile::new(request.name, request.exact, 0))
        };
    }
    match request.runs {
        Some([run]) if is_source => DecodedFile::Merlin(MerlinSource::new(request.name, &run.buffer)),
        Some(runs) => DecodedFile::Text(TextFile::from_runs(request.name, runs, request.aux_type)),
        None => DecodedFile::Text(TextFile::new(request.name, request.exact, request.aux_type)),
    }
}

fn labelled(request: &DecodeRequest, label: &str, buffer: &[u8]) -> DecodedFile {
    DecodedFile::Default(DefaultFile::labelled(request.name, label, buffer))
}

fn decode_by_type(request: &DecodeRequest, options: RenderOptions) -> io::Result<DecodedFile> {
    let r = request;
    let file = match r.file_type {
        t if filetype::is_binary_like(t) => return decode_binary(r, options),
        filetype::TEXT => decode_text(r),
        filetype::APPLESOFT => DecodedFile::Applesoft(ApplesoftProgram::new(r.name, r.exact)),
        filetype::INTEGER_BASIC => {
            DecodedFile::IntegerBasic(IntegerBasicProgram::new(r.name, r.exact))
        }
        filetype::DIRECTORY => {
            DecodedFile::Directory(DirectoryListing::new(r.name, r.raw, r.volume))
        }
        filetype::VARIABLES => {
            let buffer = if r.eof == 0 { r.raw } else { r.exact };
            DecodedFile::Variables(StoredVariables::new(r.name, buffer))
        }
        filetype::APPLETALK => labelled(r, "Appletalk file", r.raw),
        filetype::GWP | filetype::IIGS_SOURCE => {
            DecodedFile::SimpleText(SimpleText::new(r.name, r.exact))
        }
        filetype::AWP => labelled(r, "Appleworks Word Processor", r.raw),
        filetype::ADB => labelled(r, "Appleworks Database File", r.raw),
        filetype::ASP => labelled(r, "Appleworks Spreadsheet File", r.raw),
        filetype::IIGS_APPLICATION => {
            DecodedFile::Assembler(AssemblerProgram::new(r.name, r.raw, r.aux_type))
        }
        filetype::IIGS_DEVICE_DRIVER => labelled(r, "IIgs device driver", r.exact),
        filetype::ICN => labelled(r, "Icon file", r.exact),
        filetype::DESCRIPTOR_TABLE => labelled(r, "File type descriptor table", r.exact),
        filetype::FST => labelled(r, "File system translator", r.exact),
        filetype::PNT | filetype::PIC => DecodedFile::SuperHiRes(SuperHiResImage::new(
            r.name,
            r.exact,
            r.file_type,
            r.aux_type,
            options,
        )?),
        filetype::FONT => DecodedFile::QuickDrawFont(QuickDrawFont::new(r.name, r.exact)?),
        filetype::PASCAL_VOLUME | filetype::FINDER => {
            DecodedFile::Default(DefaultFile::new(r.name, r.exact))
        }
        other => {
            debug!("{}: no decoder for file type ${:02X}", r.name, other);
            DecodedFile::Default(DefaultFile::new(r.name, r.exact))
        }
    };
    Ok(file)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "decoder panicked".to_string()
    }
}

/// Decode one file.  This never fails: a decoder that returns an error, or
/// panics on malformed data, yields a `DecodedFile::Error` holding the raw
/// buffer and the reason.
pub fn decode(request: &DecodeRequest, options: RenderOptions) -> DecodedFile {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| decode_by_type(request, options)));
    let message = match outcome {
        Ok(Ok(file)) => return file,
        Ok(Err(e)) => e.to_string(),
        Err(payload) => panic_message(payload.as_ref()),
    };
    warn!("{}: {}", request.name, message);
    DecodedFile::Error(ErrorFile::new(request.name, &message, request.raw))
}
