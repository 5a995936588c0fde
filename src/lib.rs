//! This is a Rust library for reading ProDOS disk images from the Apple II
//! family of computers, and for making sense of the files stored on them.
//!
//! Features:
//!
//! * Read ProDOS-ordered (`.po`, `.hdv`), DOS-ordered (`.do`, `.dsk`) and
//! 2IMG (`.2mg`) disk images.
//! * Walk the volume directory and every subdirectory, tolerating broken
//! entries and directory chains.
//! * Resolve seedling, sapling and tree storage, including sparse files, and
//! record which role each block plays.
//! * Assemble a file's raw and end-of-file-exact buffers, and the block runs
//! of random-access text files.
//! * Decode common file formats: Applesoft and Integer BASIC programs, text,
//! Merlin source, 6502 machine code, stored variables, shape tables, fonts,
//! hi-res, double hi-res and Super Hi-Res pictures.
//! * A sample `pdisk` program for inspecting disk images from the command
//! line.
//!
//! # Example
//!
//! The following example opens a disk image and prints the kind of every
//! file on it:
//!
//! ```no_run
//! use std::io;
//! use prodos::applefile::RenderOptions;
//! use prodos::disk;
//! # fn list_kinds() -> io::Result<()> {
//!
//! let disk = disk::open("/tmp/games.po")?;
//! for (path, entry) in disk.catalog().walk() {
//!     let decoded = disk.decode(entry, RenderOptions::defaults());
//!     println!("{:<40} {}", path, decoded.kind());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Design of disk image access
//!
//! Support for disk images was built using a layered scheme:
//!
//! 1. `Image` provides access to the underlying storage containing the disk
//!    image: a read-only memory map of a file, or an in-memory array.
//! 2. `BlockDevice` divides the image into 512-byte blocks, undoing the DOS
//!    3.3 sector interleave where the image needs it.
//! 3. The storage resolver turns a catalog entry's key block into the list
//!    of its data blocks, and the catalog walker reads every directory.
//! 4. `ProdosDisk` ties these together, assembling buffers and handing them
//!    to the format dispatcher in `applefile`.
//!
//! Decoding never fails outright.  A decoder that cannot make sense of its
//! input produces an error file carrying the reason and the raw bytes, so a
//! browser always has something to show.
//!
//! Rendering is controlled by `RenderOptions`, which every decode takes
//! explicitly.  Decoded images are cached per entry along with the options
//! they were rendered with, so changing the options causes a fresh decode.
//!
//! # License
//!
//! Prodos is distributed under the terms of both the MIT license and the
//! Apache License (Version 2.0).
//!
//! See LICENSE-APACHE and LICENSE-MIT for details.

pub mod applefile;
pub mod disk;

mod util;

pub use crate::applefile::{DataSource, DecodedFile, RenderOptions};
pub use crate::disk::ProdosDisk;
