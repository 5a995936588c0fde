extern crate clap;
extern crate env_logger;
extern crate prodos;

use clap::{App, AppSettings, Arg, SubCommand};
use std::fs::File;
use std::io::{self, Write};
use std::process;

use prodos::applefile::{DataSource, DefaultFile, RenderOptions};
use prodos::disk::block::DiskAddress;
use prodos::disk::{self, ProdosDisk};

// Possible exit codes
static _EXIT_SUCCESS: i32 = 0;
static EXIT_FAILURE: i32 = 1;

/// If a dash is specified for a filename, this indicates that the user wants
/// to write to standard output.
static STDOUT_PSEUDOFILENAME: &str = "-";

fn main() {
    env_logger::init();

    let render_args = [
        Arg::with_name("quirks")
            .short("q")
            .long("quirks")
            .help("Apply hi-res colour artifact corrections"),
        Arg::with_name("mono")
            .short("m")
            .long("mono")
            .help("Render pictures in monochrome"),
    ];

    // Parse command-line arguments
    let app = App::new("ProDOS Disk Image Utility")
        .version("0.1.0")
        .about("Read and understand Apple II ProDOS disk images.")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(Arg::with_name("diskimage").required(true))
        .subcommand(
            SubCommand::with_name("dir")
                .about("Show a catalog listing")
                .arg(
                    Arg::with_name("verbose")
                        .short("v")
                        .long("verbose")
                        .multiple(true)
                        .help("Show more detail"),
                ),
        )
        .subcommand(
            SubCommand::with_name("show")
                .about("Decode a file and show it as text.")
                .arg(Arg::with_name("path").required(true))
                .args(&render_args)
                .arg(
                    Arg::with_name("image")
                        .short("i")
                        .long("image")
                        .help("Also draw the picture with block characters"),
                ),
        )
        .subcommand(
            SubCommand::with_name("read")
                .about("Read a file from a disk image.")
                .arg(Arg::with_name("source_path").required(true))
                .arg(Arg::with_name("destination_filename").required(false)),
        )
        .subcommand(
            SubCommand::with_name("dump")
                .about("Provide a hex dump of a disk image or file.")
                .arg(Arg::with_name("path").required(false)),
        )
        .subcommand(SubCommand::with_name("sectors").about("Show the role of every block."));

    let mut app_clone = app.clone();
    let matches = app.get_matches();

    let diskimage = matches.value_of("diskimage").unwrap();
    let result = match matches.subcommand() {
        ("dir", Some(m)) => cmd_dir(diskimage, m.occurrences_of("verbose")),
        ("show", Some(m)) => cmd_show(
            diskimage,
            m.value_of("path").unwrap(),
            RenderOptions::new(m.is_present("quirks"), m.is_present("mono")),
            m.is_present("image"),
        ),
        ("read", Some(m)) => cmd_read(
            diskimage,
            m.value_of("source_path").unwrap(),
            m.value_of("destination_filename"),
        ),
        ("dump", Some(m)) => cmd_dump(diskimage, m.value_of("path")),
        ("sectors", Some(_)) => cmd_sectors(diskimage),
        _ => {
            app_clone.print_help().unwrap();
            println!();
            process::exit(EXIT_FAILURE);
        }
    };
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(EXIT_FAILURE);
    }
}

fn open_fs_writer(filename: &str) -> io::Result<Box<dyn Write>> {
    if filename == STDOUT_PSEUDOFILENAME {
        Ok(Box::new(io::stdout()))
    } else {
        Ok(Box::new(File::create(filename)?))
    }
}

/// The last component of a `/`-separated path.
fn base_name(path: &str) -> &str {
    path.rsplit('/').find(|c| !c.is_empty()).unwrap_or(path)
}

fn cmd_dir(diskimage: &str, verbosity: u64) -> io::Result<()> {
    let disk = disk::open(diskimage)?;
    println!("{}", disk);
    for (path, entry) in disk.catalog().walk() {
        let indent = "  ".repeat(path.matches('/').count());
        if verbosity > 0 {
            println!("{}{:#}", indent, entry);
            if verbosity > 1 {
                println!(
                    "{}  data blocks: {}",
                    indent,
                    DiskAddress::format_addresses(&entry.data_blocks)
                );
            }
        } else {
            println!("{}{}", indent, entry);
        }
    }
    let summary = disk.volume_summary();
    println!(
        "{} blocks free, {} used, {} total.",
        summary.free, summary.used, summary.total
    );
    Ok(())
}

fn cmd_show(diskimage: &str, path: &str, options: RenderOptions, draw: bool) -> io::Result<()> {
    let disk = disk::open(diskimage)?;
    let entry = disk.find(path)?;
    let decoded = disk.decode(entry, options);
    println!("{}: {}", disk.catalog().path_of(entry), decoded.kind());
    println!("{}", decoded.text());
    if let Some(image) = decoded.image() {
        println!("Image: {}x{}", image.width, image.height);
        if draw {
            print!("{}", image.to_unicode());
        }
    }
    Ok(())
}

fn cmd_read(diskimage: &str, source_path: &str, destination_filename: Option<&str>) -> io::Result<()> {
    let disk = disk::open(diskimage)?;
    let entry = disk.find(source_path)?;
    let destination_filename = destination_filename.unwrap_or_else(|| base_name(source_path));
    let mut writer = open_fs_writer(destination_filename)?;
    writer.write_all(&disk.buffers(entry).exact)?;
    writer.flush()?;
    Ok(())
}

fn cmd_dump(diskimage: &str, path: Option<&str>) -> io::Result<()> {
    let disk = disk::open(diskimage)?;
    match path {
        Some(path) => {
            let entry = disk.find(path)?;
            let raw = DefaultFile::new(entry.name(), &disk.buffers(entry).raw);
            raw.dump(&mut io::stdout())?;
        }
        None => disk.dump(&mut io::stdout())?,
    }
    io::stdout().flush()?;
    Ok(())
}

fn cmd_sectors(diskimage: &str) -> io::Result<()> {
    let disk: ProdosDisk = disk::open(diskimage)?;
    let map = disk.sector_map();
    print!("{}", map.render(disk.catalog().total_blocks()));
    println!();
    for (role, count) in map.counts() {
        println!("{} {:<20} {}", role.symbol(), role, count);
    }
    Ok(())
}
