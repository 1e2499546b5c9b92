mod cli;

use clap::Parser;
use cli::{Cli, Command};
use hwnp::content::ParseFlagError;
use hwnp::session::{CheckSelection, Command as EditCommand, CommandError, Session};
use hwnp_util::hexdump::{format_size, hex_dump};
use hwnp_util::{ConsoleProgress, SectionExtractor, SilentProgress};
use snafu::{OptionExt, ResultExt, Snafu};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Top-level application errors for hwnp-util.
#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("failed to open image"))]
    OpenImage {
        source: hwnp_util::OpenImageError,
    },

    #[snafu(display("failed to extract sections"))]
    Extract {
        source: hwnp_util::ExtractError,
    },

    #[snafu(display("image has no section #{index}"))]
    NoSuchSection { index: usize },

    #[snafu(display("expected KEY=VALUE, got {arg:?}"))]
    BadAssignment { arg: String },

    #[snafu(display("invalid section index in {arg:?}"))]
    BadIndex { arg: String },

    #[snafu(display("expected on or off, got {value:?}"))]
    BadSwitch { value: String },

    #[snafu(display("invalid flag value in {arg:?}"))]
    ParseFlag {
        arg: String,
        source: ParseFlagError,
    },

    #[snafu(display("failed to read replacement file {}", path.display()))]
    ReadReplacement {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("image has no UpgradeCheck.xml section"))]
    NoUpgradeCheckSection,

    #[snafu(display("failed to apply edit"))]
    Edit { source: CommandError },

    #[snafu(display("failed to save image"))]
    Save { source: hwnp::SaveError },

    #[snafu(display("failed to get current directory"))]
    GetCurrentDir { source: std::io::Error },
}

type Result<T, E = Error> = std::result::Result<T, E>;

#[snafu::report]
fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_module("hwnp", level)
        .filter_module("hwnp_util", level)
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(false)
        .init();

    match cli.command {
        Command::Info { image_path } => cmd_info(&image_path),
        Command::List { image_path } => cmd_list(&image_path),
        Command::Extract {
            image_path,
            output,
            force,
            quiet,
        } => cmd_extract(&image_path, output.as_deref(), force, quiet),
        Command::Dump {
            image_path,
            section,
            max_bytes,
        } => cmd_dump(&image_path, section, max_bytes),
        Command::Edit {
            image_path,
            output,
            product_ids,
            replace,
            flag,
            check,
            all_checks,
        } => {
            let edits = EditArgs {
                product_ids,
                replace,
                flag,
                check,
                all_checks,
            };
            cmd_edit(&image_path, &output, &edits)
        }
    }
}

fn cmd_info(path: &Path) -> Result<()> {
    let image = unsafe { hwnp_util::open_image(path).context(OpenImageSnafu)? };
    let header = image.header();

    let crc_status = if image.crc_valid() { "ok" } else { "MISMATCH" };

    println!("Image: {}", path.display());
    println!();
    println!(
        "Image Size:     {} ({} bytes)",
        format_size(image.as_bytes().len() as u64),
        image.as_bytes().len()
    );
    println!("Payload Size:   {} bytes", header.payload_size());
    println!("Head CRC:       0x{:08X}", header.head_crc());
    println!("Computed CRC:   0x{:08X} ({crc_status})", image.computed_crc());
    println!("Head Length:    0x{:X}", header.head_len());
    println!("File CRC:       0x{:08X}", header.file_crc());
    println!("Version:        0x{:08X}", header.version());
    println!("Section Count:  {}", header.item_count());
    println!("Desc Size:      {} bytes", header.item_desc_size());
    println!("Product IDs:    {}", header.product_id_string());

    if let Some(section) = image.signinfo_section() {
        println!("Signinfo:       #{} {}", section.index(), section.path());
    }

    Ok(())
}

fn cmd_list(path: &Path) -> Result<()> {
    let image = unsafe { hwnp_util::open_image(path).context(OpenImageSnafu)? };

    println!("Sections in {}:", path.display());
    println!(
        "{:>5}  {:>10}  {:>10}  {:<6}  {:<12}  Path",
        "Index", "Offset", "Size", "Kind", "Label"
    );
    println!("{:-<5}  {:-<10}  {:-<10}  {:-<6}  {:-<12}  {:-<30}", "", "", "", "", "", "");

    for section in image.sections() {
        println!(
            "{:>5}  0x{:08X}  {:>10}  {:<6}  {:<12}  {}",
            section.index(),
            section.data_offset(),
            section.data_size(),
            section.content().name(),
            section.label(),
            section.path()
        );
    }

    Ok(())
}

fn cmd_extract(path: &Path, output: Option<&Path>, force: bool, quiet: bool) -> Result<()> {
    let image = unsafe { hwnp_util::open_image(path).context(OpenImageSnafu)? };

    // Use the image name as the default output directory.
    let output_dir = match output {
        Some(path) => path.to_path_buf(),
        None => {
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "hwnp".to_owned());
            std::env::current_dir()
                .context(GetCurrentDirSnafu)?
                .join(format!("{stem}.extracted"))
        }
    };

    if !quiet {
        println!(
            "Extracting {} to {}...",
            path.display(),
            output_dir.display()
        );
    }

    let start = std::time::Instant::now();

    if quiet {
        let extractor = SectionExtractor::new(&image, SilentProgress, force);
        extractor.extract(&output_dir).context(ExtractSnafu)?;
    } else {
        let progress = ConsoleProgress::new(image.section_count());
        let extractor = SectionExtractor::new(&image, progress, force);
        extractor.extract(&output_dir).context(ExtractSnafu)?;
    }

    if !quiet {
        println!("Done in {:.2}s.", start.elapsed().as_secs_f64());
    }

    Ok(())
}

fn cmd_dump(path: &Path, section: Option<usize>, max_bytes: usize) -> Result<()> {
    let image = unsafe { hwnp_util::open_image(path).context(OpenImageSnafu)? };

    match section {
        None => {
            let header = &image.as_bytes()[..image.header().data_start()];
            println!("Header and section table ({} bytes):", header.len());
            print!("{}", hex_dump(header, 0, max_bytes));
        }
        Some(index) => {
            let section = image.section(index).context(NoSuchSectionSnafu { index })?;
            println!(
                "Section #{index} {} ({}, {} bytes):",
                section.path(),
                section.content(),
                section.data_size()
            );
            if let Some(text) = section.text() {
                log::debug!("text view: {text:?}");
            }
            print!(
                "{}",
                hex_dump(image.section_data(section), section.data_offset(), max_bytes)
            );
        }
    }

    Ok(())
}

struct EditArgs {
    product_ids: Option<String>,
    replace: Vec<String>,
    flag: Vec<String>,
    check: Vec<String>,
    all_checks: Option<String>,
}

fn cmd_edit(path: &Path, output: &Path, args: &EditArgs) -> Result<()> {
    let image = hwnp_util::load_image(path).context(OpenImageSnafu)?;
    let commands = build_commands(&image, args)?;
    let mut session = Session::from_image(image);

    if commands.is_empty() {
        log::warn!("no edits requested, rewriting image with a fresh CRC");
    }

    session.apply_all(commands).context(EditSnafu)?;
    log::info!("applied {} edits", session.applied().len());

    let report = session.save(output).context(SaveSnafu)?;

    match report {
        Some(report) => {
            for path in report.updated() {
                println!("Re-stamped {path}");
            }
            for path in report.unmatched() {
                println!("No section for manifest entry {path}");
            }
        }
        None => println!("No signinfo section, manifest left untouched."),
    }

    println!(
        "Wrote {} (CRC 0x{:08X})",
        output.display(),
        session.image().header().head_crc()
    );

    Ok(())
}

fn build_commands(image: &hwnp::Image<Vec<u8>>, args: &EditArgs) -> Result<Vec<EditCommand>> {
    let mut commands = Vec::new();

    if let Some(ids) = &args.product_ids {
        let ids = ids
            .split('|')
            .filter(|id| !id.is_empty())
            .map(str::to_owned)
            .collect();
        commands.push(EditCommand::SetProductIds(ids));
    }

    for arg in &args.replace {
        let (index, file) = parse_indexed(arg)?;
        let path = PathBuf::from(file);
        let data = std::fs::read(&path).context(ReadReplacementSnafu { path })?;
        commands.push(EditCommand::SetSectionData { index, data });
    }

    for arg in &args.flag {
        let (index, hex) = parse_indexed(arg)?;
        let data = hwnp::content::parse_flag(hex).context(ParseFlagSnafu { arg })?;
        commands.push(EditCommand::SetSectionData { index, data });
    }

    if args.all_checks.is_some() || !args.check.is_empty() {
        let index = image
            .sections()
            .iter()
            .find(|s| s.file_name().ends_with("UpgradeCheck.xml"))
            .map(|s| s.index())
            .context(NoUpgradeCheckSectionSnafu)?;

        if let Some(value) = &args.all_checks {
            commands.push(EditCommand::SetUpgradeChecks {
                index,
                checks: CheckSelection::All(parse_switch(value)?),
            });
        }

        if !args.check.is_empty() {
            let named = args
                .check
                .iter()
                .map(|arg| {
                    let (name, value) = split_assignment(arg)?;
                    Ok((name.to_owned(), parse_switch(value)?))
                })
                .collect::<Result<BTreeMap<_, _>>>()?;
            commands.push(EditCommand::SetUpgradeChecks {
                index,
                checks: CheckSelection::Named(named),
            });
        }
    }

    Ok(commands)
}

fn split_assignment(arg: &str) -> Result<(&str, &str)> {
    arg.split_once('=')
        .filter(|(key, _)| !key.is_empty())
        .context(BadAssignmentSnafu { arg })
}

fn parse_indexed(arg: &str) -> Result<(usize, &str)> {
    let (index, value) = split_assignment(arg)?;
    let index = index.trim().parse().ok().context(BadIndexSnafu { arg })?;
    Ok((index, value))
}

fn parse_switch(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "on" | "1" | "true" => Ok(true),
        "off" | "0" | "false" => Ok(false),
        _ => BadSwitchSnafu { value }.fail(),
    }
}
