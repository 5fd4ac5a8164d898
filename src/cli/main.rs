use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};

use exif_editor::exif::{self, EditBatch, ExifData, TagValue};
use exif_editor::{config, pipeline};

#[derive(Parser, Debug)]
#[command(
    name = "exif-editor",
    version,
    about = "Show and edit EXIF metadata in JPEG and TIFF images, including custom named tags"
)]
struct Cli {
    /// Image files or directories to process
    #[arg(value_name = "PATH")]
    paths: Vec<PathBuf>,

    /// Set a tag: NAME=VALUE (repeatable). Unknown names become custom tags.
    #[arg(short, long = "set", value_name = "NAME=VALUE", value_parser = parse_assignment)]
    set: Vec<(String, String)>,

    /// Delete a tag by name, qualified ID (Exif.9286) or primary ID (repeatable)
    #[arg(short, long = "delete", value_name = "TAG")]
    delete: Vec<String>,

    /// Path to config file (default: config.json next to binary)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Initialize a default config.json and exit
    #[arg(long)]
    init: bool,

    /// Preview changes without writing to files
    #[arg(long)]
    dry_run: bool,

    /// Output results as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn parse_assignment(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected NAME=VALUE, got '{s}'")),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Handle --init
    if cli.init {
        let config = config::Config::default();
        let path = cli.config.as_deref();
        config.save(path)?;
        let save_path = match path {
            Some(p) => p.to_path_buf(),
            None => config::Config::config_path()?,
        };
        println!("Default config written to {}", save_path.display());
        return Ok(());
    }

    if cli.paths.is_empty() {
        anyhow::bail!("No input files or directories specified. Use --help for usage.");
    }

    // Load config
    let mut config = config::Config::load(cli.config.as_deref())?;

    // Override dry_run from CLI flag
    if cli.dry_run {
        config.output.dry_run = true;
    }

    let images = pipeline::collect_images(&cli.paths, &config.scan);
    if images.is_empty() {
        anyhow::bail!("No supported image files found in the specified paths.");
    }

    if cli.set.is_empty() && cli.delete.is_empty() {
        show_images(&images, cli.json)
    } else {
        edit_images(&images, &cli, &config)
    }
}

// ============================================================================
// Show
// ============================================================================

fn show_images(images: &[PathBuf], json: bool) -> Result<()> {
    let mut results = Vec::new();

    for image_path in images {
        match exif::read_exif(image_path) {
            Ok(data) if json => results.push(serde_json::json!({
                "path": image_path.display().to_string(),
                "tags": data.tags.records(),
            })),
            Ok(data) => print_full_exif(image_path, &data),
            Err(e) if json => results.push(serde_json::json!({
                "path": image_path.display().to_string(),
                "tags": [],
                "error": e.to_string(),
            })),
            Err(e) => {
                log::error!("{}: {e}", image_path.display());
                print_full_exif(image_path, &ExifData::default());
            }
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    }
    Ok(())
}

// ============================================================================
// Edit
// ============================================================================

fn edit_images(images: &[PathBuf], cli: &Cli, config: &config::Config) -> Result<()> {
    let batch = EditBatch::from_parts(cli.set.iter().cloned(), cli.delete.iter().cloned());
    let options = pipeline::EditOptions::from(config);

    log::info!("Found {} image(s) to edit", images.len());
    if options.dry_run {
        log::info!("DRY RUN: no files will be modified");
    }

    let total = images.len();
    let mut results = Vec::new();
    let mut failed = 0;

    for (i, image_path) in images.iter().enumerate() {
        log::info!("[{}/{}] Editing: {}", i + 1, total, image_path.display());

        match pipeline::apply_batch(image_path, &batch, &options) {
            Ok(report) => {
                for outcome in &report.outcomes {
                    match &outcome.result {
                        Ok(qid) => log::info!("  {} ({qid})", outcome.op),
                        Err(e) => log::warn!("  {}: {e}", outcome.op),
                    }
                }
                if cli.json {
                    let outcomes: Vec<serde_json::Value> = report
                        .outcomes
                        .iter()
                        .map(|o| {
                            serde_json::json!({
                                "op": o.op.to_string(),
                                "tag_id": o.result.as_ref().ok().map(ToString::to_string),
                                "error": o.result.as_ref().err().map(ToString::to_string),
                            })
                        })
                        .collect();
                    results.push(serde_json::json!({
                        "path": image_path.display().to_string(),
                        "written": report.written,
                        "outcomes": outcomes,
                    }));
                }
            }
            Err(e) => {
                failed += 1;
                log::error!("  Error: {e}");
                if cli.json {
                    results.push(serde_json::json!({
                        "path": image_path.display().to_string(),
                        "written": false,
                        "error": e.to_string(),
                    }));
                }
            }
        }
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    }

    log::info!("Done: {} succeeded, {failed} failed out of {total} images", total - failed);
    Ok(())
}

// ============================================================================
// Display
// ============================================================================

// ANSI color codes
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";

/// Max width for the value column before wrapping.
const VAL_WIDTH: usize = 40;
/// Indent for continuation lines (name column + " : " + id column + " : ").
const INDENT: &str = "                                      ";

/// Print the highlighted summary followed by every tag.
fn print_full_exif(path: &Path, data: &ExifData) {
    println!();
    println!("{BOLD}File:{RESET} {}", path.display());
    println!("{DIM}{}{RESET}", "═".repeat(72));

    let taken = text_of(data, "DateTimeOriginal").or_else(|| text_of(data, "DateTime"));
    print_highlight("Date taken", taken);
    print_highlight("Location", gps_summary(data));
    print_highlight("Digitized", text_of(data, "DateTimeDigitized"));
    println!();

    if data.tags.is_empty() {
        println!("  {DIM}(no EXIF metadata found){RESET}");
        println!();
        return;
    }

    println!("  {BOLD}{:<22} : {:<10} : Value{RESET}", "Tag", "ID");
    println!("  {DIM}{}{RESET}", "─".repeat(70));
    for record in data.tags.records() {
        print_row(&record.tag_name, &record.tag_id, &record.value);
    }
    println!();
}

fn print_highlight(label: &str, value: Option<String>) {
    match value {
        Some(v) => println!("  {BOLD}{label:<12}{RESET} {v}"),
        None => println!("  {BOLD}{label:<12}{RESET} {DIM}not recorded{RESET}"),
    }
}

fn text_of(data: &ExifData, name: &str) -> Option<String> {
    let value = data.tags.get(name)?.value.to_string();
    (!value.is_empty()).then_some(value)
}

/// Signed decimal degrees for a GPS coordinate stored as degrees/minutes/seconds.
fn gps_coordinate(data: &ExifData, name: &str, reference: &str) -> Option<f64> {
    let TagValue::Rational(parts) = &data.tags.get(name)?.value else {
        return None;
    };
    let mut degrees = 0.0;
    for (part, scale) in parts.iter().zip([1.0, 60.0, 3600.0]) {
        if part.den == 0 {
            return None;
        }
        degrees += part.num as f64 / part.den as f64 / scale;
    }
    match text_of(data, reference).as_deref() {
        Some("S") | Some("W") => Some(-degrees),
        _ => Some(degrees),
    }
}

fn gps_summary(data: &ExifData) -> Option<String> {
    let lat = gps_coordinate(data, "GPSLatitude", "GPSLatitudeRef")?;
    let lon = gps_coordinate(data, "GPSLongitude", "GPSLongitudeRef")?;
    Some(format!("{lat:.6}, {lon:.6}"))
}

/// Print a single row in the EXIF display table.
fn print_row(tag: &str, id: &str, val: &str) {
    let tag_col = format!("{:<22}", tag);
    let id_col = format!("{:<10}", id);
    let lines = wrap_text(val, VAL_WIDTH);
    for (i, line) in lines.iter().enumerate() {
        if i == 0 {
            println!("  {tag_col} : {id_col} : {line}");
        } else {
            println!("  {INDENT}{line}");
        }
    }
}

/// Wrap text at word boundaries to fit within max_width.
fn wrap_text(s: &str, max_width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current_line = String::new();

    for word in s.split_whitespace() {
        if current_line.is_empty() {
            current_line = word.to_string();
        } else if current_line.len() + 1 + word.len() <= max_width {
            current_line.push(' ');
            current_line.push_str(word);
        } else {
            lines.push(current_line);
            current_line = word.to_string();
        }
    }

    if !current_line.is_empty() {
        lines.push(current_line);
    }

    if lines.is_empty() {
        lines.push(s.to_string());
    }

    lines
}
