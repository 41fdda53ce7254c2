//! orderdocs - order document store CLI
//!
//! Versioned per-line documents for orders, merged into one PDF on demand.
//!
//! Usage:
//!   orderdocs upload <order> <line> <file>   Store a file as the next version of a line
//!   orderdocs order <order>                 Show which lines have a PDF
//!   orderdocs merge <order> \[--lines 3,1\]   Merge available (or the listed) lines
//!   orderdocs preview <order>               Show what a merge would contain
//!   orderdocs merged \[order\]                Show merged history

use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use orderdocs_core::{
    default_config_path, load_config, ArtifactKind, ArtifactRecord, ArtifactStatus,
    MergedArtifactRecord, OrderDocs,
};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Parser)]
#[command(name = "orderdocs")]
#[command(about = "Versioned order documents and PDF merging")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to config.toml in the platform config directory)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Database file (overrides ORDERDOCS_DATABASE and the config file)
    #[arg(long, global = true, value_name = "PATH")]
    database: Option<PathBuf>,

    /// Blob directory (overrides ORDERDOCS_BLOB_ROOT and the config file)
    #[arg(long, global = true, value_name = "DIR")]
    blob_root: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a file as the next version of an order line
    Upload {
        order: i64,
        line: i64,
        /// File to upload (SVG or PDF)
        file: PathBuf,
        /// Name to record instead of the file's own name
        #[arg(long)]
        name: Option<String>,
        /// Allow a new version when the line already has one
        #[arg(long, conflicts_with = "no_duplicate")]
        allow_duplicate: bool,
        /// Refuse the upload when the line already has a version
        #[arg(long)]
        no_duplicate: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one version of a line (latest by default)
    Show {
        order: i64,
        line: i64,
        #[arg(long, short = 's')]
        sequence: Option<i64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List every version of a line
    Versions {
        order: i64,
        line: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show available and missing lines of an order
    Order {
        order: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List stored versions across all orders, newest first
    Files {
        #[arg(long, default_value = "1")]
        page: i64,
        #[arg(long, default_value = "50")]
        per_page: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Merge an order's PDFs into one document
    Merge {
        order: i64,
        /// Lines to merge, in this order (default: every available line)
        #[arg(long, value_delimiter = ',')]
        lines: Vec<i64>,
        /// Also write the merged PDF to this path
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show what a merge would contain without writing anything
    Preview {
        order: i64,
        #[arg(long, value_delimiter = ',')]
        lines: Vec<i64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show merged history for an order, or recent merges across orders
    Merged {
        order: Option<i64>,
        #[arg(long, default_value = "1")]
        page: i64,
        #[arg(long, default_value = "50")]
        per_page: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write a stored version's bytes to a file
    Export {
        order: i64,
        line: i64,
        #[arg(long, short = 's')]
        sequence: Option<i64>,
        #[arg(long, value_enum, default_value = "derived")]
        kind: ExportKind,
        #[arg(long, short = 'o')]
        output: PathBuf,
    },
    /// Write a merged PDF to a file (latest by default)
    #[command(name = "export-merged")]
    ExportMerged {
        order: i64,
        #[arg(long, short = 's')]
        sequence: Option<i64>,
        #[arg(long, short = 'o')]
        output: PathBuf,
    },
    /// Show store statistics
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportKind {
    Source,
    Derived,
}

impl From<ExportKind> for ArtifactKind {
    fn from(kind: ExportKind) -> Self {
        match kind {
            ExportKind::Source => ArtifactKind::Source,
            ExportKind::Derived => ArtifactKind::Derived,
        }
    }
}

fn main() -> Result<()> {
    // Initialize tracing for debug output
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    run(Cli::parse())
}

fn run(cli: Cli) -> Result<()> {
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "orderdocs", &mut std::io::stdout());
        return Ok(());
    }

    let docs = open_service(&cli)?;
    match cli.command {
        Commands::Upload {
            order,
            line,
            file,
            name,
            allow_duplicate,
            no_duplicate,
            json,
        } => {
            let duplicate = match (allow_duplicate, no_duplicate) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            };
            cmd_upload(&docs, order, line, &file, name.as_deref(), duplicate, json)
        }
        Commands::Show {
            order,
            line,
            sequence,
            json,
        } => cmd_show(&docs, order, line, sequence, json),
        Commands::Versions { order, line, json } => cmd_versions(&docs, order, line, json),
        Commands::Order { order, json } => cmd_order(&docs, order, json),
        Commands::Files {
            page,
            per_page,
            json,
        } => cmd_files(&docs, page, per_page, json),
        Commands::Merge {
            order,
            lines,
            output,
            json,
        } => cmd_merge(&docs, order, &lines, output.as_deref(), json),
        Commands::Preview { order, lines, json } => cmd_preview(&docs, order, &lines, json),
        Commands::Merged {
            order,
            page,
            per_page,
            json,
        } => cmd_merged(&docs, order, page, per_page, json),
        Commands::Export {
            order,
            line,
            sequence,
            kind,
            output,
        } => cmd_export(&docs, order, line, sequence, kind.into(), &output),
        Commands::ExportMerged {
            order,
            sequence,
            output,
        } => cmd_export_merged(&docs, order, sequence, &output),
        Commands::Stats { json } => cmd_stats(&docs, json),
        Commands::Completions { .. } => Ok(()),
    }
}

fn open_service(cli: &Cli) -> Result<OrderDocs> {
    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => default_config_path()?,
    };
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    let paths = config.storage_paths(cli.database.clone(), cli.blob_root.clone())?;
    tracing::debug!(
        "Using database {} and blobs in {}",
        paths.database.display(),
        paths.blob_root.display()
    );
    OrderDocs::open(&config, &paths).with_context(|| {
        format!(
            "Failed to open store at {}",
            paths.database.display()
        )
    })
}

fn lines_arg(lines: &[i64]) -> Option<&[i64]> {
    (!lines.is_empty()).then_some(lines)
}

fn cmd_upload(
    docs: &OrderDocs,
    order: i64,
    line: i64,
    file: &Path,
    name: Option<&str>,
    allow_duplicate: Option<bool>,
    json: bool,
) -> Result<()> {
    let bytes =
        std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let file_name = match name {
        Some(name) => name.to_string(),
        None => file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .context("Upload path has no file name")?,
    };

    let outcome = docs.upload(order, line, &file_name, &bytes, allow_duplicate)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    let record = &outcome.record;
    if outcome.pdf_available {
        println!(
            "{} order {} line {} version {}",
            "Stored".green().bold(),
            record.order_number,
            record.line_number,
            record.sequence_number.to_string().cyan()
        );
    } else {
        println!(
            "{} order {} line {} version {}, but conversion failed",
            "Stored".yellow().bold(),
            record.order_number,
            record.line_number,
            record.sequence_number.to_string().cyan()
        );
        if let Some(error) = &outcome.conversion_error {
            println!("  {}", error.dimmed());
        }
    }
    if outcome.is_duplicate {
        println!(
            "  {}",
            format!("Replaces version {} as latest", record.sequence_number - 1).dimmed()
        );
    }
    Ok(())
}

fn cmd_show(
    docs: &OrderDocs,
    order: i64,
    line: i64,
    sequence: Option<i64>,
    json: bool,
) -> Result<()> {
    let record = docs.get_artifact(order, line, sequence)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }
    print_record(&record);
    Ok(())
}

fn cmd_versions(docs: &OrderDocs, order: i64, line: i64, json: bool) -> Result<()> {
    let versions = docs.get_all_versions(order, line)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&versions)?);
        return Ok(());
    }
    if versions.is_empty() {
        println!("{}", format!("No versions for order {order}, line {line}").yellow());
        return Ok(());
    }
    for record in &versions {
        print_record_line(record);
    }
    Ok(())
}

fn cmd_order(docs: &OrderDocs, order: i64, json: bool) -> Result<()> {
    let summary = docs.summarize(order)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("{}", format!("Order {}", summary.order_number).cyan().bold());
    if summary.is_empty() {
        println!("  {}", "No files uploaded".yellow());
        return Ok(());
    }
    println!(
        "  {} of {} line(s) have a PDF",
        summary.available.len().to_string().green(),
        summary.total_lines
    );
    for info in &summary.available {
        println!(
            "  {} line {:>3}  v{}  {}",
            "✓".green(),
            info.line_number,
            info.sequence_number,
            info.original_name
        );
    }
    for info in &summary.missing {
        println!(
            "  {} line {:>3}  v{}  {}  {}",
            "✗".red(),
            info.line_number,
            info.sequence_number,
            info.original_name,
            colored_status(info.status)
        );
    }
    Ok(())
}

fn cmd_files(docs: &OrderDocs, page: i64, per_page: i64, json: bool) -> Result<()> {
    let records = docs.list_artifacts(page, per_page)?;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "page": page,
                "per_page": per_page,
                "files": records,
            }))?
        );
        return Ok(());
    }
    if records.is_empty() {
        println!("{}", "No files".yellow());
        return Ok(());
    }
    for record in &records {
        print_record_line(record);
    }
    Ok(())
}

fn cmd_merge(
    docs: &OrderDocs,
    order: i64,
    lines: &[i64],
    output: Option<&Path>,
    json: bool,
) -> Result<()> {
    let spinner = if json {
        None
    } else {
        let sp = ProgressBar::new_spinner();
        sp.set_style(
            ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );
        sp.set_message(format!("Merging order {order}..."));
        sp.enable_steady_tick(std::time::Duration::from_millis(80));
        Some(sp)
    };

    let result = docs.request_merge(order, lines_arg(lines));
    if let Some(sp) = spinner {
        sp.finish_and_clear();
    }
    let record = result?;

    if let Some(path) = output {
        let (_, bytes) = docs.read_merged(order, Some(i64::from(record.sequence_number)))?;
        std::fs::write(path, bytes)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }
    print_merged(&record);
    if let Some(path) = output {
        println!("  Written:  {}", path.display().to_string().dimmed());
    }
    Ok(())
}

fn cmd_preview(docs: &OrderDocs, order: i64, lines: &[i64], json: bool) -> Result<()> {
    let preview = docs.request_preview(order, lines_arg(lines))?;
    if json {
        println!("{}", serde_json::to_string_pretty(&preview)?);
        return Ok(());
    }

    println!(
        "{}",
        format!("Merge preview for order {}", preview.order_number)
            .cyan()
            .bold()
    );
    for entry in &preview.per_line {
        println!(
            "  line {:>3}  v{}  {:>3} page(s)  {}",
            entry.line_number, entry.sequence_number, entry.page_count, entry.original_name
        );
    }
    println!(
        "  {} file(s), {} page(s)",
        preview.plan_size.to_string().green(),
        preview.total_pages.to_string().green()
    );
    if !preview.missing.is_empty() {
        let missing: Vec<String> = preview
            .missing
            .iter()
            .map(|info| info.line_number.to_string())
            .collect();
        println!(
            "  {}",
            format!("Missing: line(s) {}", missing.join(", ")).yellow()
        );
    }
    Ok(())
}

fn cmd_merged(
    docs: &OrderDocs,
    order: Option<i64>,
    page: i64,
    per_page: i64,
    json: bool,
) -> Result<()> {
    let records = match order {
        Some(order) => docs.get_all_merged(order)?,
        None => docs.list_merged(page, per_page)?,
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }
    if records.is_empty() {
        println!("{}", "No merged PDFs".yellow());
        return Ok(());
    }
    for record in &records {
        print_merged(record);
    }
    Ok(())
}

fn cmd_export(
    docs: &OrderDocs,
    order: i64,
    line: i64,
    sequence: Option<i64>,
    kind: ArtifactKind,
    output: &Path,
) -> Result<()> {
    let (record, bytes) = docs.read_artifact(order, line, sequence, kind)?;
    write_export(output, &bytes)?;
    println!(
        "{} order {} line {} version {} to {}",
        "Exported".green().bold(),
        record.order_number,
        record.line_number,
        record.sequence_number,
        output.display()
    );
    Ok(())
}

fn cmd_export_merged(
    docs: &OrderDocs,
    order: i64,
    sequence: Option<i64>,
    output: &Path,
) -> Result<()> {
    let (record, bytes) = docs.read_merged(order, sequence)?;
    write_export(output, &bytes)?;
    println!(
        "{} merged order {} version {} to {}",
        "Exported".green().bold(),
        record.order_number,
        record.sequence_number,
        output.display()
    );
    Ok(())
}

fn write_export(output: &Path, bytes: &[u8]) -> Result<()> {
    if output.is_dir() {
        bail!("{} is a directory", output.display());
    }
    std::fs::write(output, bytes).with_context(|| format!("Failed to write {}", output.display()))
}

fn cmd_stats(docs: &OrderDocs, json: bool) -> Result<()> {
    let stats = docs.stats()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("{}", "Store".white().bold());
    println!("  Versions:  {}", stats.total.to_string().cyan());
    println!("  Converted: {}", stats.converted.to_string().green());
    println!("  Pending:   {}", stats.pending.to_string().yellow());
    println!("  Errors:    {}", stats.error.to_string().red());
    println!("  Size:      {}", format_bytes(stats.total_size).cyan());
    Ok(())
}

fn colored_status(status: ArtifactStatus) -> colored::ColoredString {
    match status {
        ArtifactStatus::Converted => status.as_str().green(),
        ArtifactStatus::Uploaded => status.as_str().yellow(),
        ArtifactStatus::Error => status.as_str().red(),
    }
}

fn print_record(record: &ArtifactRecord) {
    println!(
        "{}",
        format!(
            "Order {} line {} version {}",
            record.order_number, record.line_number, record.sequence_number
        )
        .cyan()
        .bold()
    );
    println!("  Name:     {}", record.original_name);
    println!("  Status:   {}", colored_status(record.status));
    println!("  Size:     {}", format_bytes(record.size_bytes));
    println!("  Uploaded: {}", format_age(record.created_at));
    println!("  Source:   {}", record.source_path.dimmed());
    if let Some(derived) = &record.derived_path {
        println!("  PDF:      {}", derived.dimmed());
    }
}

fn print_record_line(record: &ArtifactRecord) {
    println!(
        "{:>6} line {:>3} v{:<3} {:<9} {:>9}  {}  {}",
        record.order_number,
        record.line_number,
        record.sequence_number,
        colored_status(record.status),
        format_bytes(record.size_bytes),
        format_age(record.created_at).dimmed(),
        record.original_name
    );
}

fn print_merged(record: &MergedArtifactRecord) {
    let lines: Vec<String> = record
        .included_lines
        .iter()
        .map(|line| line.to_string())
        .collect();
    println!(
        "{}",
        format!(
            "Merged order {} version {}",
            record.order_number, record.sequence_number
        )
        .cyan()
        .bold()
    );
    println!("  Lines:    {}", lines.join(", "));
    println!(
        "  Contents: {} file(s), {} page(s), {}",
        record.file_count,
        record.page_count,
        format_bytes(record.size_bytes)
    );
    println!("  Created:  {}", format_age(record.created_at));
    println!("  Path:     {}", record.output_path.dimmed());
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

fn format_duration(secs: u64) -> String {
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs < 86400 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else {
        format!("{}d {}h", secs / 86400, (secs % 86400) / 3600)
    }
}

/// Unix timestamp as "<duration> ago"
fn format_age(timestamp: i64) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(timestamp);
    format!("{} ago", format_duration(now.saturating_sub(timestamp).max(0) as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use orderdocs_core::{Config, StoragePaths};

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(59), "59s");
        assert_eq!(format_duration(90), "1m 30s");
        assert_eq!(format_duration(7200), "2h 0m");
        assert_eq!(format_duration(90000), "1d 1h");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(16 * 1024 * 1024), "16.0 MB");
        assert_eq!(format_bytes(1610612736), "1.5 GB");
    }

    #[test]
    fn test_format_age_never_negative() {
        let future = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64
            + 3600;
        assert_eq!(format_age(future), "0s ago");
    }

    #[test]
    fn test_parse_merge_lines() {
        let cli = Cli::try_parse_from(["orderdocs", "merge", "123456", "--lines", "3,1,3"]).unwrap();
        match cli.command {
            Commands::Merge { order, lines, .. } => {
                assert_eq!(order, 123456);
                assert_eq!(lines, vec![3, 1, 3]);
            }
            _ => panic!("expected merge command"),
        }
    }

    #[test]
    fn test_duplicate_flags_conflict() {
        let result = Cli::try_parse_from([
            "orderdocs",
            "upload",
            "123456",
            "1",
            "a.svg",
            "--allow-duplicate",
            "--no-duplicate",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["orderdocs", "stats", "--database", "/tmp/x.db"]).unwrap();
        assert_eq!(cli.database, Some(PathBuf::from("/tmp/x.db")));
    }

    #[test]
    fn test_upload_then_stats_through_cli() {
        let dir = tempfile::tempdir().unwrap();
        let svg = dir.path().join("drawing.svg");
        std::fs::write(&svg, "<svg xmlns=\"http://www.w3.org/2000/svg\"/>").unwrap();
        let database = dir.path().join("orderdocs.db");
        let blobs = dir.path().join("blobs");
        let config = dir.path().join("absent.toml");

        let args = |extra: &[&str]| {
            let mut argv = vec![
                "orderdocs".to_string(),
                "--config".to_string(),
                config.display().to_string(),
                "--database".to_string(),
                database.display().to_string(),
                "--blob-root".to_string(),
                blobs.display().to_string(),
            ];
            argv.extend(extra.iter().map(|s| s.to_string()));
            Cli::try_parse_from(argv).unwrap()
        };

        let svg_path = svg.display().to_string();
        run(args(&["upload", "123456", "1", &svg_path, "--json"])).unwrap();
        run(args(&["upload", "123456", "1", &svg_path])).unwrap();
        assert!(run(args(&["upload", "123456", "1", &svg_path, "--no-duplicate"])).is_err());
        assert!(run(args(&["upload", "12345", "1", &svg_path])).is_err());
        run(args(&["stats"])).unwrap();

        let docs = OrderDocs::open(
            &Config::default(),
            &StoragePaths {
                database: database.clone(),
                blob_root: blobs.clone(),
            },
        )
        .unwrap();
        let versions = docs.get_all_versions(123456, 1).unwrap();
        assert_eq!(versions.len(), 2);
        // No converter is configured, so SVG uploads are kept with status error
        assert!(versions.iter().all(|r| r.status == ArtifactStatus::Error));
        assert!(run(args(&["merge", "123456"])).is_err());
    }
}
