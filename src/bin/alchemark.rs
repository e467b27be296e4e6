//! CLI binary for alchemark.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and prints results.

use alchemark::pipeline::input::load_records;
use alchemark::{
    convert, format_pages, inspect, ConversionConfig, ConversionOutput,
    ConversionProgressCallback, PageSelection, PageSeparator, ProgressCallback,
};
use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live progress bar plus one log line per
/// page. Pages may complete out of order.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// The bar starts as a spinner; `on_conversion_start` sets its length.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading pages…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Formatting");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, page: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&page))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Formatting {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, page: usize, _total: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(page, Instant::now());
        }
        self.bar.set_message(format!("page {page}"));
    }

    fn on_page_complete(&self, page: usize, total: usize, text_len: usize) {
        let secs = self.elapsed_secs(page);
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            page,
            total,
            dim(&format!("{text_len:>5} chars")),
            dim(&format!("{secs:.2}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs(page);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(std::iter::once('…')).collect()
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page,
            total,
            red(&msg),
            dim(&format!("{secs:.2}s")),
        ));
        self.bar.inc(1);
    }

    fn on_conversion_complete(&self, total_pages: usize, success_count: usize) {
        let failed = self.errors.load(Ordering::SeqCst);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} pages formatted successfully",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} pages formatted  ({} failed)",
                if success_count == 0 { red("✘") } else { cyan("⚠") },
                bold(&success_count.to_string()),
                total_pages,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Per-page JSON records on stdout
  alchemark document.pdf

  # Assembled Markdown document, pages separated by horizontal rules
  alchemark document.pdf --format markdown --separator hr -o document.md

  # Include images as [IMAGE](hash) references, pages 1-5 only
  alchemark --process-images --pages 1-5 paper.pdf -o paper.json

  # Embed images as base64 data URIs instead
  alchemark --process-images --keep-images-inline slides.pdf

  # Re-format page records saved earlier (no pdfium needed)
  alchemark --records pages.json --format markdown

  # Inspect PDF metadata
  alchemark --inspect document.pdf

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH         Path to a libpdfium shared library
  RUST_LOG                Override log filtering (e.g. alchemark=debug)
  ALCHEMARK_*             Every flag also reads ALCHEMARK_<FLAG>

SETUP:
  alchemark binds pdfium at runtime. Point PDFIUM_LIB_PATH at libpdfium,
  place the library next to the alchemark executable, or install it where
  the system loader finds it. --records input needs no pdfium at all.
"#;

/// Convert PDF pages into structured Markdown records.
#[derive(Parser, Debug)]
#[command(
    name = "alchemark",
    version,
    about = "Convert PDF pages into structured Markdown records for LLM pipelines",
    long_about = "Convert each page of a PDF into a clean Markdown string together with an \
inventory of its tables, images, titles, lists and links, a token count and the detected \
language. Output is one JSON record per page, or the assembled Markdown document.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file, or a JSON array of page records with --records.
    input: PathBuf,

    /// Write output to this file instead of stdout.
    #[arg(short, long, env = "ALCHEMARK_OUTPUT")]
    output: Option<PathBuf>,

    /// Treat INPUT as a JSON array of page records instead of a PDF.
    #[arg(long, env = "ALCHEMARK_RECORDS")]
    records: bool,

    /// Include image primitives in the inventory and the Markdown.
    #[arg(long, env = "ALCHEMARK_PROCESS_IMAGES")]
    process_images: bool,

    /// Embed images as base64 data URIs instead of [IMAGE](hash) references.
    #[arg(long, env = "ALCHEMARK_KEEP_IMAGES_INLINE")]
    keep_images_inline: bool,

    /// Maximum number of pages transformed at once.
    #[arg(short, long, env = "ALCHEMARK_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Page selection: all, 5, 3-15, or 1,3,5,7.
    #[arg(long, env = "ALCHEMARK_PAGES", default_value = "all")]
    pages: String,

    /// Output format.
    #[arg(long, env = "ALCHEMARK_FORMAT", value_enum, default_value = "json")]
    format: OutputFormat,

    /// Page separator for markdown output: none, hr, comment, or custom string.
    #[arg(long, env = "ALCHEMARK_SEPARATOR", default_value = "none")]
    separator: String,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "ALCHEMARK_PASSWORD")]
    password: Option<String>,

    /// Minimum non-whitespace characters before language detection runs.
    #[arg(long, env = "ALCHEMARK_LANGUAGE_MIN_CHARS", default_value_t = 1)]
    language_min_chars: usize,

    /// Print PDF metadata only, no conversion.
    #[arg(long)]
    inspect: bool,

    /// Disable progress bar.
    #[arg(long, env = "ALCHEMARK_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "ALCHEMARK_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "ALCHEMARK_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Pretty JSON array of per-page records.
    Json,
    /// Page texts assembled into one Markdown document.
    Markdown,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.inspect;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Inspect mode ─────────────────────────────────────────────────────
    if cli.inspect {
        let meta = inspect(&cli.input, cli.password.as_deref())
            .await
            .context("Failed to inspect PDF")?;

        if cli.format == OutputFormat::Json {
            println!(
                "{}",
                serde_json::to_string_pretty(&meta).context("Failed to serialize metadata")?
            );
        } else {
            println!("File:         {}", cli.input.display());
            if let Some(ref t) = meta.title {
                println!("Title:        {}", t);
            }
            if let Some(ref a) = meta.author {
                println!("Author:       {}", a);
            }
            if let Some(ref s) = meta.subject {
                println!("Subject:      {}", s);
            }
            println!("Pages:        {}", meta.page_count);
            println!("PDF Version:  {}", meta.pdf_version);
            if let Some(ref p) = meta.producer {
                println!("Producer:     {}", p);
            }
            if let Some(ref c) = meta.creator {
                println!("Creator:      {}", c);
            }
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Run conversion ───────────────────────────────────────────────────
    let output = if cli.records {
        let records = load_records(&cli.input)
            .await
            .context("Failed to load page records")?;
        format_pages(records, &config)
            .await
            .context("Formatting failed")?
    } else {
        convert(&cli.input, &config)
            .await
            .context("Conversion failed")?
    };

    let body = render_output(&output, cli.format, &config.page_separator)?;
    match cli.output {
        Some(ref path) => {
            write_atomic(path, &body)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            if !cli.quiet {
                eprintln!("   →  {}", bold(&path.display().to_string()));
            }
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(body.as_bytes())
                .context("Failed to write to stdout")?;
            if !body.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
        }
    }

    if !cli.quiet {
        let stats = &output.stats;
        let selected = stats.processed_pages + stats.failed_pages + stats.skipped_pages;
        if !show_progress {
            eprintln!(
                "Formatted {}/{} pages in {}ms",
                stats.processed_pages, selected, stats.total_duration_ms
            );
            if stats.failed_pages > 0 {
                eprintln!("  {} pages failed", stats.failed_pages);
            }
        }
        eprintln!(
            "   {} tokens  —  {}ms total",
            dim(&stats.total_tokens.to_string()),
            stats.total_duration_ms,
        );
    }

    Ok(())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .process_images(cli.process_images)
        .keep_images_inline(cli.keep_images_inline)
        .concurrency(cli.concurrency)
        .language_min_chars(cli.language_min_chars)
        .pages(parse_pages(&cli.pages)?)
        .page_separator(parse_separator(&cli.separator));

    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn render_output(
    output: &ConversionOutput,
    format: OutputFormat,
    separator: &PageSeparator,
) -> Result<String> {
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(&output.pages).context("Failed to serialise output")
        }
        OutputFormat::Markdown => Ok(output.markdown(separator)),
    }
}

/// Write via a sibling temp file and rename, so readers never see a partial file.
fn write_atomic(path: &Path, body: &str) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, body)?;
    std::fs::rename(&tmp_path, path)
}

/// Parse `--pages` string into `PageSelection`.
fn parse_pages(s: &str) -> Result<PageSelection> {
    let s = s.trim().to_lowercase();

    if s == "all" {
        return Ok(PageSelection::All);
    }

    // Range: "3-15"
    if let Some((start, end)) = s.split_once('-') {
        let start: usize = start
            .trim()
            .parse()
            .context("Invalid start page in range")?;
        let end: usize = end.trim().parse().context("Invalid end page in range")?;

        if start < 1 {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", start);
        }
        if start > end {
            anyhow::bail!(
                "Invalid page range '{}-{}': start must be <= end",
                start,
                end
            );
        }
        return Ok(PageSelection::Range(start, end));
    }

    // Set: "1,3,5,7"
    if s.contains(',') {
        let pages: Vec<usize> = s
            .split(',')
            .map(|p| {
                p.trim()
                    .parse::<usize>()
                    .with_context(|| format!("Invalid page number: '{}'", p.trim()))
            })
            .collect::<Result<Vec<_>>>()?;

        if pages.contains(&0) {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got 0)");
        }
        return Ok(PageSelection::Set(pages));
    }

    // Single page: "5"
    let page: usize = s.parse().context("Invalid page number")?;
    if page < 1 {
        anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", page);
    }
    Ok(PageSelection::Single(page))
}

/// Parse `--separator` string into `PageSeparator`.
fn parse_separator(s: &str) -> PageSeparator {
    match s.to_lowercase().as_str() {
        "none" => PageSeparator::None,
        "hr" | "---" => PageSeparator::HorizontalRule,
        "comment" => PageSeparator::Comment,
        _ => PageSeparator::Custom(s.to_string()),
    }
}
