//! CLI binary for edgequake-pdfclassify.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ClassifierConfig`, runs one pipeline per input file, and reports
//! progress as terminal bars or raw server-sent events.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdfclassify::{
    ClassificationOutcome, ClassificationRequest, Classifier, ClassifierConfig, ClassifyError,
    JsonLinesRecorder, KeywordSet, PageSelection, RetryPolicy, StatisticsLog, StatusStore,
};
use futures::StreamExt;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

const AFTER_HELP: &str = r#"EXAMPLES:
  # Classify one thesis into three categories
  pdfclassify -c MobileApp -c WebApp -c HardwareIOT thesis.pdf

  # Several files at once, comma-separated categories
  pdfclassify -c MobileApp,WebApp,HardwareIOT a.pdf b.pdf c.pdf

  # Stream status as server-sent events instead of progress bars
  pdfclassify --events -c WebApp,MobileApp thesis.pdf

  # Keep a record of every decision and per-document keyword statistics
  pdfclassify --records records.jsonl --stats statistics.csv -c A,B doc.pdf

  # English-only documents, first three pages
  pdfclassify --lang eng --pages 1-3 -c Finance,Legal report.pdf

OUTPUT:
  One line per document on stdout: <file>  <category>  <confidence>
  Classified files are copied to <storage>/<category>/<file>.
  The exit code is non-zero if any document failed.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
  TESSDATA_PREFIX         Tesseract language data directory

SETUP:
  1. Install Tesseract with the eng and tha language packs.
  2. Install pdfium or point PDFIUM_LIB_PATH at it.
  3. Set an API key:  export OPENAI_API_KEY=sk-...
"#;

/// Classify PDF documents into folders using OCR and an LLM.
#[derive(Parser, Debug)]
#[command(
    name = "pdfclassify",
    version,
    about = "Classify PDF documents into categories using OCR and an LLM",
    long_about = "OCR the first pages of each PDF (Thai and English), keep the pages that look \
like an abstract or overview, and ask an LLM which of the given categories fits best. \
Supports OpenAI, Anthropic, Google Gemini, Azure OpenAI, and any OpenAI-compatible endpoint.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF files to classify.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Target category (repeatable or comma-separated). Order defines the confidence vector.
    #[arg(short, long = "category", env = "PDFCLASSIFY_CATEGORIES", value_delimiter = ',', required = true)]
    categories: Vec<String>,

    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Rendering DPI (72–600).
    #[arg(long, env = "PDFCLASSIFY_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Page selection: all, 5, 1-7, or 1,3,5.
    #[arg(long, env = "PDFCLASSIFY_PAGES", default_value = "1-7")]
    pages: String,

    /// Tesseract languages (comma-separated).
    #[arg(long, env = "PDFCLASSIFY_LANG", value_delimiter = ',', default_value = "eng,tha")]
    lang: Vec<String>,

    /// Tesseract page segmentation mode (0–13).
    #[arg(long, env = "PDFCLASSIFY_PSM", default_value_t = 4)]
    psm: u8,

    /// Tesseract language data directory.
    #[arg(long, env = "PDFCLASSIFY_TESSDATA")]
    tessdata: Option<PathBuf>,

    /// pdfium shared library (file or directory).
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Extra keyword marking a page as relevant (repeatable).
    #[arg(long = "keyword", env = "PDFCLASSIFY_KEYWORDS", value_delimiter = ',')]
    keywords: Vec<String>,

    /// Oracle attempts before giving up on a malformed reply.
    #[arg(long, env = "PDFCLASSIFY_MAX_ATTEMPTS", default_value_t = 5)]
    max_attempts: u32,

    /// Delay between attempts in milliseconds.
    #[arg(long, env = "PDFCLASSIFY_RETRY_DELAY_MS", default_value_t = 1000)]
    retry_delay_ms: u64,

    /// Double the delay after every failed attempt.
    #[arg(long, env = "PDFCLASSIFY_EXPONENTIAL_BACKOFF")]
    exponential_backoff: bool,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "PDFCLASSIFY_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Max LLM output tokens.
    #[arg(long, env = "PDFCLASSIFY_MAX_TOKENS", default_value_t = 256)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "PDFCLASSIFY_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,

    /// Parent directory for per-task scratch space.
    #[arg(long, env = "PDFCLASSIFY_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Classified documents are copied to <storage>/<category>/.
    #[arg(long, env = "PDFCLASSIFY_STORAGE", default_value = "storage")]
    storage: PathBuf,

    /// Append one JSON line per classified document to this file.
    #[arg(long, env = "PDFCLASSIFY_RECORDS")]
    records: Option<PathBuf>,

    /// Append one CSV statistics row per classified document to this file.
    #[arg(long, env = "PDFCLASSIFY_STATS")]
    stats: Option<PathBuf>,

    /// Print status as server-sent events on stdout instead of progress bars.
    #[arg(long, env = "PDFCLASSIFY_EVENTS")]
    events: bool,

    /// Status poll interval for --events, in milliseconds.
    #[arg(long, env = "PDFCLASSIFY_POLL_MS", default_value_t = 1000)]
    poll_ms: u64,

    /// Output structured JSON (one ClassificationOutcome per document).
    #[arg(long, env = "PDFCLASSIFY_JSON")]
    json: bool,

    /// Disable progress bars.
    #[arg(long, env = "PDFCLASSIFY_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDFCLASSIFY_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDFCLASSIFY_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Progress bars carry the feedback; library INFO logs would tear them.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.events && !cli.json;
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

    // ── Build classifier ─────────────────────────────────────────────────
    let config = build_config(&cli).await?;
    let mut classifier = Classifier::from_config(config)
        .await
        .context("Failed to set up the classification oracle")?;
    if let Some(ref path) = cli.records {
        classifier = classifier.with_recorder(Arc::new(JsonLinesRecorder::new(path)));
    }
    if let Some(ref path) = cli.stats {
        classifier = classifier.with_statistics(StatisticsLog::new(path));
    }

    // ── Start one pipeline per input ─────────────────────────────────────
    let multi = MultiProgress::new();
    let mut tasks = Vec::with_capacity(cli.inputs.len());
    for input in &cli.inputs {
        let bytes = tokio::fs::read(input)
            .await
            .with_context(|| format!("Failed to read {}", input.display()))?;
        let file_name = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| input.display().to_string());
        let task_id = uuid::Uuid::new_v4().to_string();
        let request =
            ClassificationRequest::new(task_id.clone(), file_name.clone(), bytes, cli.categories.clone());

        let pipeline = classifier.spawn(request);
        let watcher = if cli.events {
            Some(tokio::spawn(print_events(classifier.clone(), task_id.clone())))
        } else if show_progress {
            let bar = multi.add(new_bar(&file_name));
            Some(tokio::spawn(drive_bar(Arc::clone(classifier.store()), task_id.clone(), bar)))
        } else {
            None
        };
        tasks.push((file_name, pipeline, watcher));
    }

    // ── Collect ──────────────────────────────────────────────────────────
    let total = tasks.len();
    let mut outcomes = Vec::with_capacity(total);
    let mut failed = 0usize;
    for (file_name, pipeline, watcher) in tasks {
        let result = join(pipeline).await;
        if let Some(w) = watcher {
            let _ = w.await;
        }
        match result {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => {
                failed += 1;
                if !cli.quiet {
                    eprintln!("{} {}  {}", red("✗"), bold(&file_name), red(&e.to_string()));
                }
            }
        }
    }

    // ── Report ───────────────────────────────────────────────────────────
    if cli.json {
        let json = serde_json::to_string_pretty(&outcomes).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.events {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        for o in &outcomes {
            writeln!(
                handle,
                "{}\t{}\t{}",
                o.file_name, o.category, o.classification.confidence
            )
            .context("Failed to write to stdout")?;
        }
    }

    if !cli.quiet {
        let mark = if failed == 0 { green("✔") } else { red("✘") };
        eprintln!(
            "{} {}/{} documents classified  {}",
            mark,
            bold(&(total - failed).to_string()),
            total,
            dim(&format!("→ {}", cli.storage.display())),
        );
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {total} documents failed");
    }
    Ok(())
}

async fn join(
    handle: JoinHandle<Result<ClassificationOutcome, ClassifyError>>,
) -> Result<ClassificationOutcome, ClassifyError> {
    handle
        .await
        .unwrap_or_else(|e| Err(ClassifyError::Internal(format!("pipeline task failed: {e}"))))
}

fn new_bar(file_name: &str) -> ProgressBar {
    let style = ProgressStyle::with_template(
        "{spinner:.cyan} {prefix:.bold}  [{bar:30.green/238}] {pos:>3}%  {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("█▉▊▋▌▍▎▏  ")
    .tick_strings(TICKS);

    let bar = ProgressBar::new(100);
    bar.set_style(style);
    bar.set_prefix(truncate(file_name, 32));
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

/// Mirror a task's status record onto its bar until the task finishes.
async fn drive_bar(store: Arc<StatusStore>, task_id: String, bar: ProgressBar) {
    let Some(mut rx) = store.subscribe(&task_id) else {
        bar.abandon_with_message("unknown task");
        return;
    };
    loop {
        let record = rx.borrow_and_update().clone();
        bar.set_position(record.progress as u64);
        bar.set_message(record.current_step.clone());
        if record.is_terminal() {
            match record.error {
                None => bar.finish_with_message(green(&record.current_step)),
                Some(err) => bar.abandon_with_message(red(&truncate(&err, 60))),
            }
            return;
        }
        if rx.changed().await.is_err() {
            bar.abandon();
            return;
        }
    }
}

/// Write a task's SSE frames to stdout until it finishes.
async fn print_events(classifier: Classifier, task_id: String) {
    let mut frames = classifier.status_events(task_id);
    while let Some(frame) = frames.next().await {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        let _ = handle.write_all(frame.to_sse().as_bytes());
        let _ = handle.flush();
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{head}\u{2026}")
    } else {
        s.to_string()
    }
}

/// Map CLI args to `ClassifierConfig`.
async fn build_config(cli: &Cli) -> Result<ClassifierConfig> {
    let pages = parse_pages(&cli.pages)?;

    let keywords = KeywordSet::default()
        .extend(cli.keywords.iter().cloned())
        .context("Invalid --keyword")?;

    let delay = Duration::from_millis(cli.retry_delay_ms);
    let retry = if cli.exponential_backoff {
        RetryPolicy::exponential(cli.max_attempts, delay)
    } else {
        RetryPolicy::fixed(cli.max_attempts, delay)
    };

    let mut builder = ClassifierConfig::builder()
        .dpi(cli.dpi)
        .pages(pages)
        .ocr_languages(cli.lang.iter().cloned())
        .ocr_page_seg_mode(cli.psm)
        .keywords(keywords)
        .retry(retry)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .storage_root(&cli.storage)
        .status_poll_interval(Duration::from_millis(cli.poll_ms.max(1)));

    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref dir) = cli.tessdata {
        builder = builder.tessdata_path(dir);
    }
    if let Some(ref lib) = cli.pdfium_lib {
        builder = builder.pdfium_lib_path(lib);
    }
    if let Some(ref ws) = cli.workspace {
        builder = builder.workspace_root(ws);
    }

    builder.build().context("Invalid configuration")
}

/// Parse `--pages` string into `PageSelection`.
fn parse_pages(s: &str) -> Result<PageSelection> {
    let s = s.trim().to_lowercase();

    if s == "all" {
        return Ok(PageSelection::All);
    }

    // Range: "1-7"
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
            anyhow::bail!("Invalid page range '{}-{}': start must be <= end", start, end);
        }

        return Ok(PageSelection::Range(start, end));
    }

    // Set: "1,3,5"
    if s.contains(',') {
        let pages: Vec<usize> = s
            .split(',')
            .map(|p| {
                p.trim()
                    .parse::<usize>()
                    .context(format!("Invalid page number: '{}'", p.trim()))
            })
            .collect::<Result<Vec<_>>>()?;

        if let Some(&p) = pages.iter().find(|&&p| p < 1) {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", p);
        }

        return Ok(PageSelection::Set(pages));
    }

    let page: usize = s.parse().context("Invalid page number")?;
    if page < 1 {
        anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", page);
    }

    Ok(PageSelection::Single(page))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_parse() {
        assert_eq!(parse_pages("all").unwrap(), PageSelection::All);
        assert_eq!(parse_pages("1-7").unwrap(), PageSelection::Range(1, 7));
        assert_eq!(parse_pages("3").unwrap(), PageSelection::Single(3));
        assert_eq!(parse_pages("1, 3,5").unwrap(), PageSelection::Set(vec![1, 3, 5]));
        assert!(parse_pages("0-3").is_err());
        assert!(parse_pages("5-2").is_err());
        assert!(parse_pages("x").is_err());
    }

    #[test]
    fn categories_split_on_commas() {
        let cli = Cli::try_parse_from(["pdfclassify", "-c", "A,B", "-c", "C", "doc.pdf"]).unwrap();
        assert_eq!(cli.categories, vec!["A", "B", "C"]);
        assert_eq!(cli.inputs, vec![PathBuf::from("doc.pdf")]);
        assert_eq!(cli.lang, vec!["eng", "tha"]);
    }

    #[test]
    fn truncates_on_char_boundaries() {
        assert_eq!(truncate("บทคัดย่อ", 4), "บทค\u{2026}");
        assert_eq!(truncate("short", 10), "short");
    }
}
