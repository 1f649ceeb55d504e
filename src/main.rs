//! CLI entry point for `msghtml`.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use msghtml::config::Config;
use msghtml::export;
use msghtml::parser::open_msg;
use msghtml::render::{self, SignatureSniffer};

#[derive(Parser)]
#[command(
    name = "msghtml",
    version,
    about = "Render Outlook .msg bodies as self-contained HTML"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the message body as HTML with inline images embedded
    BodyHtml {
        /// MSG file to read
        msg: PathBuf,
        /// Write the HTML here instead of stdout
        output: Option<PathBuf>,
    },
    /// Print the message as JSON
    Json {
        msg: PathBuf,
        /// Print the whole message model instead of the summary
        #[arg(short, long)]
        full_json: bool,
    },
    /// Print the decompressed RTF body
    Rtf {
        msg: PathBuf,
        /// Write the RTF here instead of stdout
        output: Option<PathBuf>,
    },
    /// List attachments, or extract them with --output
    Attachments {
        msg: PathBuf,
        /// Directory to extract attachments into
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Print the listing as JSON
        #[arg(long)]
        json: bool,
    },
    /// Render many MSG files to .html files in a directory
    Convert {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Output directory (defaults to [export] default_output_dir)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = msghtml::config::load_config();

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::BodyHtml { msg, output } => cmd_body_html(&msg, output.as_deref(), &config).await,
        Commands::Json { msg, full_json } => cmd_json(&msg, full_json),
        Commands::Rtf { msg, output } => cmd_rtf(&msg, output.as_deref()),
        Commands::Attachments { msg, output, json } => {
            cmd_attachments(&msg, output.as_deref(), json, &config)
        }
        Commands::Convert { inputs, output } => cmd_convert(&inputs, output, &config).await,
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Initialize the tracing subscriber.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    // Try to set up file logging
    let log_dir = msghtml::config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "msghtml.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "msghtml", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::stdout().write_all(&buf)?;
    Ok(())
}

/// Write `bytes` to `output`, or to stdout followed by a newline.
fn emit(bytes: &[u8], output: Option<&Path>) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, bytes)?;
            tracing::info!(path = %path.display(), size = bytes.len(), "Wrote output");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(bytes)?;
            stdout.write_all(b"\n")?;
        }
    }
    Ok(())
}

/// Render one message body as self-contained HTML.
async fn cmd_body_html(path: &Path, output: Option<&Path>, config: &Config) -> anyhow::Result<()> {
    let message = open_msg(path)?;
    let html = render::render_html(&message, &config.render.to_options()).await?;
    emit(html.as_bytes(), output)
}

/// Print the message summary or full model as JSON.
fn cmd_json(path: &Path, full: bool) -> anyhow::Result<()> {
    let message = open_msg(path)?;
    let value = if full {
        serde_json::to_string_pretty(&export::summary::full_json(&message)?)?
    } else {
        serde_json::to_string(&export::summary::summary_json(&message))?
    };
    println!("{value}");
    Ok(())
}

/// Print the decompressed RTF body.
fn cmd_rtf(path: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    let message = open_msg(path)?;
    let Some(rtf) = msghtml::render::body::decompressed_rtf(&message)? else {
        anyhow::bail!("{} has no RTF body", path.display());
    };
    match output {
        Some(_) => emit(&rtf, output),
        None => emit(String::from_utf8_lossy(&rtf).as_bytes(), None),
    }
}

/// List or extract attachments.
fn cmd_attachments(
    path: &Path,
    output: Option<&Path>,
    json: bool,
    config: &Config,
) -> anyhow::Result<()> {
    let message = open_msg(path)?;

    if let Some(dir) = output {
        let paths = export::attachment::export_attachments(&message, dir, config.export.overwrite)?;
        println!("  Extracted {} attachment(s) to {}", paths.len(), dir.display());
        return Ok(());
    }

    let rows = export::attachment::describe_attachments(&message, &SignatureSniffer);
    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("  No attachments.");
        return Ok(());
    }

    use humansize::{format_size, BINARY};
    println!(
        "  {:>3}  {:<32} {:<24} {:<20} {:>10}",
        "#", "Name", "Content-ID", "Type", "Size"
    );
    println!("  {}", "-".repeat(94));
    for row in &rows {
        let kind = row
            .detected_type
            .as_deref()
            .or(row.declared_type.as_deref())
            .unwrap_or("-");
        println!(
            "  {:>3}  {:<32} {:<24} {:<20} {:>10}",
            row.index,
            truncate(&row.name, 32),
            truncate(row.content_id.as_deref().unwrap_or("-"), 24),
            truncate(kind, 20),
            format_size(row.size, BINARY)
        );
    }
    Ok(())
}

/// Render many messages into `.html` files.
async fn cmd_convert(inputs: &[PathBuf], output: Option<PathBuf>, config: &Config) -> anyhow::Result<()> {
    let Some(output) = output.or_else(|| config.export.default_output_dir.clone()) else {
        anyhow::bail!("No output directory: pass --output or set [export] default_output_dir");
    };

    let options = config.render.to_options();
    let start = Instant::now();

    let pb = ProgressBar::new(inputs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} Converting [{bar:40.cyan/blue}] {pos}/{len} {wide_msg}")
            .expect("valid template")
            .progress_chars("#>-"),
    );

    let mut written = 0usize;
    let mut failed = 0usize;
    for input in inputs {
        pb.set_message(input.display().to_string());
        match convert_one(input, &output, &options, config.export.overwrite).await {
            Ok(path) => {
                tracing::debug!(input = %input.display(), output = %path.display(), "Converted");
                written += 1;
            }
            Err(e) => {
                tracing::warn!(input = %input.display(), error = %e, "Failed to convert");
                failed += 1;
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    println!(
        "  Converted {} of {} file(s) to {} in {:.2}s",
        written,
        inputs.len(),
        output.display(),
        start.elapsed().as_secs_f64()
    );
    if failed > 0 {
        println!("  {failed} file(s) failed, see the log for details");
    }
    Ok(())
}

async fn convert_one(
    input: &Path,
    output: &Path,
    options: &render::RenderOptions,
    overwrite: bool,
) -> anyhow::Result<PathBuf> {
    let message = open_msg(input)?;
    let html = render::render_html(&message, options).await?;
    export::html::export_html(&message, &html, Some(input), output, overwrite)
}

/// Truncate to `max` characters, marking the cut with an ellipsis.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{kept}…")
    }
}
