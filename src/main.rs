use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use console::Emoji;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tracing::info;

use podmirror::{
    CancellationController, DEFAULT_CONFIG_FILE, NoopReporter, PartialSettings, PoolOptions,
    ProgressEvent, ProgressReporter, ReqwestClient, Settings, SharedProgressReporter,
    build_work_units, dedup_urls, destination_exists, fetch_podcasts, flatten_and_skip_existing,
    logging, run,
};

// Emoji with fallback for terminals without Unicode support
static MICROPHONE: Emoji<'_, '_> = Emoji("🎙️  ", "");
static SEARCH: Emoji<'_, '_> = Emoji("🔍 ", "[~] ");
static HEADPHONES: Emoji<'_, '_> = Emoji("🎧 ", "[i] ");
static DOWNLOAD: Emoji<'_, '_> = Emoji("📥 ", "[v] ");
static SUCCESS: Emoji<'_, '_> = Emoji("✅ ", "[+] ");
static FAILURE: Emoji<'_, '_> = Emoji("❌ ", "[!] ");
static STOP: Emoji<'_, '_> = Emoji("🛑 ", "[-] ");
static PARTY: Emoji<'_, '_> = Emoji("🎉 ", "[*] ");
static FOLDER: Emoji<'_, '_> = Emoji("📁 ", "");
static CROSS: Emoji<'_, '_> = Emoji("✗ ", "x ");

/// Mirror podcast feeds to disk
#[derive(Parser, Debug)]
#[command(name = "podmirror")]
#[command(about = "Mirror podcast feeds to disk: feed documents, covers, show notes and audio")]
#[command(version)]
#[command(after_help = "Downloads are written to <file>.partial and renamed once complete. \
An interrupted or failed download leaves its .partial file behind; podmirror never removes it. \
The next run downloads that file again from the start, and stray .partial files can be deleted safely.")]
struct Args {
    /// URL of a single RSS feed
    #[arg(short = 'r', long)]
    rss: Option<String>,

    /// File with one feed URL per line
    #[arg(short = 'l', long)]
    list: Option<PathBuf>,

    /// OPML subscription export, as a local path or URL
    #[arg(short = 'f', long)]
    opml: Option<String>,

    /// Output directory [default: podcast]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// User agent sent with every request [default: desktop browser]
    #[arg(short, long)]
    ua: Option<String>,

    /// Number of concurrent downloads [default: 3]
    #[arg(short, long)]
    thread: Option<usize>,

    /// TOML config file (./.podmirror.toml is used when no feed source is given)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for daily rotated log files
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Quiet mode - suppress progress output
    #[arg(short, long)]
    quiet: bool,

    /// More console logging (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn partial_settings(&self) -> PartialSettings {
        PartialSettings {
            rss: self.rss.clone(),
            list: self.list.clone(),
            opml: self.opml.clone(),
            output: self.output.clone(),
            ua: self.ua.clone(),
            thread: self.thread,
        }
    }
}

/// Progress reporter using indicatif for terminal output
struct IndicatifReporter {
    multi: MultiProgress,
    bars: Mutex<HashMap<usize, ProgressBar>>,
    main_bar: ProgressBar,
}

impl IndicatifReporter {
    fn new() -> Self {
        let multi = MultiProgress::new();

        let main_style = ProgressStyle::default_bar()
            .template("{spinner:.green} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());

        let main_bar = multi.add(ProgressBar::new_spinner());
        main_bar.set_style(main_style);
        main_bar.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            multi,
            bars: Mutex::new(HashMap::new()),
            main_bar,
        }
    }

    fn get_or_create_bar(&self, worker_id: usize) -> ProgressBar {
        let mut bars = self.bars.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(bar) = bars.get(&worker_id) {
            return bar.clone();
        }

        let style = ProgressStyle::default_bar()
            .template(&format!(
                "  {DOWNLOAD}[{{bar:30.cyan/blue}}] {{bytes}}/{{total_bytes}} {{wide_msg}}"
            ))
            .map(|style| style.progress_chars("█▓░"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());

        let bar = self.multi.add(ProgressBar::new(0));
        bar.set_style(style);
        bars.insert(worker_id, bar.clone());
        bar
    }

    fn finish_bar(&self, worker_id: usize) {
        let mut bars = self.bars.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(bar) = bars.remove(&worker_id) {
            bar.finish_and_clear();
        }
    }

    fn println(&self, line: String) {
        if self.multi.println(&line).is_err() {
            println!("{line}");
        }
    }
}

impl ProgressReporter for IndicatifReporter {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::FetchingFeed { url } => {
                self.main_bar
                    .set_message(format!("{SEARCH}Fetching feed: {}", url.cyan()));
            }

            ProgressEvent::FeedParsed {
                podcast_title,
                total_episodes,
            } => {
                self.println(format!(
                    "{HEADPHONES}{} • {} episodes",
                    podcast_title.bold().green(),
                    total_episodes.to_string().cyan()
                ));
            }

            ProgressEvent::FeedFailed { url, error } => {
                self.println(format!("{FAILURE}{} - {}", url.red(), error.dimmed()));
            }

            ProgressEvent::FeedChecked {
                podcast_title,
                queued,
                skipped,
            } => {
                self.main_bar.set_message(format!(
                    "{SEARCH}{} • {} to download, {} already present",
                    truncate_title(&podcast_title, 40).bold(),
                    queued.to_string().yellow(),
                    skipped.to_string().cyan()
                ));
            }

            ProgressEvent::TaskStarting {
                worker_id,
                job_name,
                job_kind,
                content_length,
            } => {
                let bar = self.get_or_create_bar(worker_id);
                bar.set_length(content_length.unwrap_or(0));
                bar.set_position(0);
                bar.set_message(format!(
                    "[{}] {}",
                    job_kind.to_string().cyan(),
                    truncate_title(&job_name, 40)
                ));
                self.main_bar
                    .set_message(format!("{DOWNLOAD}Downloading..."));
            }

            ProgressEvent::TaskProgress {
                worker_id,
                bytes_written,
                total_bytes,
            } => {
                let bar = self.get_or_create_bar(worker_id);
                if let Some(total) = total_bytes {
                    bar.set_length(total);
                }
                bar.set_position(bytes_written);
            }

            ProgressEvent::TaskCompleted {
                worker_id,
                job_name,
                bytes_written,
            } => {
                let bar = self.get_or_create_bar(worker_id);
                bar.set_position(bytes_written);
                bar.set_message(format!(
                    "{SUCCESS}{}",
                    truncate_title(&job_name, 40).green()
                ));
                self.finish_bar(worker_id);
            }

            ProgressEvent::TaskFailed {
                worker_id,
                job_name,
                error,
            } => {
                self.finish_bar(worker_id);
                self.println(format!(
                    "{FAILURE}{} - {}",
                    truncate_title(&job_name, 40).red(),
                    error.dimmed()
                ));
            }

            ProgressEvent::Cancelled { discarded } => {
                self.main_bar.set_message(format!(
                    "{STOP}{} waiting for running downloads, {} queued downloads dropped",
                    "Cancelled:".yellow().bold(),
                    discarded.to_string().yellow()
                ));
            }

            ProgressEvent::RunCompleted {
                succeeded_count,
                failed_count,
                skipped_count,
            } => {
                self.main_bar.finish_and_clear();
                println!(
                    "\n{PARTY}{} {} downloaded, {} already present, {} failed",
                    "Mirror complete:".bold().green(),
                    succeeded_count.to_string().green().bold(),
                    skipped_count.to_string().yellow(),
                    if failed_count > 0 {
                        failed_count.to_string().red().bold()
                    } else {
                        failed_count.to_string().green()
                    }
                );
            }
        }
    }
}

fn truncate_title(title: &str, max_len: usize) -> String {
    if title.chars().count() <= max_len {
        title.to_string()
    } else {
        let head: String = title.chars().take(max_len.saturating_sub(3)).collect();
        format!("{head}...")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = logging::init(args.verbose, args.quiet, args.log_dir.as_deref())
        .context("Failed to initialize logging")?;

    let settings = Settings::resolve(
        args.partial_settings(),
        args.config.as_deref(),
        Path::new(DEFAULT_CONFIG_FILE),
    )
    .context("Invalid configuration")?;

    if !args.quiet {
        println!(
            "\n{}{} {}\n",
            MICROPHONE,
            "podmirror".bold().magenta(),
            "- Podcast Mirror".dimmed()
        );
    }

    let client = ReqwestClient::new(&settings.user_agent).context("Failed to create HTTP client")?;

    let feed_urls = settings
        .sources
        .load_feed_urls(&client)
        .await
        .context("Failed to load feed URLs")?;
    let (feed_urls, duplicates) = dedup_urls(feed_urls);
    info!(
        feeds = feed_urls.len(),
        duplicates = duplicates.len(),
        "Feed URLs loaded"
    );

    let reporter: SharedProgressReporter = if args.quiet {
        NoopReporter::shared()
    } else {
        Arc::new(IndicatifReporter::new())
    };

    let fetched = fetch_podcasts(&client, &feed_urls, settings.thread_count, &reporter).await;
    let units = build_work_units(&client, &fetched.podcasts, &settings.output).await;
    let flattened = flatten_and_skip_existing(
        units,
        settings.thread_count,
        &destination_exists,
        &reporter,
    )
    .await;

    let controller = CancellationController::new();
    let listener = controller.listen_for_signals();
    let summary = run(
        flattened.tasks,
        &client,
        &PoolOptions {
            thread_count: settings.thread_count,
        },
        &controller.token(),
        &reporter,
    )
    .await;
    listener.abort();

    let mut failed = flattened.unprepared;
    failed.extend(summary.failed.iter().cloned());

    reporter.report(ProgressEvent::RunCompleted {
        succeeded_count: summary.succeeded,
        failed_count: failed.len(),
        skipped_count: flattened.skipped,
    });

    if !args.quiet {
        if summary.not_started() > 0 {
            println!(
                "{STOP}{} {} downloads were not started",
                "Cancelled:".yellow().bold(),
                summary.not_started().to_string().yellow()
            );
        }

        if !duplicates.is_empty() {
            println!("\n{}", "Duplicate feed URLs (mirrored once):".yellow().bold());
            for url in &duplicates {
                println!("  {}{}", CROSS, url.yellow());
            }
        }

        if !fetched.failed.is_empty() {
            println!("\n{}", "Feeds that could not be parsed:".red().bold());
            for (url, error) in &fetched.failed {
                println!("  {}{} - {}", CROSS, url.yellow(), error.to_string().dimmed());
            }
        }
    }

    if !failed.is_empty() {
        println!("\n{}", "Failed downloads:".red().bold());
        for (index, path) in failed.iter().enumerate() {
            println!("  {}. {}", index + 1, path.display().to_string().yellow());
        }
    }

    if !args.quiet {
        println!(
            "\n{FOLDER}Output: {}\n",
            settings.output.display().to_string().cyan()
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn help_mentions_leftover_partial_files() {
        Args::command().debug_assert();
        let help = Args::command().render_long_help().to_string();
        assert!(help.contains(".partial"));
        assert!(help.contains("deleted safely"));
    }
}
