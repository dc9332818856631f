use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::time::Duration;

use anthology_core::dates::now;
use anthology_core::{BookConfig, Compiler, Extractor, FetchConfig, build_book, default_output_name, parse_url_list};
use anyhow::Context;
use clap::{CommandFactory, Parser};
use clap_complete::Shell;
use owo_colors::OwoColorize;
use tracing_subscriber::EnvFilter;

mod echo;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Compile web articles into a single offline EPUB
#[derive(Parser, Debug)]
#[command(name = "anthology")]
#[command(author = "Anthology Contributors")]
#[command(version)]
#[command(about = "Compile web articles into a single offline EPUB", long_about = None)]
struct Args {
    /// Article URLs, in reading order
    #[arg(value_name = "URLS")]
    urls: Vec<String>,

    /// File with one URL per line, or "-" for stdin
    #[arg(short, long, value_name = "FILE")]
    input: Option<String>,

    /// Output file (default: anthology_<timestamp>.epub)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Book title
    #[arg(long, default_value = "Substack Collection")]
    title: String,

    /// Book author
    #[arg(long, default_value = "Various")]
    author: String,

    /// Language tag recorded in the book
    #[arg(long, default_value = "en", value_name = "LANG")]
    language: String,

    /// Page fetch timeout in seconds
    #[arg(long, default_value = "30", value_name = "SECS")]
    timeout: u64,

    /// Image fetch timeout in seconds
    #[arg(long, default_value = "10", value_name = "SECS")]
    image_timeout: u64,

    /// Custom User-Agent for HTTP requests
    #[arg(long, value_name = "UA")]
    user_agent: Option<String>,

    /// Do not send the article URL as Referer when fetching images
    #[arg(long)]
    no_referer: bool,

    /// Seconds to wait between articles
    #[arg(long, default_value = "1", value_name = "SECS")]
    delay: f64,

    /// Print the build report as JSON
    #[arg(long)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Generate shell completion script
    #[arg(long, value_name = "SHELL")]
    completions: Option<Shell>,
}

impl Args {
    fn fetch_config(&self) -> FetchConfig {
        let defaults = FetchConfig::default();
        FetchConfig {
            page_timeout: Duration::from_secs(self.timeout),
            image_timeout: Duration::from_secs(self.image_timeout),
            user_agent: self.user_agent.clone().unwrap_or(defaults.user_agent),
            send_referer: !self.no_referer,
        }
    }

    fn book_config(&self) -> BookConfig {
        BookConfig { title: self.title.clone(), author: self.author.clone(), language: self.language.clone() }
    }

    /// URLs from the arguments followed by those from `--input`.
    fn urls(&self) -> anyhow::Result<Vec<String>> {
        let mut urls: Vec<String> = self.urls.iter().flat_map(|u| parse_url_list(u)).collect();

        if let Some(input) = &self.input {
            let text = if input == "-" {
                let mut buffer = String::new();
                io::stdin().read_to_string(&mut buffer).context("Failed to read URLs from stdin")?;
                buffer
            } else {
                fs::read_to_string(input).with_context(|| format!("Failed to read URL list: {}", input))?
            };
            urls.extend(parse_url_list(&text));
        }

        Ok(urls)
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).with_target(false).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if let Some(shell) = args.completions {
        let mut cmd = Args::command();
        clap_complete::generate(shell, &mut cmd, "anthology", &mut io::stdout());
        return Ok(());
    }

    init_tracing(args.verbose);

    if args.verbose {
        echo::print_banner();
        echo::print_step(1, 3, "Reading URL list");
    }

    let urls = args.urls()?;
    if urls.is_empty() {
        anyhow::bail!("No URLs provided. Pass them as arguments or with --input");
    }
    tracing::debug!(count = urls.len(), "Resolved URL list");
    let delay = Duration::try_from_secs_f64(args.delay).with_context(|| format!("Invalid delay: {}", args.delay))?;
    let output = args.output.clone().unwrap_or_else(|| PathBuf::from(default_output_name(now())));

    if args.verbose {
        eprintln!("  {} {}", "URLs:".dimmed(), urls.len().to_string().bright_white());
        eprintln!("  {} {}\n", "Output:".dimmed(), output.display().bright_white());
        echo::print_step(2, 3, &format!("Fetching {} articles", urls.len()));
    } else if !args.json {
        echo::print_info(&format!("Fetching {} articles", urls.len()));
    }

    let mut extractor = Extractor::new(args.fetch_config()).context("Failed to create HTTP client")?;
    let mut compiler = Compiler::with_config(args.book_config());

    let report = build_book(&mut extractor, &mut compiler, &urls, delay, &output)
        .await
        .with_context(|| format!("Failed to compile {}", output.display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report).context("Failed to serialize report")?);
        return Ok(());
    }

    if args.verbose {
        echo::print_step(3, 3, "Compiled EPUB");
    }

    let mut message = format!("Successfully compiled {} articles", report.articles.len());
    if !report.failures.is_empty() {
        message.push_str(&format!(" ({} failed)", report.failures.len()));
    }
    echo::print_success(&message);

    for failure in &report.failures {
        echo::print_warning(&failure.to_string());
    }

    let size = fs::metadata(&report.output).map(|m| m.len() as usize).unwrap_or_default();
    echo::print_info(&format!(
        "Output written to {} ({}, {} images)",
        report.output.display().bright_white(),
        echo::format_size(size),
        report.images
    ));

    Ok(())
}
