// src/main.rs
// =============================================================================
// This is the entry point of our CLI application.
//
// What happens here:
// 1. Parse command-line arguments using clap
// 2. Set up logging (to stderr, so JSON on stdout stays clean)
// 3. Dispatch to the crawl or check handler
// 4. Print results as a table or JSON
// 5. Exit with proper code (0 = success, 1 = dead links found, 2 = error)
// =============================================================================

mod cli;

use std::collections::BTreeSet;

use anyhow::{Context, Result};
use clap::Parser;
use link_harvester::checker::{check_links, PROBE_TIMEOUT};
use link_harvester::{
    CrawlOutcome, CrawlRequest, CrawlSettings, Crawler, LinkCheckResult, LinkStatus, ProbeOptions,
    ValidationMode,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, ShapingArgs};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&cli);

    let exit_code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            // {:#} prints the whole context chain on one line
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

// Priority: RUST_LOG env var > --quiet > --verbose > default (info)
fn init_tracing(cli: &Cli) {
    let default_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

// Returns:
//   Ok(0) = finished, nothing dead
//   Ok(1) = `check` found dead links
//   Err   = crawl could not run at all
async fn run(cli: Cli) -> Result<i32> {
    debug!(?cli, "arguments parsed");

    match cli.command {
        Commands::Crawl {
            seed_url,
            file_types,
            max_depth,
            visited,
            no_validate,
            no_delay,
            shaping,
            json,
        } => {
            let validation = if no_validate {
                ValidationMode::Skip
            } else {
                ValidationMode::HeadThenGet
            };
            let settings = CrawlSettings {
                validation,
                honor_delays: !no_delay,
                ..settings_from(&shaping)
            };
            let request = CrawlRequest {
                prior_visited: visited,
                mode: shaping.mode,
                ..CrawlRequest::new(seed_url, usize::from(max_depth), file_types)
            };

            handle_crawl(Crawler::new(settings), request, json).await
        }
        Commands::Check {
            urls,
            shaping,
            json,
        } => handle_check(urls, &shaping, json).await,
    }
}

fn settings_from(shaping: &ShapingArgs) -> CrawlSettings {
    CrawlSettings {
        probe: ProbeOptions {
            timeout: PROBE_TIMEOUT,
            concurrency: shaping.concurrency,
        },
        proxies: shaping.proxy_pools(),
        rng_seed: shaping.seed,
        ..CrawlSettings::default()
    }
}

// Handles the 'crawl' subcommand
async fn handle_crawl(crawler: Crawler, request: CrawlRequest, json: bool) -> Result<i32> {
    info!(
        seed = %request.seed_url,
        max_depth = request.max_depth,
        mode = %request.mode,
        "starting crawl"
    );

    let seed = request.seed_url.clone();
    let outcome = crawler
        .crawl(request)
        .await
        .with_context(|| format!("crawl of {} failed", seed))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome);
    }

    Ok(0)
}

// Handles the 'check' subcommand
async fn handle_check(urls: Vec<String>, shaping: &ShapingArgs, json: bool) -> Result<i32> {
    // Remove duplicates, keeping a stable order for the probes
    let urls: BTreeSet<String> = urls.into_iter().collect();

    let crawler = Crawler::new(settings_from(shaping));
    let mut shaper = crawler.shaper_for(shaping.mode);
    let client = crawler.build_client(&shaper)?;

    info!(count = urls.len(), mode = %shaping.mode, "checking links");

    let mut results = check_links(&client, &mut shaper, urls, &crawler.settings().probe).await;
    results.sort_by(|a, b| a.url.cmp(&b.url));

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        print_table(&results);
    }

    let dead_count = results.iter().filter(|r| !r.is_live()).count();
    Ok(if dead_count > 0 { 1 } else { 0 })
}

fn print_outcome(outcome: &CrawlOutcome) {
    println!("📄 Visited pages:");
    for page in &outcome.visited {
        println!("   {}", page);
    }

    println!();
    println!("📦 Files:");
    if outcome.found_files.is_empty() {
        println!("   (none)");
    }
    for file in &outcome.found_files {
        println!("   {}", file);
    }

    println!();
    println!("📊 Summary:");
    println!("   📄 Pages: {}", outcome.visited.len());
    println!("   📦 Files: {}", outcome.found_files.len());
}

// Prints results as a human-readable table in the terminal
fn print_table(results: &[LinkCheckResult]) {
    println!("{:<60} {:<15} {:<30}", "URL", "STATUS", "MESSAGE");
    println!("{}", "=".repeat(105));

    for result in results {
        let status_display = format_status(&result.status);
        let message = result.message.as_deref().unwrap_or("");

        println!(
            "{:<60} {:<15} {:<30}",
            truncate(&result.url, 57),
            status_display,
            message
        );
    }

    println!();

    let live_count = results.iter().filter(|r| r.is_live()).count();
    let dead_count = results.len() - live_count;

    println!("📊 Summary:");
    println!("   ✅ Live: {}", live_count);
    println!("   ❌ Dead: {}", dead_count);
    println!("   📋 Total: {}", results.len());
}

// Cuts on a char boundary so multi-byte URLs can't panic
fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}

fn format_status(status: &LinkStatus) -> &'static str {
    match status {
        LinkStatus::Ok => "✅ OK",
        LinkStatus::Redirect(_) => "🔀 REDIRECT",
        LinkStatus::Broken => "❌ BROKEN",
        LinkStatus::Forbidden => "🚫 FORBIDDEN",
        LinkStatus::Timeout => "⏱️  TIMEOUT",
        LinkStatus::SslError => "🔒 SSL ERROR",
        LinkStatus::TooManyRedirects => "🔁 TOO MANY REDIRECTS",
        LinkStatus::DnsError => "🌐 DNS ERROR",
        LinkStatus::Error => "⚠️  ERROR",
    }
}
