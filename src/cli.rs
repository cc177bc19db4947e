// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// Two subcommands:
// - crawl: walk a site and report the live file links it contains
// - check: liveness-check a list of URLs and show why each one failed
//
// Proxy pools can come from flags or from environment variables so that
// credentials don't have to appear on the command line.
// =============================================================================

use std::fmt;

use clap::builder::TypedValueParser;
use clap::{Args, Parser, Subcommand};

use link_harvester::checker::PROBE_CONCURRENCY;
use link_harvester::{CrawlMode, ProxyPools};

#[derive(Parser, Debug)]
#[command(
    name = "link-harvester",
    version,
    about = "Find live downloadable files (documents, images, archives) on a website",
    long_about = "link-harvester crawls a website from a seed page, collects links to files with \
                  the extensions you ask for, and reports only the ones that actually download."
)]
pub struct Cli {
    /// Increase log verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Crawl a website and list the live files it links to
    ///
    /// Example: link-harvester crawl https://example.com -t pdf,zip --max-depth 2
    Crawl {
        /// Page to start from (e.g., https://example.com/downloads)
        seed_url: String,

        /// File extensions to collect, with or without the dot
        ///
        /// Links with these extensions are reported as files and never
        /// crawled as pages.
        #[arg(short = 't', long = "file-type", value_delimiter = ',', required = true)]
        file_types: Vec<String>,

        /// Maximum number of link hops from the seed page
        ///
        /// Depth 1 = the seed page and the pages it links to
        /// Depth 2 = ... plus the pages those link to
        #[arg(short = 'd', long, default_value_t = 2, value_parser = clap::value_parser!(u16).range(1..))]
        max_depth: u16,

        /// Pages already crawled by an earlier run; they won't be fetched again
        #[arg(long = "visited", value_delimiter = ',')]
        visited: Vec<String>,

        /// Report every file link without checking that it downloads
        #[arg(long)]
        no_validate: bool,

        /// Skip the mode's pause before each page fetch
        #[arg(long)]
        no_delay: bool,

        #[command(flatten)]
        shaping: ShapingArgs,

        /// Output results in JSON format instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Check that URLs are downloadable (HEAD, falling back to GET)
    ///
    /// Example: link-harvester check https://example.com/a.pdf https://example.com/b.zip
    Check {
        /// URLs to check
        #[arg(required = true)]
        urls: Vec<String>,

        #[command(flatten)]
        shaping: ShapingArgs,

        /// Output results in JSON format instead of a table
        #[arg(long)]
        json: bool,
    },
}

// Request-shaping options shared by both subcommands
#[derive(Args, Clone)]
pub struct ShapingArgs {
    /// Request-shaping profile
    #[arg(short, long, value_enum, default_value_t = CrawlMode::Standard)]
    pub mode: CrawlMode,

    /// Proxies for stealth mode (comma-separated)
    #[arg(long, env = "LINK_HARVESTER_STEALTH_PROXIES", value_delimiter = ',', hide_env_values = true)]
    pub stealth_proxies: Vec<String>,

    /// Proxies for residential mode (comma-separated)
    #[arg(long, env = "LINK_HARVESTER_RESIDENTIAL_PROXIES", value_delimiter = ',', hide_env_values = true)]
    pub residential_proxies: Vec<String>,

    /// Maximum liveness probes in flight at once
    #[arg(short, long, default_value_t = PROBE_CONCURRENCY, value_parser = clap::value_parser!(u16).range(1..=256).map(usize::from))]
    pub concurrency: usize,

    /// Seed for user-agent, proxy and delay sampling (reproducible runs)
    #[arg(long)]
    pub seed: Option<u64>,
}

impl ShapingArgs {
    pub fn proxy_pools(&self) -> ProxyPools {
        ProxyPools {
            stealth: clean_pool(&self.stealth_proxies),
            residential: clean_pool(&self.residential_proxies),
        }
    }
}

// Proxy URLs may carry credentials, so only the pool sizes are shown
impl fmt::Debug for ShapingArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShapingArgs")
            .field("mode", &self.mode)
            .field("stealth_proxies", &self.stealth_proxies.len())
            .field("residential_proxies", &self.residential_proxies.len())
            .field("concurrency", &self.concurrency)
            .field("seed", &self.seed)
            .finish()
    }
}

// Drops blank entries left by stray commas ("a, ,b")
fn clean_pool(pool: &[String]) -> Vec<String> {
    pool.iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

// -----------------------------------------------------------------------------
// NOTES:
//
// 1. value_delimiter = ','
//    - `-t pdf,zip` and `-t pdf -t zip` both give ["pdf", "zip"]
//
// 2. env = "..."
//    - clap reads the variable when the flag is absent
//    - hide_env_values keeps proxy credentials out of --help output
//
// 3. #[command(flatten)]
//    - Pulls ShapingArgs' flags into each subcommand
// -----------------------------------------------------------------------------
