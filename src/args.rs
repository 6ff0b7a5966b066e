use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Target URL, only plain http is supported [default: http://localhost:1337/movies]
    #[arg(short, long)]
    pub url: Option<String>,

    /// Number of concurrent connections [default: 100]
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    pub connections: Option<u64>,

    /// Run duration in seconds [default: 10]
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    pub duration: Option<u64>,

    /// Requests in flight per connection [default: 10]
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    pub pipelining: Option<u64>,

    /// HTTP method [default: GET]
    #[arg(short, long)]
    pub method: Option<String>,

    /// TOML file with any of the run settings above; flags take precedence
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Print the statistics as JSON instead of the text report
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Append the statistics as a CSV row to this file
    #[arg(short, long)]
    pub output_file: Option<PathBuf>,

    /// Do not draw the progress bar
    #[arg(long, default_value_t = false)]
    pub no_progress: bool,
}
