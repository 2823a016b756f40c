use std::path::PathBuf;

use engine::DEFAULT_LOG_FILE;

/// Generate images with Flux on Replicate and save them with their prompts
#[derive(Debug, clap::Parser)]
pub struct Cli {
    /// Replicate API token, takes precedence over every other source
    #[arg(short, long)]
    pub token: Option<String>,

    /// Directory for images and prompt files, skips the directory question
    #[arg(short, long)]
    pub save_dir: Option<PathBuf>,

    /// Prefix for every file of this session, skips the prompt number question
    #[arg(short, long)]
    pub prompt_number: Option<String>,

    /// Config file to use instead of the default location
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[arg(long, default_value = DEFAULT_LOG_FILE)]
    pub log_file: PathBuf,

    /// Alternative API endpoint
    #[arg(long)]
    pub base_url: Option<String>,
}
