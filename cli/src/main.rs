use clap::Parser;
use color_eyre::Result;
use engine::{
    config::{self, TOKEN_ENV_VAR, TokenCache, TokenSources},
    image_model::ReplicateClient,
    prompt::Prompter,
    session::Session,
};
use indoc::indoc;
use log::info;

mod cli;
mod logging;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = cli::Cli::parse();
    logging::init(&args.log_file)?;

    let cfg = match &args.config {
        Some(path) => config::load_config_from(path)?,
        None => config::load_config()?,
    };
    let mut prompter = Prompter::stdio();
    prompter.say(indoc! {"
        Flux image generation on Replicate.
        Press Enter on any question to accept the default shown in brackets.
    "})?;

    let token = config::resolve_token(
        TokenSources {
            flag: args.token,
            env: std::env::var(TOKEN_ENV_VAR).ok(),
            config: cfg.api_token,
        },
        &TokenCache::in_home_dir()?,
        &mut prompter,
    )?;
    let mut client = ReplicateClient::new(token);
    if let Some(url) = args.base_url {
        client = client.with_base_url(url);
    }

    let fallback = config::default_save_dir()?;
    let default = match cfg.save_dir {
        Some(dir) => prompter.existing_directory(dir, &fallback)?,
        None => fallback,
    };
    let save_dir = match args.save_dir {
        Some(dir) => prompter.existing_directory(dir, &default)?,
        None => prompter.save_directory(&default)?,
    };
    let prompt_number = match args.prompt_number.or(cfg.prompt_number) {
        Some(n) => n,
        None => prompter.text("Enter a prompt number (e.g., 001): ")?,
    };
    info!("Saving to {} with prompt number {prompt_number:?}", save_dir.display());

    let mut session = Session::new(Box::new(client), save_dir, prompt_number);
    session.run(&mut prompter).await
}
