use std::{
    fs,
    io::{BufRead, Write},
    path::{Path, PathBuf},
};

use color_eyre::{
    Result,
    eyre::{WrapErr as _, eyre},
};
use log::{debug, info};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::prompt::Prompter;

pub const APP_NAME: &str = "fluxgen";
pub const TOKEN_ENV_VAR: &str = "REPLICATE_API_TOKEN";
const TOKEN_FILE_NAME: &str = ".replicate_token";

/// Optional settings file, see [`config_path`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_token: Option<String>,
    pub save_dir: Option<PathBuf>,
    pub prompt_number: Option<String>,
}

pub fn load_ron_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let src = fs::read_to_string(path)?;
    Ok(ron::from_str(&src)?)
}

pub fn save_ron_file<T: Serialize>(path: &Path, x: &T) -> Result<()> {
    Ok(fs::write(path, ron::to_string(x)?)?)
}

pub fn config_path() -> Result<PathBuf> {
    Ok(dirs::config_local_dir()
        .ok_or(eyre!("Couldn't get config dir"))?
        .join(format!("{APP_NAME}.ron")))
}

/// A missing file yields the default config.
pub fn load_config_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        debug!("No config at {}", path.display());
        return Ok(Config::default());
    }
    load_ron_file(path).wrap_err_with(|| format!("Invalid config file {}", path.display()))
}

pub fn load_config() -> Result<Config> {
    load_config_from(&config_path()?)
}

pub fn default_save_dir() -> Result<PathBuf> {
    Ok(dirs::home_dir()
        .ok_or(eyre!("Couldn't find home dir"))?
        .join("Desktop"))
}

/// The API token remembered between runs.
#[derive(Debug, Clone)]
pub struct TokenCache {
    path: PathBuf,
}

impl TokenCache {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn in_home_dir() -> Result<Self> {
        Ok(Self::new(
            dirs::home_dir()
                .ok_or(eyre!("Couldn't find home dir"))?
                .join(TOKEN_FILE_NAME),
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let token = fs::read_to_string(&self.path)
            .wrap_err_with(|| format!("Couldn't read {}", self.path.display()))?;
        Ok(non_empty(token))
    }

    pub fn write(&self, token: &str) -> Result<()> {
        fs::write(&self.path, token)
            .wrap_err_with(|| format!("Couldn't write {}", self.path.display()))
    }
}

/// Where a token can come from, in order of precedence.
#[derive(Debug, Default)]
pub struct TokenSources {
    pub flag: Option<String>,
    pub env: Option<String>,
    pub config: Option<String>,
}

/// Picks the first available token: flag, environment, config file, cache,
/// and finally asks. An asked-for token is written to the cache.
pub fn resolve_token<R: BufRead, W: Write>(
    sources: TokenSources,
    cache: &TokenCache,
    prompter: &mut Prompter<R, W>,
) -> Result<String> {
    let TokenSources { flag, env, config } = sources;
    for (origin, token) in [("flag", flag), ("environment", env), ("config", config)] {
        if let Some(token) = token.and_then(non_empty) {
            debug!("Using API token from {origin}");
            return Ok(token);
        }
    }

    if let Some(token) = cache.read()? {
        debug!("Using cached API token from {}", cache.path().display());
        return Ok(token);
    }

    let token = loop {
        let answer = prompter.text(&format!("Please enter your {TOKEN_ENV_VAR}: "))?;
        if let Some(token) = non_empty(answer) {
            break token;
        }
    };
    cache.write(&token)?;
    info!("API token cached at {}", cache.path().display());
    Ok(token)
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
