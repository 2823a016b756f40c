use std::{env, fs::OpenOptions, path::Path};

use color_eyre::{Result, eyre::WrapErr as _};
use env_logger::{Target, WriteStyle};
use log::LevelFilter;

/// Sends all log output to `path`, appending. `RUST_LOG` overrides the
/// default filter.
pub fn init(path: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .wrap_err_with(|| format!("Couldn't open log file {}", path.display()))?;

    let mut builder = pretty_env_logger::formatted_timed_builder();
    builder
        .target(Target::Pipe(Box::new(file)))
        .write_style(WriteStyle::Never)
        .filter_level(LevelFilter::Info)
        .filter_module("engine", LevelFilter::Debug)
        .filter_module("fluxgen", LevelFilter::Debug);
    if let Ok(filters) = env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.try_init()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use log::warn;
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn appends_to_log_file() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("image_generation.log");
        fs::write(&path, "earlier run\n")?;

        init(&path)?;
        warn!("written from test");

        let contents = fs::read_to_string(&path)?;
        assert!(contents.starts_with("earlier run\n"));
        assert!(contents.contains("written from test"));
        Ok(())
    }
}
