use std::{fs, path::Path};

use color_eyre::{Result, eyre::WrapErr as _};

pub fn prompt_document(prompt: &str) -> String {
    format!("# Image Generation Prompt\n\n{prompt}\n")
}

/// Writes the prompt that produced a batch of images next to them.
pub fn write_prompt_file(path: &Path, prompt: &str) -> Result<()> {
    fs::write(path, prompt_document(prompt))
        .wrap_err_with(|| format!("Couldn't write prompt to {}", path.display()))
}
