use clap::Parser;
use color_eyre::{Result, eyre::eyre};
use engine::{
    download::Downloader,
    image_model::{GenerationRequest, GenerationResult, ImageGenerator, Model, ReplicateClient},
};

/// Runs one generation with default parameters and downloads the result
#[derive(clap::Parser)]
struct Arg {
    model: Model,
    key: String,
    prompt: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    pretty_env_logger::init();
    let Arg { model, key, prompt } = Arg::parse();
    let client = ReplicateClient::new(key);

    let request = GenerationRequest::new(prompt, model);
    let result = client.generate(&request).await?;
    if let GenerationResult::Unrecognized(raw) = &result {
        return Err(eyre!("No valid output:\n{raw:#}"));
    }

    let downloader = Downloader::default();
    let extension = request.image_extension();
    for (i, url) in result.urls().iter().enumerate() {
        let path = format!("output_{i}.{extension}");
        let n = downloader.save_image(url, path.as_ref()).await?;
        println!("Saved {path}, {n} bytes");
    }

    Ok(())
}
