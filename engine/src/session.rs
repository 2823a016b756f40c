use std::{
    io::{BufRead, Write},
    path::PathBuf,
    sync::{Arc, Mutex, PoisonError},
};

use color_eyre::{Report, Result};
use log::{debug, error, info};
use serde_json::Value;
use strum::Display;
use tokio_util::sync::CancellationToken;

use crate::{
    ImgGenBox,
    download::{DownloadError, DownloadJob, Downloader},
    filename::{FilenameDescriptor, metadata_file_name},
    image_model::{GenerationRequest, GenerationResult, ImageGenerator, RemoteError},
    metadata::write_prompt_file,
    progress::Spinner,
    prompt::{InputError, InputResult, Prompter},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SessionState {
    CollectingInput,
    Invoking,
    Dispatching,
    Writing,
    Terminated,
}

#[derive(Debug)]
pub enum Outcome {
    Saved(SavedBatch),
    NoValidOutput(Value),
    Failed(RemoteError),
}

#[derive(Debug, Default)]
pub struct SavedBatch {
    pub images: Vec<PathBuf>,
    pub failures: Vec<DownloadError>,
    pub prompt_file: Option<PathBuf>,
    pub prompt_error: Option<Report>,
}

/// Runs the remote call while a spinner is shown. Cancelling `cancel` aborts
/// the call and stops the spinner.
pub async fn invoke(
    generator: &(dyn ImageGenerator + Send + Sync),
    request: &GenerationRequest,
    cancel: &CancellationToken,
) -> Result<GenerationResult, RemoteError> {
    let spinner = Spinner::start("Generating image", cancel);
    let result = tokio::select! {
        res = generator.generate(request) => res,
        _ = cancel.cancelled() => Err(RemoteError::Cancelled),
    };
    let done = match result {
        Ok(_) => "Generation finished",
        Err(_) => "Generation failed",
    };
    spinner.finish(done).await;
    result
}

/// Cancels whichever generation is in flight. Every generation gets its own
/// token, so a cancel never carries over to the next one.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    current: Arc<Mutex<CancellationToken>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel();
    }

    fn fresh_token(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = token.clone();
        token
    }
}

pub struct Session {
    generator: ImgGenBox,
    downloader: Downloader,
    save_dir: PathBuf,
    prompt_number: String,
    next_suffix: u32,
    cancel: CancelHandle,
    state: SessionState,
}

impl Session {
    pub fn new(generator: ImgGenBox, save_dir: PathBuf, prompt_number: String) -> Self {
        Self {
            generator,
            downloader: Downloader::default(),
            save_dir,
            prompt_number,
            next_suffix: 1,
            cancel: CancelHandle::default(),
            state: SessionState::CollectingInput,
        }
    }

    pub fn with_downloader(mut self, downloader: Downloader) -> Self {
        self.downloader = downloader;
        self
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn images_generated(&self) -> u32 {
        self.next_suffix - 1
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn transition(&mut self, to: SessionState) {
        debug!("Session: {} -> {to}", self.state);
        self.state = to;
    }

    pub async fn run<R: BufRead, W: Write>(&mut self, prompter: &mut Prompter<R, W>) -> Result<()> {
        loop {
            match self.iteration(prompter).await {
                Ok(true) => {}
                Ok(false) => break,
                Err(InputError::Eof) => {
                    info!("Input ended, stopping");
                    break;
                }
                Err(e) => {
                    self.transition(SessionState::Terminated);
                    return Err(e.into());
                }
            }
        }
        self.transition(SessionState::Terminated);
        Ok(())
    }

    async fn iteration<R: BufRead, W: Write>(
        &mut self,
        prompter: &mut Prompter<R, W>,
    ) -> InputResult<bool> {
        self.transition(SessionState::CollectingInput);
        let model = prompter.model()?;
        let request = prompter.collect_request(model)?;

        let outcome = self.generate(&request).await;
        self.report(prompter, &outcome)?;

        prompter.confirm("Do you want to generate another image? (y/n): ")
    }

    pub async fn generate(&mut self, request: &GenerationRequest) -> Outcome {
        self.transition(SessionState::Invoking);
        let token = self.cancel.fresh_token();
        let result = invoke(self.generator.as_ref(), request, &token).await;

        self.transition(SessionState::Dispatching);
        match result {
            Ok(result) => self.dispatch(request, result).await,
            Err(e) => {
                error!("An error occurred while generating the image: {e:?}");
                Outcome::Failed(e)
            }
        }
    }

    /// Saves every image of `result` plus one prompt file for the batch.
    pub async fn dispatch(
        &mut self,
        request: &GenerationRequest,
        result: GenerationResult,
    ) -> Outcome {
        let urls = match result {
            GenerationResult::SingleImage(url) => vec![url],
            GenerationResult::MultiImage(urls) => urls,
            GenerationResult::Unrecognized(raw) => {
                error!("No valid output was generated: {raw}");
                return Outcome::NoValidOutput(raw);
            }
        };

        self.transition(SessionState::Writing);
        let first_suffix = self.next_suffix;
        let extension = request.image_extension();
        let jobs: Vec<_> = urls
            .into_iter()
            .zip(first_suffix..)
            .map(|(url, suffix)| {
                let name = FilenameDescriptor::new(&self.prompt_number, request, suffix)
                    .file_name(&extension);
                DownloadJob {
                    url,
                    path: self.save_dir.join(name),
                }
            })
            .collect();
        self.next_suffix += jobs.len() as u32;

        let mut batch = SavedBatch::default();
        let results = self.downloader.save_all(&jobs).await;
        for (job, res) in jobs.into_iter().zip(results) {
            match res {
                Ok(_) => batch.images.push(job.path),
                Err(e) => {
                    error!("Failed to download image: {e:?}");
                    batch.failures.push(e);
                }
            }
        }

        let prompt_file = self
            .save_dir
            .join(metadata_file_name(&self.prompt_number, first_suffix));
        match write_prompt_file(&prompt_file, &request.prompt) {
            Ok(()) => batch.prompt_file = Some(prompt_file),
            Err(e) => {
                error!("Failed to save prompt: {e:?}");
                batch.prompt_error = Some(e);
            }
        }

        Outcome::Saved(batch)
    }

    fn report<R: BufRead, W: Write>(
        &self,
        prompter: &mut Prompter<R, W>,
        outcome: &Outcome,
    ) -> InputResult<()> {
        match outcome {
            Outcome::Saved(batch) => {
                for path in &batch.images {
                    prompter.say(format!("Image saved as {}", path.display()))?;
                }
                for e in &batch.failures {
                    prompter.say(format!("Failed to download image: {e}"))?;
                }
                if let Some(path) = &batch.prompt_file {
                    prompter.say(format!("Prompt saved as {}", path.display()))?;
                }
                if let Some(e) = &batch.prompt_error {
                    prompter.say(format!("Failed to save prompt: {e}"))?;
                }
            }
            Outcome::NoValidOutput(raw) => {
                prompter.say("No valid output was generated.")?;
                prompter.say(format!("Received output: {raw}"))?;
            }
            Outcome::Failed(e) => {
                prompter.say(format!("An error occurred while generating the image: {e}"))?;
                return Ok(());
            }
        }
        prompter.say(format!("Total images generated: {}", self.images_generated()))
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        io::Cursor,
        path::Path,
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use axum::{Router, http::StatusCode, routing::get};
    use serde_json::json;
    use tempfile::{TempDir, tempdir};

    use super::*;
    use crate::{
        image_model::{GenerationFuture, Model},
        test_util::serve,
    };

    /// Hands out prepared results in order.
    struct Scripted(Mutex<VecDeque<Result<GenerationResult, RemoteError>>>);

    impl Scripted {
        fn boxed(results: Vec<Result<GenerationResult, RemoteError>>) -> ImgGenBox {
            Box::new(Self(Mutex::new(results.into())))
        }
    }

    impl ImageGenerator for Scripted {
        fn generate<'a>(&'a self, _: &'a GenerationRequest) -> GenerationFuture<'a> {
            let next = self
                .0
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(GenerationResult::Unrecognized(Value::Null)));
            Box::pin(async move { next })
        }
    }

    struct Hanging;

    impl ImageGenerator for Hanging {
        fn generate<'a>(&'a self, _: &'a GenerationRequest) -> GenerationFuture<'a> {
            Box::pin(std::future::pending())
        }
    }

    /// Hangs on the first call, answers slowly afterwards.
    #[derive(Default)]
    struct HangsOnce(AtomicUsize);

    impl ImageGenerator for HangsOnce {
        fn generate<'a>(&'a self, _: &'a GenerationRequest) -> GenerationFuture<'a> {
            let first = self.0.fetch_add(1, Ordering::SeqCst) == 0;
            Box::pin(async move {
                if first {
                    std::future::pending::<()>().await;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(GenerationResult::Unrecognized(Value::Null))
            })
        }
    }

    async fn image_server() -> String {
        let app = Router::new()
            .route("/img/:n", get(|| async { b"image-bytes".to_vec() }))
            .route(
                "/missing",
                get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "nope") }),
            );
        serve(app).await
    }

    fn session(generator: ImgGenBox) -> (Session, TempDir) {
        let dir = tempdir().unwrap();
        let session = Session::new(generator, dir.path().to_path_buf(), "001".into())
            .with_downloader(Downloader::new(reqwest::Client::new()));
        (session, dir)
    }

    fn files_in(dir: &Path) -> Vec<String> {
        let mut names: Vec<_> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn three_urls_three_images_one_prompt_file() {
        let base = image_server().await;
        let urls = (1..=3).map(|n| format!("{base}/img/{n}")).collect();
        let (mut session, dir) = session(Scripted::boxed(vec![Ok(GenerationResult::MultiImage(urls))]));
        let request = GenerationRequest::new("three foxes", Model::FluxSchnell);

        let Outcome::Saved(batch) = session.generate(&request).await else {
            panic!("expected a saved batch");
        };
        assert_eq!(batch.images.len(), 3);
        assert!(batch.failures.is_empty());
        assert_eq!(session.images_generated(), 3);
        assert_eq!(
            files_in(dir.path()),
            [
                "001-fs-12-ar11-n1-q80_001.webp",
                "001-fs-12-ar11-n1-q80_002.webp",
                "001-fs-12-ar11-n1-q80_003.webp",
                "001_001.md",
            ]
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join("001_001.md")).unwrap(),
            "# Image Generation Prompt\n\nthree foxes\n"
        );
    }

    #[tokio::test]
    async fn single_url_one_image_one_prompt_file() {
        let base = image_server().await;
        let (mut session, dir) = session(Scripted::boxed(vec![Ok(
            GenerationResult::SingleImage(format!("{base}/img/1")),
        )]));
        let request = GenerationRequest::new("a lighthouse", Model::FluxPro);

        assert!(matches!(session.generate(&request).await, Outcome::Saved(_)));
        assert_eq!(session.images_generated(), 1);
        assert_eq!(
            files_in(dir.path()),
            ["001-fp-12-ar11-g35-t5-s30-i20_001.png", "001_001.md"]
        );
    }

    #[tokio::test]
    async fn suffixes_continue_across_batches() {
        let base = image_server().await;
        let (mut session, dir) = session(Scripted::boxed(vec![
            Ok(GenerationResult::MultiImage(vec![
                format!("{base}/img/1"),
                format!("{base}/img/2"),
            ])),
            Ok(GenerationResult::SingleImage(format!("{base}/img/3"))),
        ]));

        session
            .generate(&GenerationRequest::new("a", Model::FluxSchnell))
            .await;
        session
            .generate(&GenerationRequest::new("b", Model::FluxPro))
            .await;

        assert_eq!(session.images_generated(), 3);
        let files = files_in(dir.path());
        assert!(files.contains(&"001-fp-12-ar11-g35-t5-s30-i20_003.png".to_string()));
        assert!(files.contains(&"001_003.md".to_string()));
        assert_eq!(files.len(), 5);
    }

    #[tokio::test]
    async fn unrecognized_output_writes_nothing() {
        let (mut session, dir) = session(Scripted::boxed(vec![Ok(
            GenerationResult::Unrecognized(json!({"detail": "odd"})),
        )]));
        let request = GenerationRequest::new("x", Model::FluxPro);

        assert!(matches!(
            session.generate(&request).await,
            Outcome::NoValidOutput(_)
        ));
        assert_eq!(session.images_generated(), 0);
        assert!(files_in(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn failed_download_does_not_block_siblings() {
        let base = image_server().await;
        let urls = vec![
            format!("{base}/img/1"),
            format!("{base}/missing"),
            format!("{base}/img/3"),
        ];
        let (mut session, dir) = session(Scripted::boxed(vec![Ok(GenerationResult::MultiImage(urls))]));
        let request = GenerationRequest::new("x", Model::FluxSchnell);

        let Outcome::Saved(batch) = session.generate(&request).await else {
            panic!("expected a saved batch");
        };
        assert_eq!(batch.images.len(), 2);
        assert_eq!(batch.failures.len(), 1);
        assert!(batch.prompt_file.is_some());
        assert_eq!(session.images_generated(), 3);
        assert_eq!(
            files_in(dir.path()),
            [
                "001-fs-12-ar11-n1-q80_001.webp",
                "001-fs-12-ar11-n1-q80_003.webp",
                "001_001.md",
            ]
        );
    }

    #[tokio::test]
    async fn remote_error_is_reported() {
        let (mut session, dir) = session(Scripted::boxed(vec![Err(RemoteError::Cancelled)]));
        let request = GenerationRequest::new("x", Model::FluxPro);

        assert!(matches!(session.generate(&request).await, Outcome::Failed(_)));
        assert!(files_in(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn cancel_aborts_hanging_generation() {
        let (mut session, _dir) = session(Box::new(Hanging));
        let handle = session.cancel_handle();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            handle.cancel();
        });

        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            session.generate(&GenerationRequest::new("x", Model::FluxPro)),
        )
        .await
        .expect("generation should be cancelled");
        assert!(matches!(outcome, Outcome::Failed(RemoteError::Cancelled)));
    }

    #[tokio::test]
    async fn cancel_only_affects_generation_in_flight() {
        let (mut session, _dir) = session(Box::new(HangsOnce::default()));
        let handle = session.cancel_handle();
        let request = GenerationRequest::new("x", Model::FluxPro);

        let cancel_soon = tokio::spawn({
            let handle = handle.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                handle.cancel();
            }
        });
        let first = tokio::time::timeout(Duration::from_secs(5), session.generate(&request))
            .await
            .expect("first generation should be cancelled");
        assert!(matches!(first, Outcome::Failed(RemoteError::Cancelled)));
        cancel_soon.await.unwrap();

        let second = tokio::time::timeout(Duration::from_secs(5), session.generate(&request))
            .await
            .expect("second generation should finish");
        assert!(matches!(second, Outcome::NoValidOutput(Value::Null)), "{second:?}");
    }

    #[tokio::test]
    async fn cancel_between_generations_is_ignored() {
        let (mut session, _dir) = session(Scripted::boxed(vec![]));
        session.cancel_handle().cancel();

        let outcome = session
            .generate(&GenerationRequest::new("x", Model::FluxPro))
            .await;
        assert!(matches!(outcome, Outcome::NoValidOutput(_)), "{outcome:?}");
    }

    #[tokio::test]
    async fn loop_survives_bad_iterations() {
        let (mut session, dir) = session(Scripted::boxed(vec![
            Ok(GenerationResult::Unrecognized(Value::Null)),
            Err(RemoteError::Cancelled),
        ]));
        // schnell with all defaults, continue, pro with all defaults, stop
        let input = "2\nfirst\n\n\n\n\n\ny\n1\nsecond\n\n\n\n\n\n\nn\n";
        let mut prompter = Prompter::new(Cursor::new(input.as_bytes().to_vec()), Vec::new());

        session.run(&mut prompter).await.unwrap();
        assert_eq!(session.state(), SessionState::Terminated);
        assert!(files_in(dir.path()).is_empty());

        let out = String::from_utf8(prompter.into_output()).unwrap();
        assert!(out.contains("No valid output was generated.\nReceived output: null\n"));
        assert!(out.contains("An error occurred while generating the image: Generation was cancelled"));
        assert_eq!(
            out.matches("Do you want to generate another image? (y/n): ").count(),
            2
        );
    }

    #[tokio::test]
    async fn end_of_input_ends_the_session() {
        let (mut session, _dir) = session(Scripted::boxed(vec![]));
        let mut prompter = Prompter::new(Cursor::new(b"2\n".to_vec()), Vec::new());

        session.run(&mut prompter).await.unwrap();
        assert_eq!(session.state(), SessionState::Terminated);
    }
}
