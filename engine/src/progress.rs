use std::{borrow::Cow, time::Duration};

use indicatif::{ProgressBar, ProgressStyle};
use log::warn;
use tokio::{task::JoinHandle, time::interval};
use tokio_util::sync::CancellationToken;

const TICK: Duration = Duration::from_millis(100);

/// A console spinner driven by its own task. The task stops when the spinner
/// is finished or when the parent token is cancelled.
pub struct Spinner {
    bar: ProgressBar,
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl Spinner {
    pub fn start(message: impl Into<Cow<'static, str>>, parent: &CancellationToken) -> Self {
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner} {msg} [{elapsed}]") {
            bar.set_style(style);
        }
        bar.set_message(message);
        Self::with_bar(bar, parent)
    }

    pub fn with_bar(bar: ProgressBar, parent: &CancellationToken) -> Self {
        let token = parent.child_token();
        let task = tokio::spawn({
            let bar = bar.clone();
            let token = token.clone();
            async move {
                let mut ticker = interval(TICK);
                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = ticker.tick() => bar.tick(),
                    }
                }
            }
        });

        Self { bar, token, task }
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    pub async fn finish(self, message: impl Into<Cow<'static, str>>) {
        self.token.cancel();
        // the task only ever breaks out of its loop, a join error means it panicked
        if let Err(e) = self.task.await {
            warn!("Spinner task failed: {e}");
        }
        self.bar.finish_with_message(message);
    }
}
