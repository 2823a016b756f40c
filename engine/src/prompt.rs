use std::{
    fmt,
    io::{self, BufRead, StdinLock, Stdout, Write},
    path::{Path, PathBuf},
    str::FromStr,
};

use strum::IntoEnumIterator;
use thiserror::Error;

use crate::image_model::{
    AspectRatio, GenerationRequest, Model, ModelParams, NumericField, OutputFormat, ProParams,
    SchnellParams,
    request::{GUIDANCE, INTERVAL, NUM_OUTPUTS, OUTPUT_QUALITY, SAFETY_TOLERANCE, SEED, STEPS},
};

#[derive(Debug, Error)]
pub enum InputError {
    #[error("Input ended")]
    Eof,

    #[error("Console I/O failed: {0}")]
    Io(#[from] io::Error),
}

pub type InputResult<T> = Result<T, InputError>;

/// Line based console dialog. Every question is asked again until the
/// answer is valid, empty answers select the shown default.
pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl Prompter<StdinLock<'static>, Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    pub fn say(&mut self, line: impl AsRef<str>) -> InputResult<()> {
        writeln!(self.output, "{}", line.as_ref())?;
        Ok(())
    }

    fn ask(&mut self, question: &str) -> InputResult<String> {
        write!(self.output, "{question}")?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(InputError::Eof);
        }
        Ok(line.trim_end_matches(['\n', '\r']).to_string())
    }

    pub fn text(&mut self, question: &str) -> InputResult<String> {
        self.ask(question)
    }

    pub fn numeric(&mut self, field: &NumericField) -> InputResult<f64> {
        loop {
            let answer = self.ask(&format!("{} [{}]: ", field.label, field.default))?;
            let answer = answer.trim();
            if answer.is_empty() {
                return Ok(field.default);
            }

            match answer.parse::<f64>() {
                Ok(value) if field.contains(value) => return Ok(value),
                Ok(_) => self.say(format!(
                    "Value must be between {} and {}. Please try again.",
                    field.min, field.max
                ))?,
                Err(_) => self.say("Invalid input. Please enter a number.")?,
            }
        }
    }

    /// Numbered menu; returns the zero based index of the choice.
    fn menu<T: fmt::Display>(
        &mut self,
        heading: &str,
        items: &[T],
        question: &str,
        default: Option<usize>,
    ) -> InputResult<usize> {
        self.say(heading)?;
        for (i, item) in items.iter().enumerate() {
            self.say(format!("{}. {item}", i + 1))?;
        }

        loop {
            let answer = self.ask(question)?;
            let answer = answer.trim();
            if let (true, Some(default)) = (answer.is_empty(), default) {
                return Ok(default);
            }
            match answer.parse::<usize>() {
                Ok(n) if (1..=items.len()).contains(&n) => return Ok(n - 1),
                _ => self.say("Invalid choice. Please try again.")?,
            }
        }
    }

    pub fn aspect_ratio(&mut self) -> InputResult<AspectRatio> {
        let ratios: Vec<_> = AspectRatio::iter().collect();
        let default = AspectRatio::default();
        let question = format!(
            "Select an aspect ratio (1-{}) [default: {default}]: ",
            ratios.len()
        );
        let idx = self.menu(
            "Available aspect ratios:",
            &ratios,
            &question,
            ratios.iter().position(|r| *r == default),
        )?;
        Ok(ratios[idx])
    }

    pub fn model(&mut self) -> InputResult<Model> {
        let models: Vec<_> = Model::iter().collect();
        let question = format!("Select a model (1-{}): ", models.len());
        let idx = self.menu("Available models:", &models, &question, None)?;
        Ok(models[idx])
    }

    pub fn output_format(&mut self) -> InputResult<OutputFormat> {
        let default = OutputFormat::default();
        let choices = OutputFormat::iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join("/");
        loop {
            let answer =
                self.ask(&format!("Enter output format ({choices}) [default: {default}]: "))?;
            let answer = answer.trim().to_lowercase();
            if answer.is_empty() {
                return Ok(default);
            }
            match OutputFormat::from_str(&answer) {
                Ok(format) => return Ok(format),
                Err(_) => self.say(format!("Unknown format '{answer}', use one of {choices}."))?,
            }
        }
    }

    /// A missing directory falls back to `default` instead of asking again.
    pub fn save_directory(&mut self, default: &Path) -> InputResult<PathBuf> {
        let answer = self.ask(&format!(
            "Enter the directory to save images [default: {}]: ",
            default.display()
        ))?;
        let answer = answer.trim();
        if answer.is_empty() {
            return Ok(default.to_path_buf());
        }

        self.existing_directory(PathBuf::from(answer), default)
    }

    /// `dir` if it exists, otherwise says so and returns `default`.
    pub fn existing_directory(&mut self, dir: PathBuf, default: &Path) -> InputResult<PathBuf> {
        if dir.is_dir() {
            return Ok(dir);
        }
        self.say(format!(
            "Directory {} does not exist. Using default directory.",
            dir.display()
        ))?;
        Ok(default.to_path_buf())
    }

    pub fn confirm(&mut self, question: &str) -> InputResult<bool> {
        Ok(self.ask(question)?.trim().eq_ignore_ascii_case("y"))
    }

    pub fn collect_request(&mut self, model: Model) -> InputResult<GenerationRequest> {
        let prompt = self.text("Please enter your image generation prompt: ")?;
        let seed = as_int(self.numeric(&SEED)?);

        let (aspect_ratio, params) = match model {
            Model::FluxPro => {
                let guidance = self.numeric(&GUIDANCE)?;
                let aspect_ratio = self.aspect_ratio()?;
                let params = ProParams {
                    guidance,
                    safety_tolerance: as_int(self.numeric(&SAFETY_TOLERANCE)?) as u8,
                    steps: as_int(self.numeric(&STEPS)?) as u8,
                    interval: self.numeric(&INTERVAL)?,
                };
                (aspect_ratio, ModelParams::Pro(params))
            }
            Model::FluxSchnell => {
                let aspect_ratio = self.aspect_ratio()?;
                let params = SchnellParams {
                    num_outputs: as_int(self.numeric(&NUM_OUTPUTS)?) as u8,
                    output_format: self.output_format()?,
                    output_quality: as_int(self.numeric(&OUTPUT_QUALITY)?) as u8,
                    disable_safety_checker: true,
                };
                (aspect_ratio, ModelParams::Schnell(params))
            }
        };

        Ok(GenerationRequest {
            prompt,
            seed,
            aspect_ratio,
            params,
        })
    }
}

/// Integer fields accept decimal input and drop the fraction.
fn as_int(value: f64) -> u32 {
    value.trunc() as u32
}
