//! Output file naming.
//!
//! Image stems follow scheme version 1:
//!
//! ```text
//! {prompt_number}-{model}-{seed}-{aspect}[-{param}...]_{suffix:03}
//! ```
//!
//! Flux Pro appends `g{guidance*10}`, `t{safety_tolerance}`, `s{steps}` and
//! `i{interval*10}`; Flux Schnell appends `n{num_outputs}` and
//! `q{output_quality}`. Decimals are scaled by ten and rounded so that
//! stems never contain a `.`.

use std::fmt;

use crate::image_model::{AspectRatio, GenerationRequest, Model, ModelParams};

pub const SCHEME_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilenameDescriptor {
    prompt_number: String,
    model: Model,
    seed: u32,
    aspect_ratio: AspectRatio,
    params: Vec<String>,
    suffix: u32,
}

impl FilenameDescriptor {
    pub fn new(prompt_number: &str, request: &GenerationRequest, suffix: u32) -> Self {
        let request = request.clone().clamped();
        let params = match &request.params {
            ModelParams::Pro(p) => vec![
                format!("g{}", tenths(p.guidance)),
                format!("t{}", p.safety_tolerance),
                format!("s{}", p.steps),
                format!("i{}", tenths(p.interval)),
            ],
            ModelParams::Schnell(p) => vec![
                format!("n{}", p.num_outputs),
                format!("q{}", p.output_quality),
            ],
        };

        Self {
            prompt_number: sanitize(prompt_number),
            model: request.model(),
            seed: request.seed,
            aspect_ratio: request.aspect_ratio,
            params,
            suffix,
        }
    }

    pub fn file_name(&self, extension: &str) -> String {
        format!("{self}.{extension}")
    }
}

impl fmt::Display for FilenameDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}-{}",
            self.prompt_number,
            self.model.short_code(),
            self.seed,
            self.aspect_ratio.code()
        )?;
        for param in &self.params {
            write!(f, "-{param}")?;
        }
        write!(f, "_{:03}", self.suffix)
    }
}

/// Name of the prompt file belonging to the batch that starts at `suffix`.
pub fn metadata_file_name(prompt_number: &str, suffix: u32) -> String {
    format!("{}_{suffix:03}.md", sanitize(prompt_number))
}

fn tenths(value: f64) -> u32 {
    (value * 10.).round() as u32
}

fn sanitize(prompt_number: &str) -> String {
    prompt_number
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use expect_test::expect;

    use super::*;
    use crate::image_model::{OutputFormat, ProParams, SchnellParams};

    fn pro_request() -> GenerationRequest {
        GenerationRequest {
            seed: 42,
            aspect_ratio: AspectRatio::Ar16x9,
            params: ModelParams::Pro(ProParams {
                guidance: 3.5,
                safety_tolerance: 2,
                steps: 28,
                interval: 1.5,
            }),
            ..GenerationRequest::new("a castle", Model::FluxPro)
        }
    }

    fn schnell_request() -> GenerationRequest {
        GenerationRequest {
            seed: 7,
            aspect_ratio: AspectRatio::Ar9x21,
            params: ModelParams::Schnell(SchnellParams {
                num_outputs: 3,
                output_format: OutputFormat::Jpg,
                output_quality: 95,
                disable_safety_checker: true,
            }),
            ..GenerationRequest::new("a castle", Model::FluxSchnell)
        }
    }

    #[test]
    fn pro_stem() {
        assert_eq!(SCHEME_VERSION, 1, "stem layout below is version 1");
        let expect = expect!["001-fp-42-ar169-g35-t2-s28-i15_004"];
        expect.assert_eq(&FilenameDescriptor::new("001", &pro_request(), 4).to_string());
    }

    #[test]
    fn schnell_stem() {
        let expect = expect!["001-fs-7-ar921-n3-q95_012.jpg"];
        expect.assert_eq(&FilenameDescriptor::new("001", &schnell_request(), 12).file_name("jpg"));
    }

    #[test]
    fn guidance_is_scaled() {
        let mut req = pro_request();
        if let ModelParams::Pro(p) = &mut req.params {
            p.guidance = 2.25;
        }
        let stem = FilenameDescriptor::new("x", &req, 1).to_string();
        assert!(stem.contains("-g23-"), "{stem}");
    }

    #[test]
    fn interval_is_scaled() {
        let mut req = pro_request();
        if let ModelParams::Pro(p) = &mut req.params {
            p.interval = 4.;
        }
        let stem = FilenameDescriptor::new("x", &req, 1).to_string();
        assert!(stem.contains("-i40_"), "{stem}");
    }

    #[test]
    fn out_of_range_values_are_named_as_submitted() {
        let mut req = pro_request();
        if let ModelParams::Pro(p) = &mut req.params {
            p.steps = 99;
        }
        let stem = FilenameDescriptor::new("x", &req, 1).to_string();
        assert!(stem.contains("-s50-"), "{stem}");
    }

    #[test]
    fn suffix_is_zero_padded() {
        let req = schnell_request();
        assert!(FilenameDescriptor::new("p", &req, 1).to_string().ends_with("_001"));
        assert!(FilenameDescriptor::new("p", &req, 1234).to_string().ends_with("_1234"));
    }

    #[test]
    fn deterministic_and_distinct_by_suffix() {
        let req = pro_request();
        let a = FilenameDescriptor::new("s1", &req, 5).to_string();
        let b = FilenameDescriptor::new("s1", &req, 5).to_string();
        assert_eq!(a, b);

        let names: std::collections::HashSet<_> = (1..=50)
            .map(|suffix| FilenameDescriptor::new("s1", &req, suffix).to_string())
            .collect();
        assert_eq!(names.len(), 50);
    }

    #[test]
    fn prompt_number_is_sanitized() {
        let stem = FilenameDescriptor::new(" ../a:b ", &schnell_request(), 1).to_string();
        assert!(stem.starts_with(".._a_b-fs-"), "{stem}");
        assert_eq!(metadata_file_name("a/b", 3), "a_b_003.md");
    }
}
