use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use super::Model;

/// A prompted number with its default and inclusive range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericField {
    pub label: &'static str,
    pub default: f64,
    pub min: f64,
    pub max: f64,
}

impl NumericField {
    pub fn contains(&self, value: f64) -> bool {
        self.min <= value && value <= self.max
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

pub const SEED: NumericField = NumericField {
    label: "Enter seed (integer)",
    default: 12.,
    min: 0.,
    max: u32::MAX as f64,
};

pub const GUIDANCE: NumericField = NumericField {
    label: "Enter guidance value",
    default: 3.5,
    min: 2.,
    max: 5.,
};

pub const SAFETY_TOLERANCE: NumericField = NumericField {
    label: "Enter safety tolerance",
    default: 5.,
    min: 1.,
    max: 5.,
};

pub const STEPS: NumericField = NumericField {
    label: "Enter number of steps",
    default: 30.,
    min: 1.,
    max: 50.,
};

pub const INTERVAL: NumericField = NumericField {
    label: "Enter interval",
    default: 2.,
    min: 1.,
    max: 4.,
};

pub const NUM_OUTPUTS: NumericField = NumericField {
    label: "Enter number of outputs",
    default: 1.,
    min: 1.,
    max: 4.,
};

pub const OUTPUT_QUALITY: NumericField = NumericField {
    label: "Enter output quality",
    default: 80.,
    min: 0.,
    max: 100.,
};

#[derive(
    Debug, Clone, Copy, Display, Serialize, Deserialize, PartialEq, Eq, Hash, EnumIter, Default,
)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "1:1")]
    #[strum(to_string = "1:1")]
    Ar1x1,
    #[serde(rename = "16:9")]
    #[strum(to_string = "16:9")]
    Ar16x9,
    #[serde(rename = "21:9")]
    #[strum(to_string = "21:9")]
    Ar21x9,
    #[serde(rename = "2:3")]
    #[strum(to_string = "2:3")]
    Ar2x3,
    #[serde(rename = "3:2")]
    #[strum(to_string = "3:2")]
    Ar3x2,
    #[serde(rename = "4:5")]
    #[strum(to_string = "4:5")]
    Ar4x5,
    #[serde(rename = "5:4")]
    #[strum(to_string = "5:4")]
    Ar5x4,
    #[serde(rename = "9:16")]
    #[strum(to_string = "9:16")]
    Ar9x16,
    #[serde(rename = "9:21")]
    #[strum(to_string = "9:21")]
    Ar9x21,
}

impl AspectRatio {
    /// `ar` followed by the ratio digits, e.g. `ar169` for 16:9
    pub fn code(&self) -> String {
        format!("ar{}", self.to_string().replace(':', ""))
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    Default,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Webp,
    Jpg,
    Png,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProParams {
    pub guidance: f64,
    pub safety_tolerance: u8,
    pub steps: u8,
    pub interval: f64,
}

impl Default for ProParams {
    fn default() -> Self {
        Self {
            guidance: GUIDANCE.default,
            safety_tolerance: SAFETY_TOLERANCE.default as u8,
            steps: STEPS.default as u8,
            interval: INTERVAL.default,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchnellParams {
    pub num_outputs: u8,
    pub output_format: OutputFormat,
    pub output_quality: u8,
    pub disable_safety_checker: bool,
}

impl Default for SchnellParams {
    fn default() -> Self {
        Self {
            num_outputs: NUM_OUTPUTS.default as u8,
            output_format: OutputFormat::default(),
            output_quality: OUTPUT_QUALITY.default as u8,
            disable_safety_checker: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ModelParams {
    Pro(ProParams),
    Schnell(SchnellParams),
}

impl ModelParams {
    pub fn defaults_for(model: Model) -> Self {
        match model {
            Model::FluxPro => Self::Pro(ProParams::default()),
            Model::FluxSchnell => Self::Schnell(SchnellParams::default()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub seed: u32,
    pub aspect_ratio: AspectRatio,
    pub params: ModelParams,
}

/// The `input` object of a prediction.
#[derive(Debug, Serialize)]
pub struct ModelInput<'a> {
    prompt: &'a str,
    seed: u32,
    aspect_ratio: AspectRatio,
    #[serde(flatten)]
    params: &'a ModelParams,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, model: Model) -> Self {
        Self {
            prompt: prompt.into(),
            seed: SEED.default as u32,
            aspect_ratio: AspectRatio::default(),
            params: ModelParams::defaults_for(model),
        }
    }

    pub fn model(&self) -> Model {
        match self.params {
            ModelParams::Pro(_) => Model::FluxPro,
            ModelParams::Schnell(_) => Model::FluxSchnell,
        }
    }

    /// Pulls every numeric field back into its documented range. The seed
    /// range covers all of `u32`, so it needs no treatment.
    pub fn clamped(mut self) -> Self {
        match &mut self.params {
            ModelParams::Pro(p) => {
                p.guidance = GUIDANCE.clamp(p.guidance);
                p.safety_tolerance = SAFETY_TOLERANCE.clamp(p.safety_tolerance.into()) as u8;
                p.steps = STEPS.clamp(p.steps.into()) as u8;
                p.interval = INTERVAL.clamp(p.interval);
            }
            ModelParams::Schnell(p) => {
                p.num_outputs = NUM_OUTPUTS.clamp(p.num_outputs.into()) as u8;
                p.output_quality = OUTPUT_QUALITY.clamp(p.output_quality.into()) as u8;
            }
        }
        self
    }

    pub fn input(&self) -> ModelInput<'_> {
        ModelInput {
            prompt: &self.prompt,
            seed: self.seed,
            aspect_ratio: self.aspect_ratio,
            params: &self.params,
        }
    }

    /// Flux Pro always delivers png, Schnell whatever was asked for.
    pub fn image_extension(&self) -> String {
        match &self.params {
            ModelParams::Pro(_) => OutputFormat::Png.to_string(),
            ModelParams::Schnell(p) => p.output_format.to_string(),
        }
    }
}
