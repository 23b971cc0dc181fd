// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ParamError {
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: String,
        min: String,
        max: String,
    },
}

/// A bounded numeric input
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Slider<T> {
    pub name: &'static str,
    pub label: &'static str,
    pub min: T,
    pub max: T,
    pub default: T,
    pub step: T,
}

impl<T: PartialOrd + Copy + Display> Slider<T> {
    pub fn contains(&self, value: T) -> bool {
        value >= self.min && value <= self.max
    }

    /// Pull a value into `[min, max]`; incomparable values (NaN) fall back to the default
    pub fn clamp(&self, value: T) -> T {
        if value < self.min {
            self.min
        } else if value > self.max {
            self.max
        } else if value >= self.min {
            value
        } else {
            self.default
        }
    }

    fn check(&self, value: T) -> Result<T, ParamError> {
        if self.contains(value) {
            Ok(value)
        } else {
            Err(ParamError::OutOfRange {
                field: self.name,
                value: value.to_string(),
                min: self.min.to_string(),
                max: self.max.to_string(),
            })
        }
    }
}

pub const TEMPERATURE: Slider<f32> = Slider {
    name: "temperature",
    label: "Temperature",
    min: 0.0,
    max: 1.0,
    default: 0.0,
    step: 0.1,
};

pub const MAX_TOKENS: Slider<u32> = Slider {
    name: "max_tokens",
    label: "Max Output Tokens",
    min: 10,
    max: 100,
    default: 30,
    step: 1,
};

pub const TOP_P: Slider<f32> = Slider {
    name: "top_p",
    label: "Top P",
    min: 0.1,
    max: 1.0,
    default: 0.95,
    step: 0.05,
};

pub const REPEAT_PENALTY: Slider<f32> = Slider {
    name: "repeat_penalty",
    label: "Repeat Penalty",
    min: 1.0,
    max: 2.0,
    default: 1.0,
    step: 0.1,
};

/// Sampling parameters handed to the engine on every generate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
    pub repeat_penalty: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: TEMPERATURE.default,
            max_tokens: MAX_TOKENS.default,
            top_p: TOP_P.default,
            repeat_penalty: REPEAT_PENALTY.default,
        }
    }
}

impl GenerationConfig {
    /// Reject any value outside its slider range
    pub fn validate(&self) -> Result<(), ParamError> {
        TEMPERATURE.check(self.temperature)?;
        MAX_TOKENS.check(self.max_tokens)?;
        TOP_P.check(self.top_p)?;
        REPEAT_PENALTY.check(self.repeat_penalty)?;
        Ok(())
    }

    /// Same values with every field clamped into its slider range
    pub fn clamped(&self) -> Self {
        Self {
            temperature: TEMPERATURE.clamp(self.temperature),
            max_tokens: MAX_TOKENS.clamp(self.max_tokens),
            top_p: TOP_P.clamp(self.top_p),
            repeat_penalty: REPEAT_PENALTY.clamp(self.repeat_penalty),
        }
    }
}
