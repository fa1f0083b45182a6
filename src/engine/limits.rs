// src/engine/limits.rs
//
// Input limits: byte, pixel and wall-clock caps chosen by policy.
// The global MAX_DIMENSION / MAX_PIXELS checks in decoder.rs always apply;
// these are the tighter, caller-selected ones.

use crate::error::{Result, StylizeError};
use std::str::FromStr;
use std::time::Instant;

const STRICT_MAX_PIXELS: u64 = 40_000_000; // ~8K x 5K
const LENIENT_MAX_PIXELS: u64 = 75_000_000; // generous but below global MAX_PIXELS
const STRICT_MAX_BYTES: u64 = 32 * 1024 * 1024;
const LENIENT_MAX_BYTES: u64 = 64 * 1024 * 1024;
const STRICT_TIMEOUT_MS: u64 = 30_000;
const LENIENT_TIMEOUT_MS: u64 = 120_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LimitsPolicy {
    Disabled,
    Strict,
    Lenient,
}

impl LimitsPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            LimitsPolicy::Disabled => "disabled",
            LimitsPolicy::Strict => "strict",
            LimitsPolicy::Lenient => "lenient",
        }
    }
}

impl FromStr for LimitsPolicy {
    type Err = StylizeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "disabled" | "off" | "none" => Ok(LimitsPolicy::Disabled),
            "strict" => Ok(LimitsPolicy::Strict),
            "lenient" => Ok(LimitsPolicy::Lenient),
            _ => Err(StylizeError::invalid_limits_policy(s.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LimitsConfig {
    pub policy: LimitsPolicy,
    pub max_pixels: Option<u64>,
    pub max_bytes: Option<u64>,
    pub timeout_ms: Option<u64>,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self::disabled()
    }
}

impl LimitsConfig {
    pub fn disabled() -> Self {
        Self {
            policy: LimitsPolicy::Disabled,
            max_pixels: None,
            max_bytes: None,
            timeout_ms: None,
        }
    }

    pub fn strict() -> Self {
        Self {
            policy: LimitsPolicy::Strict,
            max_pixels: Some(STRICT_MAX_PIXELS),
            max_bytes: Some(STRICT_MAX_BYTES),
            timeout_ms: Some(STRICT_TIMEOUT_MS),
        }
    }

    pub fn lenient() -> Self {
        Self {
            policy: LimitsPolicy::Lenient,
            max_pixels: Some(LENIENT_MAX_PIXELS),
            max_bytes: Some(LENIENT_MAX_BYTES),
            timeout_ms: Some(LENIENT_TIMEOUT_MS),
        }
    }

    pub fn apply_policy(policy: LimitsPolicy) -> Self {
        match policy {
            LimitsPolicy::Disabled => Self::disabled(),
            LimitsPolicy::Strict => Self::strict(),
            LimitsPolicy::Lenient => Self::lenient(),
        }
    }

    fn enabled(&self) -> bool {
        self.policy != LimitsPolicy::Disabled
    }

    pub fn enforce_source_len(&self, len: u64) -> Result<()> {
        if !self.enabled() {
            return Ok(());
        }
        match self.max_bytes {
            Some(limit) if len > limit => Err(StylizeError::source_too_large(len, limit)),
            _ => Ok(()),
        }
    }

    pub fn enforce_pixels(&self, width: u32, height: u32) -> Result<()> {
        if !self.enabled() {
            return Ok(());
        }
        let pixels = width as u64 * height as u64;
        match self.max_pixels {
            Some(limit) if pixels > limit => {
                Err(StylizeError::pixel_count_exceeds_limit(pixels, limit))
            }
            _ => Ok(()),
        }
    }

    /// Checked between stages; a running stage is never interrupted.
    pub fn enforce_timeout(&self, started_at: Instant, stage: &'static str) -> Result<()> {
        if !self.enabled() {
            return Ok(());
        }
        if let Some(limit_ms) = self.timeout_ms {
            let elapsed_ms = started_at.elapsed().as_millis() as u64;
            if elapsed_ms > limit_ms {
                return Err(StylizeError::timeout_exceeded(stage, elapsed_ms, limit_ms));
            }
        }
        Ok(())
    }
}
