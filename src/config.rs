use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::reveal::{ProfileId, RevealTiming};
use crate::util::{is_local_endpoint_url, parse_millis};

const DEFAULT_API_URL: &str = "http://localhost:8080/api/argue";
const DEFAULT_STYLE_PROFILE: &str = "header_message";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api_key: Option<String>,
    pub api_url: String,
    pub capsule_id: Option<String>,
    pub style_profile: String,
    pub first_delay: Duration,
    pub subsequent_delay: Duration,
    pub diff_duration: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        let api_url =
            std::env::var("ARGUE_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let api_key = non_blank_env("ARGUE_API_KEY");
        let capsule_id = non_blank_env("ARGUE_CAPSULE_ID");
        let style_profile = std::env::var("REVEAL_STYLE_PROFILE")
            .unwrap_or_else(|_| DEFAULT_STYLE_PROFILE.to_string());
        let defaults = RevealTiming::default();

        Ok(Self {
            api_key,
            api_url,
            capsule_id,
            style_profile,
            first_delay: millis_env("REVEAL_FIRST_DELAY_MS", defaults.first_delay)?,
            subsequent_delay: millis_env("REVEAL_SUBSEQUENT_DELAY_MS", defaults.subsequent_delay)?,
            diff_duration: millis_env("REVEAL_DIFF_DURATION_MS", defaults.diff_duration)?,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            bail!(
                "Invalid ARGUE_API_URL '{}': expected http:// or https:// URL",
                self.api_url
            );
        }

        if !self.is_local_endpoint() && self.api_key.is_none() {
            bail!(
                "ARGUE_API_KEY must be set for non-local endpoints (url: '{}')",
                self.api_url
            );
        }

        if ProfileId::parse(&self.style_profile).is_none() {
            bail!(
                "Unknown REVEAL_STYLE_PROFILE '{}': expected header_message or welcome_message",
                self.style_profile
            );
        }

        Ok(())
    }

    pub fn reveal_timing(&self) -> RevealTiming {
        RevealTiming {
            first_delay: self.first_delay,
            subsequent_delay: self.subsequent_delay,
            diff_duration: self.diff_duration,
        }
    }

    pub fn profile_id(&self) -> ProfileId {
        ProfileId::parse(&self.style_profile).unwrap_or(ProfileId::HeaderMessage)
    }

    pub fn is_local_endpoint(&self) -> bool {
        is_local_endpoint_url(&self.api_url)
    }
}

fn non_blank_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn millis_env(name: &str, default: Duration) -> Result<Duration> {
    match std::env::var(name) {
        Ok(raw) => match parse_millis(&raw) {
            Some(duration) => Ok(duration),
            None => bail!("Invalid {name} '{raw}': expected whole milliseconds"),
        },
        Err(_) => Ok(default),
    }
}
