use std::path::Path;

use appcast_core::{RemindLater, RemindLaterUnit};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppcastSettings {
    #[serde(default)]
    pub feed_url: Option<String>,

    #[serde(default)]
    pub publisher: Option<String>,

    #[serde(default)]
    pub app_name: Option<String>,

    #[serde(default)]
    pub installed_version: Option<String>,

    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    #[serde(default = "default_remind_later_amount")]
    pub remind_later_amount: u32,

    #[serde(default)]
    pub remind_later_unit: RemindLaterUnit,

    #[serde(default)]
    pub open_download_page: bool,

    #[serde(default)]
    pub debug_logging: bool,

    #[serde(default = "default_max_log_size_bytes")]
    pub max_log_size_bytes: u64,
}

fn default_http_timeout() -> u64 {
    10
}

fn default_remind_later_amount() -> u32 {
    2
}

fn default_max_log_size_bytes() -> u64 {
    5 * 1024 * 1024
}

impl Default for AppcastSettings {
    fn default() -> Self {
        Self {
            feed_url: None,
            publisher: None,
            app_name: None,
            installed_version: None,
            http_timeout_secs: default_http_timeout(),
            remind_later_amount: default_remind_later_amount(),
            remind_later_unit: RemindLaterUnit::default(),
            open_download_page: false,
            debug_logging: false,
            max_log_size_bytes: default_max_log_size_bytes(),
        }
    }
}

impl AppcastSettings {
    /// Load settings from `path`. A missing file yields defaults.
    ///
    /// Runs before logging is set up, so problems are returned for the caller
    /// to report once it is.
    pub fn try_load_from(path: &Path) -> Result<Self, AppError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(error) => {
                return Err(AppError::invalid_setting(
                    "settings file",
                    format!("{}: {error}", path.display()),
                ));
            }
        };
        serde_json::from_str(&content).map_err(|error| {
            AppError::invalid_setting("settings file", format!("{}: {error}", path.display()))
        })
    }

    pub fn remind_later(&self) -> RemindLater {
        RemindLater::new(self.remind_later_amount, self.remind_later_unit)
    }
}
