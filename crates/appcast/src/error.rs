#[derive(Debug)]
pub enum AppError {
    MissingSetting {
        setting: &'static str,
    },
    InvalidSetting {
        setting: &'static str,
        details: String,
    },
    UpdateCheckFailed {
        details: appcast_core::CheckError,
    },
    StoreFailed {
        action: &'static str,
        details: appcast_core::StoreError,
    },
    HttpClient {
        details: reqwest::Error,
    },
    OpenFailed {
        target: String,
        details: std::io::Error,
    },
}

impl AppError {
    pub fn missing_setting(setting: &'static str) -> Self {
        Self::MissingSetting { setting }
    }

    pub fn invalid_setting(setting: &'static str, details: impl std::fmt::Display) -> Self {
        Self::InvalidSetting {
            setting,
            details: details.to_string(),
        }
    }

    pub fn update_check_failed(details: appcast_core::CheckError) -> Self {
        Self::UpdateCheckFailed { details }
    }

    pub fn store_failed(action: &'static str, details: appcast_core::StoreError) -> Self {
        Self::StoreFailed { action, details }
    }

    pub fn http_client(details: reqwest::Error) -> Self {
        Self::HttpClient { details }
    }

    pub fn open_failed(target: impl Into<String>, details: std::io::Error) -> Self {
        Self::OpenFailed {
            target: target.into(),
            details,
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingSetting { setting } => write!(
                f,
                "No {setting} configured; pass it on the command line or add it to the settings file"
            ),
            Self::InvalidSetting { setting, details } => write!(f, "Invalid {setting}: {details}"),
            Self::UpdateCheckFailed { details } => write!(f, "Update check failed: {details}"),
            Self::StoreFailed { action, details } => write!(f, "Failed to {action}: {details}"),
            Self::HttpClient { details } => write!(f, "Failed to build HTTP client: {details}"),
            Self::OpenFailed { target, details } => write!(f, "Failed to open {target}: {details}"),
        }
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::AppError;

    #[test]
    fn missing_setting_names_the_setting() {
        assert_eq!(
            AppError::missing_setting("feed URL").to_string(),
            "No feed URL configured; pass it on the command line or add it to the settings file"
        );
    }

    #[test]
    fn invalid_setting_includes_details() {
        let error = AppError::invalid_setting("installed version", "component 2 is not a number");
        assert_eq!(
            error.to_string(),
            "Invalid installed version: component 2 is not a number"
        );
    }

    #[test]
    fn open_failed_includes_target() {
        let error = AppError::open_failed(
            "https://example.com/setup.exe",
            std::io::Error::new(std::io::ErrorKind::NotFound, "no browser"),
        );
        assert_eq!(
            error.to_string(),
            "Failed to open https://example.com/setup.exe: no browser"
        );
    }

    #[test]
    fn update_check_failed_wraps_engine_error() {
        let error = AppError::update_check_failed(appcast_core::CheckError::Internal(
            "worker panicked".to_string(),
        ));
        assert!(error.to_string().starts_with("Update check failed: "));
        assert!(error.to_string().contains("worker panicked"));
    }
}
