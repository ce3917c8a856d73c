use appcast_core::{CheckResult, DecisionState};
use chrono::{DateTime, Utc};
use log::info;

use crate::error::AppError;

pub fn describe_result(result: &CheckResult) -> String {
    let Some(latest) = &result.latest_version else {
        return format!(
            "No usable release found in the feed (installed {})",
            result.installed_version
        );
    };

    if !result.update_available {
        return if latest > &result.installed_version {
            format!(
                "Version {latest} is available but was skipped (installed {})",
                result.installed_version
            )
        } else {
            format!("Up to date ({})", result.installed_version)
        };
    }

    let mut lines = vec![match &result.title {
        Some(title) => format!("Update available: {title} ({latest})"),
        None => format!("Update available: {latest}"),
    }];
    lines.push(format!("  installed: {}", result.installed_version));
    if let Some(url) = &result.download_url {
        lines.push(format!("  download:  {url}"));
    }
    if let Some(url) = &result.changelog_url {
        lines.push(format!("  changelog: {url}"));
    }
    lines.join("\n")
}

pub fn describe_deferred(until: DateTime<Utc>) -> String {
    format!("Checks postponed until {}", until.to_rfc3339())
}

pub fn describe_state(state: &DecisionState, now: DateTime<Utc>) -> String {
    let skip = match state.active_skip() {
        Some(version) => format!("skipping {version} and older"),
        None => "no skipped version".to_string(),
    };
    let reminder = match state.pending_reminder(now) {
        Some(deadline) => format!("checks postponed until {}", deadline.to_rfc3339()),
        None => "no pending reminder".to_string(),
    };
    format!("{skip}; {reminder}")
}

/// Where to send the user for an available update: the installer, or the
/// release notes when the feed has no download link.
pub fn download_target(result: &CheckResult) -> Option<&str> {
    if !result.update_available {
        return None;
    }
    result
        .download_url
        .as_deref()
        .or(result.changelog_url.as_deref())
}

pub fn open_download_page(result: &CheckResult) -> Result<(), AppError> {
    if let Some(target) = download_target(result) {
        info!("Opening {target}");
        open::that(target).map_err(|error| AppError::open_failed(target, error))?;
    }
    Ok(())
}
