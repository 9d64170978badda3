use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;

/// Body returned by `POST /api/token`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// How much validity an access token has left
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStatus {
    /// No token entered, or no issue time recorded
    Hidden,
    Valid { hours: i64, minutes: i64 },
    Warning { minutes_left: i64 },
    Expired,
}

impl TokenStatus {
    /// Evaluate a token issued at `issued` as of `now`
    pub fn at(
        issued: DateTime<Utc>,
        now: DateTime<Utc>,
        validity: Duration,
        warning: Duration,
    ) -> Self {
        let validity_ms = validity.as_millis() as i64;
        let warning_ms = warning.as_millis() as i64;
        let remaining = issued.timestamp_millis() + validity_ms - now.timestamp_millis();

        if remaining <= 0 {
            TokenStatus::Expired
        } else if remaining < warning_ms {
            TokenStatus::Warning {
                minutes_left: (remaining + 59_999) / 60_000,
            }
        } else {
            TokenStatus::Valid {
                hours: remaining / 3_600_000,
                minutes: (remaining % 3_600_000) / 60_000,
            }
        }
    }

    pub fn describe(&self) -> String {
        match self {
            TokenStatus::Hidden => String::new(),
            TokenStatus::Valid { hours, minutes } => {
                format!("Valid: {}h {}m left", hours, minutes)
            }
            TokenStatus::Warning { minutes_left } => format!("{} min left", minutes_left),
            TokenStatus::Expired => "Expired - please get a new token".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SIX_HOURS: Duration = Duration::from_secs(6 * 3600);
    const THIRTY_MINUTES: Duration = Duration::from_secs(30 * 60);

    fn issued() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 17, 9, 0, 0).unwrap()
    }

    fn status_after(elapsed: chrono::Duration) -> TokenStatus {
        TokenStatus::at(issued(), issued() + elapsed, SIX_HOURS, THIRTY_MINUTES)
    }

    #[test]
    fn test_fresh_token_is_valid() {
        assert_eq!(
            status_after(chrono::Duration::minutes(0)),
            TokenStatus::Valid {
                hours: 6,
                minutes: 0
            }
        );
        assert_eq!(
            status_after(chrono::Duration::minutes(95)),
            TokenStatus::Valid {
                hours: 4,
                minutes: 25
            }
        );
    }

    #[test]
    fn test_warning_in_last_half_hour() {
        let status = status_after(chrono::Duration::hours(5) + chrono::Duration::minutes(50));
        assert_eq!(status, TokenStatus::Warning { minutes_left: 10 });
        assert_eq!(status.describe(), "10 min left");

        // Partial minutes round up
        let status = status_after(chrono::Duration::hours(5) + chrono::Duration::seconds(50 * 60 + 30));
        assert_eq!(status, TokenStatus::Warning { minutes_left: 10 });
    }

    #[test]
    fn test_expired_after_six_hours() {
        assert_eq!(status_after(chrono::Duration::hours(6)), TokenStatus::Expired);
        assert_eq!(
            status_after(chrono::Duration::hours(6) + chrono::Duration::minutes(1)),
            TokenStatus::Expired
        );
    }

    #[test]
    fn test_boundary_at_thirty_minutes_is_still_valid() {
        assert_eq!(
            status_after(chrono::Duration::hours(5) + chrono::Duration::minutes(30)),
            TokenStatus::Valid {
                hours: 0,
                minutes: 30
            }
        );
    }
}
