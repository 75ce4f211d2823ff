//! Time formatting utilities.

use chrono::{DateTime, NaiveDate, Utc};

/// Current UTC calendar day.
#[must_use]
pub fn utc_today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Format the distance from `now` to a future time.
#[must_use]
pub fn format_countdown(target: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let duration = target.signed_duration_since(now);

    if duration.num_seconds() <= 0 {
        return "now".to_string();
    }

    let hours = duration.num_hours();
    let minutes = duration.num_minutes() % 60;

    if hours > 24 {
        let days = hours / 24;
        format!("in {days} day{}", if days == 1 { "" } else { "s" })
    } else if hours > 0 {
        format!("in {hours}h {minutes}m")
    } else if minutes > 0 {
        format!("in {minutes}m")
    } else {
        let seconds = duration.num_seconds();
        format!("in {seconds}s")
    }
}

/// Format a relative time (past or future) against `now`.
#[must_use]
pub fn format_relative_time(target: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let duration = now.signed_duration_since(target);

    if duration.num_seconds().abs() < 60 {
        return "just now".to_string();
    }

    let minutes = duration.num_minutes().abs();
    let hours = duration.num_hours().abs();
    let days = duration.num_days().abs();

    let suffix = if duration.num_seconds() > 0 {
        "ago"
    } else {
        "from now"
    };

    if days > 0 {
        format!("{days} day{} {suffix}", if days == 1 { "" } else { "s" })
    } else if hours > 0 {
        format!("{hours} hour{} {suffix}", if hours == 1 { "" } else { "s" })
    } else {
        format!(
            "{minutes} minute{} {suffix}",
            if minutes == 1 { "" } else { "s" }
        )
    }
}

/// Describe an optional expiry: "no expiry", "expires in 2h 5m" or "expired 3 hours ago".
#[must_use]
pub fn format_expiry(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    match expires_at {
        None => "no expiry".to_string(),
        Some(at) if at <= now => format!("expired {}", format_relative_time(at, now)),
        Some(at) => format!("expires {}", format_countdown(at, now)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn countdown_hours() {
        let now = Utc::now();
        let target = now + Duration::hours(3) + Duration::minutes(30);
        assert_eq!(format_countdown(target, now), "in 3h 30m");
    }

    #[test]
    fn countdown_days() {
        let now = Utc::now();
        let result = format_countdown(now + Duration::days(3), now);
        assert_eq!(result, "in 3 days");
    }

    #[test]
    fn relative_past() {
        let now = Utc::now();
        assert_eq!(format_relative_time(now - Duration::hours(1), now), "1 hour ago");
        assert_eq!(format_relative_time(now, now), "just now");
    }

    #[test]
    fn expiry_descriptions() {
        let now = Utc::now();
        assert_eq!(format_expiry(None, now), "no expiry");
        assert_eq!(
            format_expiry(Some(now - Duration::hours(3)), now),
            "expired 3 hours ago"
        );
        assert_eq!(
            format_expiry(Some(now + Duration::minutes(10)), now),
            "expires in 10m"
        );
    }
}
