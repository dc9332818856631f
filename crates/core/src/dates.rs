//! Date display for the table of contents.

use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::macros::format_description;
use time::{Date, OffsetDateTime};

use crate::Article;

/// `January 15, 2024`
const LONG_DATE: &[time::format_description::BorrowedFormatItem<'static>] =
    format_description!("[month repr:long] [day padding:none], [year]");

/// `January 15, 2024 at 3:04 PM`
const LONG_TIMESTAMP: &[time::format_description::BorrowedFormatItem<'static>] =
    format_description!("[month repr:long] [day padding:none], [year] at [hour repr:12 padding:none]:[minute] [period]");

const ISO_DATE: &[time::format_description::BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// The date to show for an article: the published display text, else the
/// raw timestamp rendered as a long-form date, else the raw timestamp as is.
pub fn display_date(article: &Article) -> Option<String> {
    if let Some(display) = &article.published_display {
        return Some(display.clone());
    }
    let raw = article.published_at.as_deref()?;
    Some(long_date(raw).unwrap_or_else(|| raw.to_string()))
}

/// Parses an RFC 3339, RFC 2822 or `YYYY-MM-DD` timestamp into `January 15, 2024`.
pub fn long_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let date = OffsetDateTime::parse(raw, &Rfc3339)
        .or_else(|_| OffsetDateTime::parse(raw, &Rfc2822))
        .map(|dt| dt.date())
        .or_else(|_| Date::parse(raw, ISO_DATE))
        .ok()?;
    date.format(LONG_DATE).ok()
}

/// Formats a wall-clock time as `January 15, 2024 at 3:04 PM`.
pub fn long_timestamp(at: OffsetDateTime) -> String {
    at.format(LONG_TIMESTAMP).unwrap_or_else(|_| at.to_string())
}

/// The current local time, or UTC when the local offset cannot be determined.
pub fn now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}
