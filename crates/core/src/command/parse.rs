//! Request extraction from raw mail.

use chrono::NaiveDate;
use mailparse::{MailHeaderMap, ParsedMail};
use regex_lite::Regex;

use super::error::MailboxError;
use crate::orchestrator::DateRange;

/// The parts of a message the channel cares about.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedMessage {
    /// Subject with encoded words decoded.
    pub subject: String,
    pub message_id: Option<String>,
    /// First plain-text part of the body.
    pub body: Option<String>,
}

pub fn parse_message(raw: &[u8]) -> Result<ParsedMessage, MailboxError> {
    let mail = mailparse::parse_mail(raw).map_err(|e| MailboxError::Parse(e.to_string()))?;

    Ok(ParsedMessage {
        subject: mail.headers.get_first_value("Subject").unwrap_or_default(),
        message_id: mail
            .headers
            .get_first_value("Message-ID")
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty()),
        body: first_plain_text(&mail),
    })
}

/// A single-part message yields its body whatever its type; a multipart one
/// yields its first `text/plain` leaf, depth first.
fn first_plain_text(mail: &ParsedMail<'_>) -> Option<String> {
    if mail.subparts.is_empty() {
        return mail.get_body().ok();
    }
    mail.subparts.iter().find_map(plain_text_leaf)
}

fn plain_text_leaf(part: &ParsedMail<'_>) -> Option<String> {
    if part.subparts.is_empty() {
        if part.ctype.mimetype.eq_ignore_ascii_case("text/plain") {
            return part.get_body().ok();
        }
        return None;
    }
    part.subparts.iter().find_map(plain_text_leaf)
}

/// Case-insensitive subject token match.
pub fn subject_matches(subject: &str, token: &str) -> bool {
    subject.to_uppercase().contains(&token.to_uppercase())
}

/// Finds the `YYYY-MM-DD` value following `label:` in a body.
pub fn extract_date(body: &str, label: &str) -> Option<NaiveDate> {
    let pattern = format!(r"{}:\s*(\d{{4}}-\d{{2}}-\d{{2}})", regex_lite::escape(label));
    let re = Regex::new(&pattern).ok()?;
    let value = re.captures(body)?.get(1)?.as_str();
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

/// Both dates of a request, in order. `None` if either is missing, invalid,
/// or the range is reversed.
pub fn extract_range(body: &str, begin_label: &str, end_label: &str) -> Option<DateRange> {
    let begin = extract_date(body, begin_label)?;
    let end = extract_date(body, end_label)?;
    DateRange::new(begin, end)
}
