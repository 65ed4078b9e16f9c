use std::sync::OnceLock;

use regex::Regex;

use crate::error::SyncError;

/// LinkedIn "application sent" notifications; the company name only appears
/// in the snippet.
pub const LINKEDIN_JOBS_SENDER: &str = "LinkedIn <jobs-listings@linkedin.com>";
const LINKEDIN_START_MARKER: &str = "Good luck!";
const LINKEDIN_END_MARKER: &str = "Applied";

fn no_reply_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)no[^a-z0-9@\s]{0,2}reply@").expect("compile no-reply regex")
    })
}

/// Turns a raw `From` value into something readable for the sheet.
///
/// Rules run in order:
/// 1. the LinkedIn jobs sender is replaced by the company named between
///    `Good luck!` and `Applied` in the snippet;
/// 2. otherwise an `<address>` is removed, or unwrapped when it is the whole
///    value;
/// 3. a value wrapped in quotes loses every quote character;
/// 4. a `no-reply@` style address keeps whichever side of the pattern is
///    non-empty, preferring the left.
///
/// Rules 3 and 4 apply after either of the first two.
pub fn normalize(from: &str, snippet: &str) -> Result<String, SyncError> {
    let value = if from == LINKEDIN_JOBS_SENDER {
        company_from_linkedin_snippet(snippet)?
    } else {
        strip_address(from)
    };

    Ok(strip_no_reply(&strip_quotes(&value)))
}

fn company_from_linkedin_snippet(snippet: &str) -> Result<String, SyncError> {
    let after_start = snippet
        .split_once(LINKEDIN_START_MARKER)
        .map(|(_, rest)| rest)
        .ok_or_else(|| {
            SyncError::Parse(format!(
                "linkedin snippet has no '{LINKEDIN_START_MARKER}' marker"
            ))
        })?;
    let (company, _) = after_start.split_once(LINKEDIN_END_MARKER).ok_or_else(|| {
        SyncError::Parse(format!(
            "linkedin snippet has no '{LINKEDIN_END_MARKER}' marker after '{LINKEDIN_START_MARKER}'"
        ))
    })?;
    Ok(company.trim().to_string())
}

fn strip_address(value: &str) -> String {
    let (Some(start), Some(end)) = (value.find('<'), value.rfind('>')) else {
        return value.to_string();
    };
    if end < start {
        return value.to_string();
    }

    let outside = format!("{}{}", &value[..start], &value[end + 1..]);
    if outside.trim().is_empty() {
        value[start + 1..end].trim().to_string()
    } else {
        outside.trim().to_string()
    }
}

fn strip_quotes(value: &str) -> String {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return value.replace(quote, "").trim().to_string();
        }
    }
    value.to_string()
}

fn strip_no_reply(value: &str) -> String {
    let Some(found) = no_reply_pattern().find(value) else {
        return value.to_string();
    };

    let left = value[..found.start()]
        .trim()
        .trim_end_matches(|c: char| !c.is_alphanumeric())
        .trim();
    let right = value[found.end()..].trim();
    if !left.is_empty() {
        left.to_string()
    } else if !right.is_empty() {
        right.to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::{normalize, LINKEDIN_JOBS_SENDER};
    use crate::error::SyncError;

    #[test]
    fn linkedin_sender_is_replaced_by_company_from_snippet() {
        let snippet = "Your application was sent. Good luck! Acme Corp. Applied on October 3";
        assert_eq!(
            normalize(LINKEDIN_JOBS_SENDER, snippet).expect("normalize"),
            "Acme Corp."
        );
    }

    #[test]
    fn linkedin_snippet_without_markers_is_a_parse_error() {
        for snippet in ["", "Good luck! but nothing else", "Applied on Monday"] {
            match normalize(LINKEDIN_JOBS_SENDER, snippet) {
                Err(SyncError::Parse(_)) => {}
                other => panic!("expected ParseError for {snippet:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn quoted_display_name_loses_address_and_quotes() {
        assert_eq!(
            normalize("\"John Doe\" <john@x.com>", "").expect("normalize"),
            "John Doe"
        );
    }

    #[test]
    fn display_name_loses_address() {
        assert_eq!(
            normalize("Acme Recruiting <talent@acme.com>", "").expect("normalize"),
            "Acme Recruiting"
        );
    }

    #[test]
    fn bare_bracketed_address_is_unwrapped() {
        assert_eq!(
            normalize("<hr@initech.com>", "").expect("normalize"),
            "hr@initech.com"
        );
    }

    #[test]
    fn no_reply_keeps_the_domain_side_when_left_is_empty() {
        assert_eq!(
            normalize("no-reply@company.com", "").expect("normalize"),
            "company.com"
        );
        assert_eq!(
            normalize("<NoReply@globex.com>", "").expect("normalize"),
            "globex.com"
        );
        assert_eq!(
            normalize("no_reply@hooli.io", "").expect("normalize"),
            "hooli.io"
        );
    }

    #[test]
    fn no_reply_keeps_the_left_side_when_present() {
        assert_eq!(
            normalize("Initech Careers noreply@initech.com", "").expect("normalize"),
            "Initech Careers"
        );
    }

    #[test]
    fn rules_chain_quotes_then_no_reply() {
        assert_eq!(
            normalize("\"no-reply@workday.com\"", "").expect("normalize"),
            "workday.com"
        );
    }

    #[test]
    fn plain_values_pass_through() {
        assert_eq!(
            normalize("recruiter@startup.dev", "").expect("normalize"),
            "recruiter@startup.dev"
        );
        assert_eq!(normalize("", "").expect("normalize"), "");
    }
}
