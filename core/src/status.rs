//! Expected-status expression resolver
//!
//! The `statusCode` configuration key is an expression enumerating the HTTP
//! status codes that count as success, e.g. `"200-299"`, `"200-399;429"` or
//! `"200;error"`. The literal token `error` marks transport failures
//! (DNS, connect, TLS, timeout) as expected outcomes.

use std::collections::BTreeSet;
use std::fmt;

use crate::error::{Error, Result};

/// Lowest status code accepted by the expression grammar
const MIN_STATUS: u16 = 100;
/// Highest status code accepted by the expression grammar
const MAX_STATUS: u16 = 599;

/// A resolved set of acceptable request outcomes
///
/// Holds the numeric status codes plus an optional `error` token. The set is
/// immutable after parsing; membership checks are what the verifier uses to
/// classify every attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusCodeSet {
    codes: BTreeSet<u16>,
    expects_error: bool,
}

impl StatusCodeSet {
    /// Parse a status-code expression
    ///
    /// Grammar: items separated by `;`, where an item is a single code
    /// (`429`), an inclusive range (`200-299`) or the literal `error`.
    /// Whitespace is trimmed at the outer boundary. Out-of-range values and
    /// malformed items are configuration errors.
    pub fn parse(expression: &str) -> Result<Self> {
        let trimmed = expression.trim();
        if trimmed.is_empty() {
            return Err(Error::config("status code expression must not be empty"));
        }

        let mut codes = BTreeSet::new();
        let mut expects_error = false;

        for item in trimmed.split(';') {
            let item = item.trim();
            if item == "error" {
                expects_error = true;
            } else if let Some((lo, hi)) = item.split_once('-') {
                let lo = parse_code(lo)?;
                let hi = parse_code(hi)?;
                if lo > hi {
                    return Err(Error::Config(format!(
                        "invalid status code range '{item}': lower bound exceeds upper bound"
                    )));
                }
                codes.extend(lo..=hi);
            } else {
                codes.insert(parse_code(item)?);
            }
        }

        Ok(Self {
            codes,
            expects_error,
        })
    }

    /// Whether the given response status counts as expected
    pub fn matches_status(&self, status: u16) -> bool {
        self.codes.contains(&status)
    }

    /// Whether transport errors count as expected
    pub fn expects_error(&self) -> bool {
        self.expects_error
    }

    /// Canonical serialization of the set
    ///
    /// Consecutive codes collapse into ranges, the `error` token renders
    /// last. Parsing the rendered form yields an equal set.
    pub fn render(&self) -> String {
        let mut items: Vec<String> = Vec::new();
        let mut run: Option<(u16, u16)> = None;

        for &code in &self.codes {
            match run {
                Some((lo, hi)) if code == hi + 1 => run = Some((lo, code)),
                Some((lo, hi)) => {
                    items.push(render_run(lo, hi));
                    run = Some((code, code));
                }
                None => run = Some((code, code)),
            }
        }
        if let Some((lo, hi)) = run {
            items.push(render_run(lo, hi));
        }
        if self.expects_error {
            items.push("error".to_string());
        }

        items.join(";")
    }
}

impl fmt::Display for StatusCodeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

fn parse_code(raw: &str) -> Result<u16> {
    let raw = raw.trim();
    let code: u16 = raw
        .parse()
        .map_err(|_| Error::Config(format!("invalid status code '{raw}'")))?;
    if !(MIN_STATUS..=MAX_STATUS).contains(&code) {
        return Err(Error::Config(format!(
            "status code '{code}' is outside {MIN_STATUS}-{MAX_STATUS}"
        )));
    }
    Ok(code)
}

fn render_run(lo: u16, hi: u16) -> String {
    if lo == hi {
        lo.to_string()
    } else {
        format!("{lo}-{hi}")
    }
}
