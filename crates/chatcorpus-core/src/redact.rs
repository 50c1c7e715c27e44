//! PII masking for chat text.
//!
//! Three substitutions run in a fixed order, each replacing every full match
//! with one placeholder token:
//!
//! 1. Mobile numbers: exactly 11 digits `1[3-9]xxxxxxxxx`, not touching other digits
//! 2. Email addresses: `local@domain.tld` over `[A-Za-z0-9._-]`
//! 3. National ID numbers: 18 characters, `RRRRRR YYYY MM DD SSS C` with year
//!    19xx/20xx, month 01-12, day 01-31 and a check character of a digit or
//!    `X`/`x`, not touching other digits
//!
//! The `regex` crate has no look-around, so the "not touching other digits"
//! rule is enforced by matching whole ASCII digit runs and classifying them.

use std::sync::OnceLock;

use regex::{Captures, Regex};

pub const PHONE_TOKEN: &str = "[PHONE_REMOVED]";
pub const EMAIL_TOKEN: &str = "[EMAIL_REMOVED]";
pub const ID_TOKEN: &str = "[ID_REMOVED]";

static DIGIT_RUN: OnceLock<Regex> = OnceLock::new();
static DIGIT_RUN_WITH_CHECK: OnceLock<Regex> = OnceLock::new();
static EMAIL: OnceLock<Regex> = OnceLock::new();
static PHONE_BODY: OnceLock<Regex> = OnceLock::new();
static ID_BODY: OnceLock<Regex> = OnceLock::new();

fn digit_run() -> &'static Regex {
    DIGIT_RUN.get_or_init(|| Regex::new(r"[0-9]+").expect("valid digit run regex"))
}

fn digit_run_with_check() -> &'static Regex {
    DIGIT_RUN_WITH_CHECK
        .get_or_init(|| Regex::new(r"[0-9]+[Xx]?").expect("valid id candidate regex"))
}

fn email() -> &'static Regex {
    EMAIL.get_or_init(|| {
        Regex::new(r"[a-zA-Z0-9._-]+@[a-zA-Z0-9._-]+\.[a-zA-Z0-9._-]+").expect("valid email regex")
    })
}

fn phone_body() -> &'static Regex {
    PHONE_BODY.get_or_init(|| Regex::new(r"^1[3-9][0-9]{9}$").expect("valid phone regex"))
}

/// First 17 characters of an ID number (everything but the check character).
fn id_body() -> &'static Regex {
    ID_BODY.get_or_init(|| {
        Regex::new(r"^[0-9]{6}(?:19|20)[0-9]{2}(?:0[1-9]|1[0-2])(?:0[1-9]|[12][0-9]|3[01])[0-9]{3}$")
            .expect("valid id regex")
    })
}

/// Stateless PII masker.
#[derive(Debug, Clone, Copy, Default)]
pub struct Redactor;

impl Redactor {
    pub fn new() -> Self {
        Self
    }

    pub fn mask(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }

        let masked = mask_phones(text);
        let masked = email().replace_all(&masked, EMAIL_TOKEN);
        mask_ids(&masked)
    }
}

fn mask_phones(text: &str) -> String {
    digit_run()
        .replace_all(text, |caps: &Captures| {
            let run = &caps[0];
            if phone_body().is_match(run) {
                PHONE_TOKEN.to_owned()
            } else {
                run.to_owned()
            }
        })
        .into_owned()
}

fn mask_ids(text: &str) -> String {
    digit_run_with_check()
        .replace_all(text, |caps: &Captures| {
            let candidate = &caps[0];
            let end = caps.get(0).map_or(text.len(), |m| m.end());
            let (digits, check) = candidate.split_at(
                candidate
                    .find(|c: char| !c.is_ascii_digit())
                    .unwrap_or(candidate.len()),
            );

            // 18 digits: the last digit is the check character; a trailing X stays.
            if digits.len() == 18 && id_body().is_match(&digits[..17]) {
                return format!("{ID_TOKEN}{check}");
            }

            // 17 digits plus an X check character that is not followed by a digit.
            let followed_by_digit = text[end..].starts_with(|c: char| c.is_ascii_digit());
            if digits.len() == 17
                && !check.is_empty()
                && !followed_by_digit
                && id_body().is_match(digits)
            {
                return ID_TOKEN.to_owned();
            }

            candidate.to_owned()
        })
        .into_owned()
}
