use once_cell::sync::Lazy;
use regex::Regex;

/// Redaction for bound query arguments before they reach the query log.
///
/// Patterns are best-effort. Set `logging.enable_sql_query_logging = false`
/// when argument values must never be written anywhere.
static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}").expect("valid email pattern")
});

static CARD_NUMBER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:\d[ -]?){12,15}\d\b").expect("valid card pattern"));

static PHONE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\+?\d{1,3}[-. ]?)?\(?\d{3}\)?[-. ]\d{3}[-. ]\d{4}").expect("valid phone pattern")
});

/// Longest argument text written to the log verbatim.
pub const MAX_LOGGED_ARGUMENT_LEN: usize = 64;

/// Masks personal data inside a textual argument value.
pub fn scrub(input: &str) -> String {
    let scrubbed = EMAIL_REGEX.replace_all(input, "[EMAIL]");
    let scrubbed = CARD_NUMBER_REGEX.replace_all(&scrubbed, "[CARD]");
    PHONE_REGEX.replace_all(&scrubbed, "[PHONE]").into_owned()
}

/// Scrubs and shortens an argument for logging.
pub fn scrub_argument(input: &str) -> String {
    let scrubbed = scrub(input);
    if scrubbed.chars().count() <= MAX_LOGGED_ARGUMENT_LEN {
        return scrubbed;
    }
    let head: String = scrubbed.chars().take(MAX_LOGGED_ARGUMENT_LEN).collect();
    format!("{}...({} chars)", head, scrubbed.chars().count())
}
