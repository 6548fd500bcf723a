use crate::constants::{headers::CUSTOM_PREFIX, limits};
use crate::services::logger::Logger;
use crate::utils::headers::{insert_header, Headers};
use crate::utils::text::strip_all_control_chars;
use once_cell::sync::Lazy;
use regex::Regex;

static HEADER_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("header name regex"));

/// Builds the custom header set from `HEADER_*` entries.
///
/// The prefix is matched case-insensitively and stripped; the remainder keeps its case and
/// becomes the header name. Invalid entries are skipped with a warning, and anything past
/// the entry cap is ignored.
pub fn collect_custom_headers(vars: &[(String, String)], logger: &Logger) -> Headers {
    let mut headers = Headers::new();
    let mut ignored = 0usize;

    for (key, raw_value) in vars {
        if key.len() <= CUSTOM_PREFIX.len()
            || !key.is_char_boundary(CUSTOM_PREFIX.len())
            || !key[..CUSTOM_PREFIX.len()].eq_ignore_ascii_case(CUSTOM_PREFIX)
        {
            continue;
        }
        let name = &key[CUSTOM_PREFIX.len()..];

        if name.len() > limits::MAX_HEADER_NAME_LENGTH || !HEADER_NAME.is_match(name) {
            logger.warn(
                "Skipping custom header with invalid name",
                Some(&serde_json::json!({ "variable": key })),
            );
            continue;
        }

        let value = strip_all_control_chars(raw_value);
        if value.len() > limits::MAX_HEADER_VALUE_LENGTH {
            logger.warn(
                "Skipping custom header with oversized value",
                Some(&serde_json::json!({
                    "variable": key,
                    "bytes": value.len(),
                    "max_bytes": limits::MAX_HEADER_VALUE_LENGTH,
                })),
            );
            continue;
        }

        if headers.len() >= limits::MAX_CUSTOM_HEADERS {
            ignored += 1;
            continue;
        }
        insert_header(&mut headers, name, value);
    }

    if ignored > 0 {
        logger.warn(
            "Custom header limit reached; remaining entries ignored",
            Some(&serde_json::json!({
                "max_headers": limits::MAX_CUSTOM_HEADERS,
                "ignored": ignored,
            })),
        );
    }

    headers
}
