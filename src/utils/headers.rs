use std::collections::BTreeMap;

/// Header name to value. Names keep the case they were supplied with.
pub type Headers = BTreeMap<String, String>;

/// Inserts `name`, replacing any existing entry whose name matches case-insensitively.
pub fn insert_header(headers: &mut Headers, name: &str, value: impl Into<String>) {
    let existing: Vec<String> = headers
        .keys()
        .filter(|key| key.eq_ignore_ascii_case(name))
        .cloned()
        .collect();
    for key in existing {
        headers.remove(&key);
    }
    headers.insert(name.to_string(), value.into());
}

pub fn get_header<'a>(headers: &'a Headers, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

pub fn has_header(headers: &Headers, name: &str) -> bool {
    get_header(headers, name).is_some()
}

/// Layers `next` over `base`; later layers win on case-insensitive collisions.
pub fn merge_headers<'a>(layers: impl IntoIterator<Item = &'a Headers>) -> Headers {
    let mut merged = Headers::new();
    for layer in layers {
        for (name, value) in layer {
            insert_header(&mut merged, name, value.clone());
        }
    }
    merged
}
