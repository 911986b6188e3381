pub(super) fn has_header(headers: &[(String, String)], name: &str) -> bool {
    headers.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
}

/// Value for the `Host` header; the port is kept unless it is the scheme default.
pub(super) fn host_header_value(parsed: &url::Url) -> Option<String> {
    let host = parsed.host_str()?;
    match parsed.port() {
        Some(port) => Some(format!("{host}:{port}")),
        None => Some(host.to_string()),
    }
}

/// Lowercases names and joins repeated headers with ", ".
pub(super) fn merge_headers(headers: &http::HeaderMap) -> Vec<(String, String)> {
    let mut merged: Vec<(String, String)> = Vec::with_capacity(headers.keys_len());
    for (name, value) in headers.iter() {
        let key = name.as_str().to_ascii_lowercase();
        let v = String::from_utf8_lossy(value.as_bytes()).into_owned();
        match merged.iter_mut().find(|(k, _)| *k == key) {
            Some((_, cur)) => {
                if !cur.is_empty() {
                    cur.push_str(", ");
                }
                cur.push_str(&v);
            }
            None => merged.push((key, v)),
        }
    }
    merged.sort_by(|a, b| a.0.cmp(&b.0));
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_header_keeps_explicit_port() {
        let u = url::Url::parse("http://127.0.0.1:8080/api").unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(host_header_value(&u).as_deref(), Some("127.0.0.1:8080"));

        let u = url::Url::parse("https://auth.local/x").unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(host_header_value(&u).as_deref(), Some("auth.local"));
    }

    #[test]
    fn repeated_headers_are_joined_and_lowercased() {
        let mut map = http::HeaderMap::new();
        map.append("Set-Cookie", http::HeaderValue::from_static("a=1"));
        map.append("set-cookie", http::HeaderValue::from_static("b=2"));
        map.insert("Authorization", http::HeaderValue::from_static("Bearer t"));

        let merged = merge_headers(&map);
        assert_eq!(
            merged,
            vec![
                ("authorization".to_string(), "Bearer t".to_string()),
                ("set-cookie".to_string(), "a=1, b=2".to_string()),
            ]
        );
    }
}
