use authload_http::HttpResponse;
use serde_json::Value;

/// Finds a bearer credential in a login response.
#[derive(Debug, Clone)]
pub struct TokenExtractor {
    paths: Vec<Vec<String>>,
}

impl TokenExtractor {
    /// `candidates` are dotted JSON paths such as `data.accessToken`.
    pub fn new<S: AsRef<str>>(candidates: &[S]) -> Self {
        let paths = candidates
            .iter()
            .map(|c| c.as_ref().split('.').map(str::to_string).collect())
            .collect();
        Self { paths }
    }

    /// The `authorization` header wins; otherwise the first candidate path holding a
    /// non-empty string.
    pub fn extract(&self, res: &HttpResponse) -> Option<String> {
        if let Some(h) = res.header("authorization") {
            let token = match h.split_once(' ') {
                Some((_, rest)) => rest,
                None => h,
            };
            if !token.is_empty() {
                return Some(token.to_string());
            }
        }

        let body: Value = serde_json::from_slice(&res.body).ok()?;
        self.paths.iter().find_map(|path| {
            let mut v = &body;
            for key in path {
                v = v.as_object()?.get(key)?;
            }
            match v {
                Value::String(s) if !s.is_empty() => Some(s.clone()),
                _ => None,
            }
        })
    }
}
