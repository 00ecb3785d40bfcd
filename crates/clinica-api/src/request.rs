use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

/// Description of one logical API call.
///
/// `path` is relative to the API root (e.g. `/pacientes/42`) and may carry
/// a query string. Retry eligibility follows the method unless overridden
/// with [`idempotent`](Self::idempotent).
#[derive(Debug, Clone)]
pub struct Request {
    pub path: String,
    pub method: Method,
    pub body: Option<Value>,
    pub idempotent: bool,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        let idempotent = is_safe_method(&method);
        Self {
            path: path.into(),
            method,
            body: None,
            idempotent,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body.
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Attach any serializable body.
    pub fn json_from<T: Serialize>(self, body: &T) -> Result<Self, serde_json::Error> {
        Ok(self.json(serde_json::to_value(body)?))
    }

    /// Append `key=value` query pairs (URL-encoded) to the path.
    pub fn query<K, V>(mut self, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let encoded: String = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params)
            .finish();
        if !encoded.is_empty() {
            let sep = if self.path.contains('?') { '&' } else { '?' };
            self.path.push(sep);
            self.path.push_str(&encoded);
        }
        self
    }

    /// Declare whether repeating this request is safe.
    ///
    /// A PUT that fully replaces a record can opt in; a POST that creates
    /// one should not.
    pub fn idempotent(mut self, idempotent: bool) -> Self {
        self.idempotent = idempotent;
        self
    }
}

fn is_safe_method(method: &Method) -> bool {
    *method == Method::GET || *method == Method::HEAD || *method == Method::OPTIONS
}
