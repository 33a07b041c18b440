/// Query parameters sent with a `once` read.
///
/// Parameters are encoded in insertion order. Setting the same name twice keeps both pairs.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OnceOptions {
    params: Vec<(String, String)>,
}

impl OnceOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an arbitrary query parameter.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    /// Only fetch the keys at this location, with `true` in place of nested values.
    pub fn shallow(self, shallow: bool) -> Self {
        self.param("shallow", shallow.to_string())
    }

    /// Controls response formatting, e.g. `"pretty"` or `"silent"`.
    pub fn print(self, print: impl Into<String>) -> Self {
        self.param("print", print)
    }

    /// Include priority (`.priority`) and value (`.value`) metadata in the response.
    pub fn format_export(self) -> Self {
        self.param("format", "export")
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K, V> FromIterator<(K, V)> for OnceOptions
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            params: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Status and raw body of a completed `GET`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    /// Statuses in `200..400` carry a JSON payload.
    pub fn is_success(&self) -> bool {
        (200..400).contains(&self.status)
    }
}
