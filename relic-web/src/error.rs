use relic::ConfigError;
use relic_shell::ShellError;
use wasm_bindgen::JsValue;

/// Errors from the browser entry points, converted to `JsValue` at the
/// wasm boundary.
#[derive(thiserror::Error, Debug)]
pub enum WebError {
    #[error("browser API unavailable: {0}")]
    MissingApi(&'static str),

    #[error("no element matches {0:?}")]
    MissingElement(String),

    #[error("JavaScript error: {0}")]
    Js(String),

    #[error("HTTP {status} fetching {url}")]
    Http { url: String, status: u16 },

    #[error("invalid config: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Shell(#[from] ShellError),
}

impl From<JsValue> for WebError {
    fn from(value: JsValue) -> Self {
        WebError::Js(value.as_string().unwrap_or_else(|| format!("{:?}", value)))
    }
}

impl From<WebError> for JsValue {
    fn from(error: WebError) -> Self {
        JsValue::from_str(&error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = WebError::Http {
            url: "romes_colosseum.glb".to_string(),
            status: 404,
        };
        assert_eq!(err.to_string(), "HTTP 404 fetching romes_colosseum.glb");
        assert_eq!(
            WebError::MissingElement("#model-canvas".to_string()).to_string(),
            "no element matches \"#model-canvas\""
        );
    }

    #[test]
    fn test_config_errors_convert() {
        let err: WebError = relic::ViewerConfig::from_json("{").unwrap_err().into();
        assert!(err.to_string().starts_with("invalid config:"));
    }
}
