use std::fmt;

/// A one-line message shown at the top of a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Banner {
    Error(String),
    Success(String),
}

impl Banner {
    pub fn error(message: impl Into<String>) -> Self {
        Banner::Error(message.into())
    }

    pub fn success(message: impl Into<String>) -> Self {
        Banner::Success(message.into())
    }

    pub fn message(&self) -> &str {
        match self {
            Banner::Error(m) | Banner::Success(m) => m,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Banner::Error(_))
    }
}

impl fmt::Display for Banner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Banner::Error(m) => write!(f, "❌ {}", m),
            Banner::Success(m) => write!(f, "✅ {}", m),
        }
    }
}
