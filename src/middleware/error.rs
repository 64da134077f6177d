use std::error::Error as StdError;
use std::fmt;

use crate::middleware::PassName;

/// A registered middleware failed while transforming a module.
///
/// Wrapping is one level deep: the source, when present, is the pass's own
/// failure and never another `MiddlewareError`.
#[derive(Debug)]
pub struct MiddlewareError {
    name: PassName,
    message: String,
    source: Option<anyhow::Error>,
}

impl MiddlewareError {
    #[must_use]
    pub(crate) fn new(name: PassName, message: impl Into<String>) -> Self {
        Self {
            name,
            message: message.into(),
            source: None,
        }
    }

    /// Wrap the native failure of the pass called `name`.
    ///
    /// A pass that bubbles up a `MiddlewareError` (eg. by delegating to
    /// another pipeline) is still the one that failed. The inner error is
    /// taken out of the chain: whatever wrapped it is kept as a prefix of
    /// the message, followed by the inner message, and the inner cause
    /// becomes the cause.
    pub(crate) fn with_source(name: PassName, source: anyhow::Error) -> Self {
        let nested = source.chain().enumerate().find_map(|(depth, error)| {
            error.downcast_ref::<Self>().map(|inner| (depth, inner))
        });
        let Some((depth, inner)) = nested else {
            let message = source.to_string();
            return Self {
                source: Some(source),
                ..Self::new(name, message)
            };
        };

        let mut message: String = source
            .chain()
            .take(depth)
            .map(|wrapper| format!("{wrapper}: "))
            .collect();
        message.push_str(&inner.message);
        // Behind a wrapper the inner error can only be borrowed, not moved out.
        let rendered = inner.source.as_ref().map(|cause| anyhow::anyhow!("{cause:#}"));

        let source = match source.downcast::<Self>() {
            Ok(inner) => inner.source,
            Err(_) => rendered,
        };
        Self {
            source,
            ..Self::new(name, message)
        }
    }

    /// The name the failing pass was registered under.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn cause(&self) -> Option<&anyhow::Error> {
        self.source.as_ref()
    }
}

impl fmt::Display for MiddlewareError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error in middleware `{}`: {}", self.name, self.message)
    }
}

impl StdError for MiddlewareError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| &**source as &(dyn StdError + 'static))
    }
}

/// A middleware could not be added to a [`MiddlewareChain`](crate::middleware::MiddlewareChain).
#[derive(Debug, Clone, PartialEq, Eq, Hash, thiserror::Error)]
pub enum RegistrationError {
    #[error("middleware names must not be empty")]
    EmptyName,
    #[error("a middleware named `{0}` is already registered")]
    DuplicateName(String),
    #[error("middleware `{pass}` depends on `{dependency}`, which is not registered before it")]
    MissingDependency { pass: String, dependency: String },
}
