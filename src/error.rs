use std::collections::TryReserveError;

use derive_more::Display;

use crate::cpu_features::FeatureParseError;
use crate::middleware::{MiddlewareError, RegistrationError};
use crate::translation::TranslationError;

/// The part of a compilation an error originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Stage {
    #[display("configuration")]
    Configuration,
    #[display("decoding")]
    Decoding,
    #[display("validation")]
    Validation,
    #[display("middleware")]
    Middleware,
    #[display("environment")]
    Environment,
}

/// The only error a compilation reports to its caller.
///
/// Each variant repackages exactly one stage error; nothing is dropped on
/// the way in, and the rendering of the stage error is kept verbatim.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// The binary could not be decoded or lowered.
    #[error("WebAssembly translation error: {0}")]
    Wasm(#[from] TranslationError),

    /// The binary decoded, but is not a valid module.
    #[error("Validation error: {0}")]
    Validate(TranslationError),

    /// A middleware pass failed; no later pass ran.
    #[error("Middleware error: {0}")]
    Middleware(#[from] MiddlewareError),

    /// A CPU feature selector could not be resolved.
    #[error("Configuration error: {0}")]
    Features(#[from] FeatureParseError),

    /// A middleware could not be added to the pipeline.
    #[error("Middleware registration error: {0}")]
    Registration(#[from] RegistrationError),

    /// The requested target cannot be compiled for.
    #[error("Unsupported target: {0}")]
    UnsupportedTarget(String),

    /// The environment failed, independently of the module's content.
    #[error("Insufficient resources: {0}")]
    Resource(String),
}

impl CompileError {
    #[must_use]
    pub fn stage(&self) -> Stage {
        match self {
            Self::Wasm(_) => Stage::Decoding,
            Self::Validate(_) => Stage::Validation,
            Self::Middleware(_) => Stage::Middleware,
            Self::Features(_) | Self::Registration(_) | Self::UnsupportedTarget(_) => {
                Stage::Configuration
            }
            Self::Resource(_) => Stage::Environment,
        }
    }

    #[must_use]
    pub fn translation_error(&self) -> Option<&TranslationError> {
        match self {
            Self::Wasm(error) | Self::Validate(error) => Some(error),
            _ => None,
        }
    }

    #[must_use]
    pub fn middleware_error(&self) -> Option<&MiddlewareError> {
        match self {
            Self::Middleware(error) => Some(error),
            _ => None,
        }
    }

    #[must_use]
    pub fn feature_error(&self) -> Option<&FeatureParseError> {
        match self {
            Self::Features(error) => Some(error),
            _ => None,
        }
    }

    /// Byte offset into the input, for decoding and validation failures.
    #[must_use]
    pub fn offset(&self) -> Option<usize> {
        self.translation_error().and_then(TranslationError::offset)
    }
}

impl From<TryReserveError> for CompileError {
    fn from(error: TryReserveError) -> Self {
        Self::Resource(error.to_string())
    }
}

impl TryFrom<CompileError> for TranslationError {
    type Error = CompileError;

    fn try_from(error: CompileError) -> Result<Self, Self::Error> {
        match error {
            CompileError::Wasm(error) | CompileError::Validate(error) => Ok(error),
            other => Err(other),
        }
    }
}
