use std::fmt;

use derive_more::Display;
use wasmparser::BinaryReaderError;

pub(crate) mod decoder;
pub(crate) mod lowering;
pub(crate) mod validator;

pub use validator::ModuleInfo;

/// Convenience macro for creating an unsupported-feature [`TranslationError`].
#[macro_export]
macro_rules! translation_unsupported {
    ($($arg:tt)*) => {
        $crate::translation::TranslationError::unsupported(::std::format!($($arg)*))
    };
}

/// Result of the decoding and translation routines.
///
/// This never crosses the public compilation entry point, where the
/// error is promoted into a [`CompileError`](crate::error::CompileError).
pub type CompileResult<T> = Result<T, TranslationError>;

/// The reason raw bytes could not be turned into a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum TranslationErrorKind {
    /// The module relies on a proposal or construct that is not enabled.
    #[display("unsupported feature")]
    UnsupportedFeature,
    /// The byte stream is not a well-formed binary encoding.
    #[display("invalid encoding")]
    InvalidEncoding,
    /// The module is well-formed but violates a validation rule.
    #[display("invalid module")]
    InvalidModule,
    /// An index refers outside of its index space.
    #[display("invalid index")]
    InvalidIndex,
    /// A configured implementation limit was exceeded.
    #[display("implementation limit exceeded")]
    ImplLimitExceeded,
    /// Translation was stopped on request of the embedder.
    #[display("aborted by user")]
    UserAbort,
    #[display("translation failed")]
    Generic,
}

/// The index spaces of a core WebAssembly module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum IndexSpace {
    #[display("function")]
    Function,
    #[display("type")]
    Type,
    #[display("table")]
    Table,
    #[display("memory")]
    Memory,
    #[display("global")]
    Global,
    #[display("data segment")]
    Data,
    #[display("element segment")]
    Element,
}

/// An index into one of the module's index spaces, eg. `function #7`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[display("{space} #{index}")]
pub struct ModuleIndex {
    pub space: IndexSpace,
    pub index: u32,
}

impl ModuleIndex {
    #[must_use]
    pub fn function(index: u32) -> Self {
        Self {
            space: IndexSpace::Function,
            index,
        }
    }

    #[must_use]
    pub fn new(space: IndexSpace, index: u32) -> Self {
        Self { space, index }
    }
}

/// A failure to decode or translate a WebAssembly binary.
///
/// The offset and index always refer to the original input: the byte
/// position in the buffer handed to the compiler and the index space of the
/// module as written, never to a transformed module.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TranslationError {
    kind: TranslationErrorKind,
    message: String,
    offset: Option<usize>,
    index: Option<ModuleIndex>,
}

impl TranslationError {
    #[must_use]
    pub fn new(kind: TranslationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            offset: None,
            index: None,
        }
    }

    #[must_use]
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(TranslationErrorKind::UnsupportedFeature, message)
    }

    #[must_use]
    pub fn invalid_encoding(message: impl Into<String>, offset: usize) -> Self {
        Self::new(TranslationErrorKind::InvalidEncoding, message).with_offset(offset)
    }

    #[must_use]
    pub fn invalid_index(message: impl Into<String>, index: ModuleIndex) -> Self {
        Self::new(TranslationErrorKind::InvalidIndex, message).with_index(index)
    }

    #[must_use]
    pub fn limit_exceeded(message: impl Into<String>) -> Self {
        Self::new(TranslationErrorKind::ImplLimitExceeded, message)
    }

    /// For decoders driven by an embedder that decided to stop translating.
    #[must_use]
    pub fn user_abort(message: impl Into<String>) -> Self {
        Self::new(TranslationErrorKind::UserAbort, message)
    }

    #[must_use]
    pub fn generic(message: impl Into<String>) -> Self {
        Self::new(TranslationErrorKind::Generic, message)
    }

    #[must_use]
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    #[must_use]
    pub fn with_index(mut self, index: ModuleIndex) -> Self {
        self.index = Some(index);
        self
    }

    #[must_use]
    pub(crate) fn reclassify(mut self, kind: TranslationErrorKind) -> Self {
        self.kind = kind;
        self
    }

    /// Attach an index only when none was recorded closer to the failure.
    #[must_use]
    pub(crate) fn or_index(mut self, index: ModuleIndex) -> Self {
        self.index.get_or_insert(index);
        self
    }

    #[must_use]
    pub fn kind(&self) -> TranslationErrorKind {
        self.kind
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Byte offset into the original input.
    #[must_use]
    pub fn offset(&self) -> Option<usize> {
        self.offset
    }

    #[must_use]
    pub fn index(&self) -> Option<ModuleIndex> {
        self.index
    }
}

impl fmt::Display for TranslationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.offset, self.index) {
            (Some(offset), Some(index)) => {
                write!(f, "at offset {offset} ({offset:#x}), {index}: ")?;
            }
            (Some(offset), None) => write!(f, "at offset {offset} ({offset:#x}): ")?,
            (None, Some(index)) => write!(f, "{index}: ")?,
            (None, None) => {}
        }
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for TranslationError {}

/// Messages `wasmparser` uses for malformed binaries, as opposed to
/// well-formed but invalid ones.
const ENCODING_MARKERS: &[&str] = &[
    "unexpected end",
    "malformed",
    "illegal opcode",
    "invalid leading byte",
    "invalid leb128",
    "magic header",
    "binary version",
    "section size mismatch",
    "unexpected content",
    "too large",
    "invalid utf-8",
    "out of order",
    "control frames remain",
    "operators remaining",
];

fn classify(message: &str) -> TranslationErrorKind {
    let lowercase = message.to_ascii_lowercase();
    if ENCODING_MARKERS.iter().any(|m| lowercase.contains(m)) {
        TranslationErrorKind::InvalidEncoding
    } else if lowercase.contains("not enabled") || lowercase.contains("must be enabled") {
        TranslationErrorKind::UnsupportedFeature
    } else if lowercase.starts_with("unknown ") || lowercase.contains("out of bounds") {
        TranslationErrorKind::InvalidIndex
    } else {
        TranslationErrorKind::InvalidModule
    }
}

impl From<BinaryReaderError> for TranslationError {
    fn from(error: BinaryReaderError) -> Self {
        let message = error.message();
        Self::new(classify(message), message).with_offset(error.offset())
    }
}
