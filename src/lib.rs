pub mod compiler_config;
pub mod cpu_features;
pub mod error;
pub mod middleware;
pub mod translation;

mod compiler;

pub use compiler::{CompiledModule, Compiler};
pub use compiler_config::{CompilerConfig, SUPPORTED_WASM_FEATURES, TranslationLimits};
pub use cpu_features::{
    Architecture, CpuFeature, CpuFeatureSet, FeatureParseError, FeatureParseReason,
    FeatureSelector, Target,
};
pub use error::{CompileError, Stage};
pub use middleware::{MiddlewareChain, MiddlewareError, ModuleMiddleware, PassName};
pub use translation::{
    CompileResult, IndexSpace, ModuleIndex, ModuleInfo, TranslationError, TranslationErrorKind,
};
pub use wasmparser::WasmFeatures;

/// Compile `bytes` with the default configuration.
///
/// # Errors
/// See [`Compiler::compile`].
pub fn compile(bytes: &[u8]) -> Result<CompiledModule, CompileError> {
    Compiler::default().compile(bytes)
}
