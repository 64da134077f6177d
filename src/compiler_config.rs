use wasmparser::WasmFeatures;

use crate::cpu_features::{FeatureSelector, Target};
use crate::error::CompileError;
use crate::middleware::{MiddlewareChain, ModuleMiddleware};

/// Implementation limits enforced while validating a module.
///
/// The defaults are the limits of the WebAssembly JS API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TranslationLimits {
    pub max_functions: u32,
    pub max_function_body_size: usize,
}

pub const DEFAULT_MAX_FUNCTIONS: u32 = 1_000_000;
pub const DEFAULT_MAX_FUNCTION_BODY_SIZE: usize = 7_654_321;

impl Default for TranslationLimits {
    fn default() -> Self {
        Self {
            max_functions: DEFAULT_MAX_FUNCTIONS,
            max_function_body_size: DEFAULT_MAX_FUNCTION_BODY_SIZE,
        }
    }
}

/// Proposals the middleware IR represents and re-encodes faithfully.
///
/// This is the WebAssembly 2.0 feature set; `memory64`, threads and other
/// later proposals are rejected during validation unless enabled explicitly.
pub const SUPPORTED_WASM_FEATURES: WasmFeatures = WasmFeatures::FLOATS
    .union(WasmFeatures::GC_TYPES)
    .union(WasmFeatures::MUTABLE_GLOBAL)
    .union(WasmFeatures::SATURATING_FLOAT_TO_INT)
    .union(WasmFeatures::SIGN_EXTENSION)
    .union(WasmFeatures::MULTI_VALUE)
    .union(WasmFeatures::BULK_MEMORY)
    .union(WasmFeatures::REFERENCE_TYPES)
    .union(WasmFeatures::SIMD);

/// Everything a [`Compiler`](crate::Compiler) needs to know before it sees
/// any bytes.
#[derive(Debug)]
pub struct CompilerConfig {
    pub target: Target,
    pub wasm_features: WasmFeatures,
    pub limits: TranslationLimits,
    pub middlewares: MiddlewareChain,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            target: Target::default(),
            wasm_features: SUPPORTED_WASM_FEATURES,
            limits: TranslationLimits::default(),
            middlewares: MiddlewareChain::default(),
        }
    }
}

impl CompilerConfig {
    #[must_use]
    pub fn new(target: Target) -> Self {
        Self {
            target,
            ..Default::default()
        }
    }

    /// Apply a comma separated list of CPU feature selectors, eg. `"+avx2,-bmi"`,
    /// to the configured target.
    ///
    /// # Errors
    /// When a selector is malformed or names an unknown feature, or when the
    /// feature does not exist on the target architecture.
    pub fn with_cpu_features(mut self, selectors: &str) -> Result<Self, CompileError> {
        let selectors = FeatureSelector::parse_list(selectors)?;
        self.target = self.target.with_selectors(&selectors)?;
        Ok(self)
    }

    #[must_use]
    pub fn with_wasm_features(mut self, features: WasmFeatures) -> Self {
        self.wasm_features = features;
        self
    }

    #[must_use]
    pub fn with_limits(mut self, limits: TranslationLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Append a middleware to the end of the pipeline.
    ///
    /// # Errors
    /// When the middleware's name is empty or already taken, or when it
    /// depends on a middleware that was not registered before it.
    pub fn with_middleware(
        mut self,
        middleware: impl ModuleMiddleware + 'static,
    ) -> Result<Self, CompileError> {
        self.middlewares.register(middleware)?;
        Ok(self)
    }
}
