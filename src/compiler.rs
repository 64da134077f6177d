use std::thread;

use derive_more::Display;

use crate::compiler_config::CompilerConfig;
use crate::error::CompileError;
use crate::translation::decoder::decode;
use crate::translation::lowering::{emit, lower};
use crate::translation::validator::validate;
use crate::translation::ModuleInfo;

/// Where a single compilation attempt currently is.
///
/// `Failed` and `Succeeded` are terminal, a new attempt starts over at
/// `Decoding`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
enum State {
    Decoding,
    Validating,
    Lowering,
    RunningMiddleware,
    Emitting,
    Succeeded,
    Failed,
}

#[derive(Debug)]
struct Attempt {
    state: State,
}

impl Attempt {
    fn new() -> Self {
        tracing::trace!(state = %State::Decoding, "compilation started");
        Self {
            state: State::Decoding,
        }
    }

    fn advance(&mut self, next: State) {
        debug_assert!(!matches!(self.state, State::Succeeded | State::Failed));
        tracing::trace!(from = %self.state, to = %next, "compilation advanced");
        self.state = next;
    }

    fn fail(&mut self, error: impl Into<CompileError>) -> CompileError {
        let error = error.into();
        tracing::debug!(state = %self.state, %error, "compilation failed");
        self.state = State::Failed;
        error
    }
}

/// The output of a successful compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledModule {
    bytes: Vec<u8>,
    info: ModuleInfo,
    passes_run: usize,
}

impl CompiledModule {
    /// The module after every middleware pass, re-encoded.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// What validation learned about the input module.
    #[must_use]
    pub fn info(&self) -> &ModuleInfo {
        &self.info
    }

    #[must_use]
    pub fn passes_run(&self) -> usize {
        self.passes_run
    }
}

/// Compiles modules with a fixed configuration.
///
/// Every call to [`compile`](Self::compile) is an independent attempt, so a
/// single `Compiler` can be shared between threads.
#[derive(Debug, Default)]
pub struct Compiler {
    config: CompilerConfig,
}

impl Compiler {
    #[must_use]
    pub fn new(config: CompilerConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Decode, validate and lower `bytes`, then run the middleware pipeline.
    ///
    /// # Errors
    /// The first failure of any stage; later stages do not run.
    pub fn compile(&self, bytes: &[u8]) -> Result<CompiledModule, CompileError> {
        let span = tracing::debug_span!("compile", size = bytes.len());
        let _enter = span.enter();
        let CompilerConfig {
            wasm_features,
            limits,
            middlewares,
            ..
        } = &self.config;

        let mut attempt = Attempt::new();
        let payloads = decode(bytes, *wasm_features).map_err(|e| attempt.fail(e))?;

        attempt.advance(State::Validating);
        let info = validate(&payloads, *wasm_features, limits)
            .map_err(|e| attempt.fail(CompileError::Validate(e)))?;

        attempt.advance(State::Lowering);
        let mut module = lower(bytes).map_err(|e| attempt.fail(e))?;

        attempt.advance(State::RunningMiddleware);
        let passes_run = middlewares.run(&mut module).map_err(|e| attempt.fail(e))?;

        attempt.advance(State::Emitting);
        let bytes = emit(&mut module, *wasm_features).map_err(|e| attempt.fail(e))?;

        attempt.advance(State::Succeeded);
        Ok(CompiledModule {
            bytes,
            info,
            passes_run,
        })
    }

    /// Compile several modules concurrently, one attempt per module.
    ///
    /// The results are in the order of `modules`.
    ///
    /// # Errors
    /// Only when the environment cannot run the attempts at all; failures of
    /// individual modules are reported in their own slot.
    pub fn compile_many(
        &self,
        modules: &[&[u8]],
    ) -> Result<Vec<Result<CompiledModule, CompileError>>, CompileError> {
        thread::scope(|scope| -> Result<_, CompileError> {
            let mut handles = Vec::new();
            handles.try_reserve_exact(modules.len())?;
            for (position, bytes) in modules.iter().enumerate() {
                let handle = thread::Builder::new()
                    .name(format!("compile-{position}"))
                    .spawn_scoped(scope, move || self.compile(bytes))
                    .map_err(|e| {
                        CompileError::Resource(format!("cannot spawn compilation thread: {e}"))
                    })?;
                handles.push(handle);
            }
            Ok(handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
                })
                .collect())
        })
    }
}
