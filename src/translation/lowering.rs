use walrus::{Module, ModuleConfig};
use wasmparser::{Validator, WasmFeatures};

use crate::translation::{CompileResult, TranslationError};

/// Lower validated bytes into the IR that middleware passes rewrite.
///
/// Validation already ran, so anything rejected here is a construct the IR
/// cannot represent.
pub(crate) fn lower(bytes: &[u8]) -> CompileResult<Module> {
    ModuleConfig::new()
        .parse(bytes)
        .map_err(|error| TranslationError::unsupported(format!("{error:#}")))
}

/// Encode the IR back into a binary that validates under `features`.
///
/// The IR parses some proposals it cannot encode again; such modules are
/// reported here rather than handed out broken.
pub(crate) fn emit(module: &mut Module, features: WasmFeatures) -> CompileResult<Vec<u8>> {
    let bytes = module.emit_wasm();
    Validator::new_with_features(features)
        .validate_all(&bytes)
        .map_err(|error| {
            TranslationError::unsupported(format!(
                "the module does not survive re-encoding: {}",
                error.message()
            ))
        })?;
    Ok(bytes)
}
