use wasmparser::{
    FuncValidatorAllocations, Payload, TypeRef, ValidPayload, Validator, WasmFeatures,
};

use crate::compiler_config::TranslationLimits;
use crate::translation::{CompileResult, ModuleIndex, TranslationError};
use crate::translation_unsupported;

/// What validation learned about a module.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ModuleInfo {
    /// Functions defined (not imported) by the module.
    pub defined_functions: u32,
    pub imported_functions: u32,
}

impl ModuleInfo {
    #[must_use]
    pub fn total_functions(&self) -> u32 {
        self.defined_functions + self.imported_functions
    }
}

/// Validate decoded payloads, including every function body.
pub(crate) fn validate(
    payloads: &[Payload<'_>],
    features: WasmFeatures,
    limits: &TranslationLimits,
) -> CompileResult<ModuleInfo> {
    let mut validator = Validator::new_with_features(features);
    let mut allocations = FuncValidatorAllocations::default();
    let mut info = ModuleInfo::default();

    for payload in payloads {
        if let Payload::FunctionSection(functions) = payload {
            let count = functions.count();
            if count > limits.max_functions {
                return Err(TranslationError::limit_exceeded(format!(
                    "module defines {count} functions, the limit is {}",
                    limits.max_functions
                ))
                .with_offset(functions.range().start));
            }
        }

        match validator.payload(payload)? {
            ValidPayload::Ok => {
                if let Payload::ImportSection(imports) = payload {
                    for import in imports.clone() {
                        if matches!(import?.ty, TypeRef::Func(_)) {
                            info.imported_functions += 1;
                        }
                    }
                }
            }
            ValidPayload::Func(func, body) => {
                info.defined_functions += 1;

                let index = ModuleIndex::function(func.index);
                let range = body.range();
                if range.len() > limits.max_function_body_size {
                    return Err(TranslationError::limit_exceeded(format!(
                        "function body is {} bytes, the limit is {}",
                        range.len(),
                        limits.max_function_body_size
                    ))
                    .with_offset(range.start)
                    .with_index(index));
                }

                let mut func_validator = func.into_validator(allocations);
                func_validator
                    .validate(&body)
                    .map_err(|error| TranslationError::from(error).or_index(index))?;
                allocations = func_validator.into_allocations();
            }
            ValidPayload::Parser(_) => {
                return Err(translation_unsupported!("nested modules are unsupported"));
            }
            _ => {}
        }
    }

    tracing::trace!(
        defined = info.defined_functions,
        imported = info.imported_functions,
        "validated module"
    );
    Ok(info)
}
