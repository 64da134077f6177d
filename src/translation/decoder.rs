use wasmparser::{BinaryReaderError, Encoding, Parser, Payload, WasmFeatures};

use crate::translation::{CompileResult, TranslationError, TranslationErrorKind};
use crate::translation_unsupported;

/// Decode a binary into its section payloads.
///
/// Only the structure of the binary is checked here; function bodies are
/// decoded lazily by the validator.
pub(crate) fn decode(bytes: &[u8], features: WasmFeatures) -> CompileResult<Vec<Payload<'_>>> {
    let mut parser = Parser::new(0);
    parser.set_features(features);

    let mut payloads = Vec::new();
    for payload in parser.parse_all(bytes) {
        let payload = payload.map_err(decoding_error)?;
        if let Payload::Version {
            encoding: Encoding::Component,
            range,
            ..
        } = &payload
        {
            return Err(
                translation_unsupported!("the component model is unsupported")
                    .with_offset(range.start),
            );
        }
        tracing::trace!(payload = ?payload, "decoded payload");
        payloads.push(payload);
    }
    Ok(payloads)
}

/// Anything the parser rejects is malformed input, unless it stopped at a
/// proposal that is switched off.
fn decoding_error(error: BinaryReaderError) -> TranslationError {
    let error = TranslationError::from(error);
    match error.kind() {
        TranslationErrorKind::UnsupportedFeature => error,
        _ => error.reclassify(TranslationErrorKind::InvalidEncoding),
    }
}
