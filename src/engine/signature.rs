//! Format signature sniffing for model files.
//!
//! Diagnostics only: an unrecognized signature is logged and loading
//! continues. A file too short to carry a signature is rejected.

/// Bytes needed before a signature can be inspected.
pub const MIN_MODEL_BYTES: usize = 8;

/// A 4-byte magic value at a fixed offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatSignature {
    pub offset: usize,
    pub magic: [u8; 4],
    pub format: &'static str,
}

/// TensorFlow Lite flatbuffer identifier.
pub const TFLITE: FormatSignature = FormatSignature {
    offset: 4,
    magic: *b"TFL3",
    format: "TensorFlow Lite flatbuffer",
};

/// GGUF container magic.
pub const GGUF: FormatSignature = FormatSignature {
    offset: 0,
    magic: *b"GGUF",
    format: "GGUF",
};

/// Outcome of inspecting a header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureCheck {
    Recognized(&'static str),
    /// The raw 4 bytes at the first expected offset.
    Unrecognized([u8; 4]),
}

impl SignatureCheck {
    pub fn is_recognized(&self) -> bool {
        matches!(self, Self::Recognized(_))
    }
}

/// Returned when the header is shorter than [`MIN_MODEL_BYTES`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TooShort {
    pub size: usize,
}

/// Inspect `header` against the known signatures for one engine.
///
/// `known` must not be empty.
pub fn inspect(header: &[u8], known: &[FormatSignature]) -> Result<SignatureCheck, TooShort> {
    if header.len() < MIN_MODEL_BYTES {
        return Err(TooShort { size: header.len() });
    }
    for sig in known {
        if field(header, sig.offset) == Some(sig.magic) {
            return Ok(SignatureCheck::Recognized(sig.format));
        }
    }
    let offset = known.first().map(|s| s.offset).unwrap_or(4);
    Ok(SignatureCheck::Unrecognized(field(header, offset).unwrap_or_default()))
}

/// Inspect and log. Unrecognized signatures only produce a warning.
pub fn check_and_log(
    model_id: &str,
    header: &[u8],
    known: &[FormatSignature],
) -> Result<SignatureCheck, TooShort> {
    let check = inspect(header, known)?;
    match &check {
        SignatureCheck::Recognized(format) => {
            tracing::info!(model_id, format, "model signature recognized");
        }
        SignatureCheck::Unrecognized(raw) => {
            tracing::warn!(
                model_id,
                signature = %String::from_utf8_lossy(raw),
                "unrecognized model signature; continuing with load"
            );
        }
    }
    Ok(check)
}

fn field(header: &[u8], offset: usize) -> Option<[u8; 4]> {
    header.get(offset..offset + 4)?.try_into().ok()
}
