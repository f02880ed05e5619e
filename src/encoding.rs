//! Encoding adapter between raw bytes and the tokenizer's text.
//!
//! Labels are resolved with `encoding_rs` (WHATWG labels, case-insensitive).
//! A `bom|` prefix asks for a byte-order mark matching the encoding to be
//! consumed before decoding. Unknown labels degrade to UTF-8 with a
//! [`Warning`]; invalid byte sequences are reported, never replaced.

use encoding_rs::{DecoderResult, EncoderResult, Encoding, UTF_8, UTF_16BE, UTF_16LE};
use log::warn;

use crate::error::{CsvError, Warning};

const BOM_PREFIX: &str = "bom|";

/// A resolved encoding label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodingSpec {
    encoding: &'static Encoding,
    strip_bom: bool,
}

impl Default for EncodingSpec {
    fn default() -> Self {
        Self {
            encoding: UTF_8,
            strip_bom: false,
        }
    }
}

impl EncodingSpec {
    /// Resolves `label`, falling back to UTF-8 with a warning when unknown.
    ///
    /// The warning is also logged, exactly once per resolution.
    pub fn resolve(label: Option<&str>) -> (Self, Option<Warning>) {
        let Some(label) = label else {
            return (Self::default(), None);
        };

        let trimmed = label.trim();
        let (strip_bom, name) = match trimmed.get(..BOM_PREFIX.len()) {
            Some(prefix) if prefix.eq_ignore_ascii_case(BOM_PREFIX) => {
                (true, &trimmed[BOM_PREFIX.len()..])
            }
            _ => (false, trimmed),
        };

        match Encoding::for_label(name.as_bytes()) {
            Some(encoding) => (
                Self {
                    encoding,
                    strip_bom,
                },
                None,
            ),
            None => {
                let warning = Warning::UnsupportedEncoding {
                    name: name.to_string(),
                };
                warn!("{}", warning);
                (
                    Self {
                        encoding: UTF_8,
                        strip_bom,
                    },
                    Some(warning),
                )
            }
        }
    }

    /// Same BOM handling, but the bytes are already UTF-8 text.
    pub(crate) fn for_text(self) -> Self {
        Self {
            encoding: UTF_8,
            strip_bom: self.strip_bom,
        }
    }

    pub fn name(&self) -> &'static str {
        self.encoding.name()
    }

    pub fn strips_bom(&self) -> bool {
        self.strip_bom
    }

    pub fn is_utf8(&self) -> bool {
        self.encoding == UTF_8
    }
}

/// Where a decode failed, relative to the whole input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeFailure {
    pub offset: usize,
}

/// Incremental decoder from raw bytes to UTF-8 text.
pub struct TextDecoder {
    spec: EncodingSpec,
    decoder: encoding_rs::Decoder,
    consumed: usize,
}

impl TextDecoder {
    pub fn new(spec: EncodingSpec) -> Self {
        let decoder = if spec.strip_bom {
            spec.encoding.new_decoder_with_bom_removal()
        } else {
            spec.encoding.new_decoder_without_bom_handling()
        };
        Self {
            spec,
            decoder,
            consumed: 0,
        }
    }

    pub fn encoding_name(&self) -> &'static str {
        self.spec.name()
    }

    /// Decodes `bytes` and appends the text to `out`.
    ///
    /// On failure `out` holds everything decoded before the bad sequence.
    /// `last` must be set on the final call so incomplete trailing sequences
    /// are reported.
    pub fn decode(&mut self, bytes: &[u8], out: &mut String, last: bool) -> Result<(), DecodeFailure> {
        let mut src = bytes;
        loop {
            let needed = self
                .decoder
                .max_utf8_buffer_length_without_replacement(src.len())
                .unwrap_or(src.len().saturating_mul(3) + 16);
            out.reserve(needed);

            let (result, read) = self
                .decoder
                .decode_to_string_without_replacement(src, out, last);

            match result {
                DecoderResult::InputEmpty => {
                    self.consumed += read;
                    return Ok(());
                }
                DecoderResult::OutputFull => {
                    self.consumed += read;
                    src = &src[read..];
                }
                DecoderResult::Malformed(bad, extra) => {
                    let offset = (self.consumed + read).saturating_sub(usize::from(extra) + usize::from(bad));
                    self.consumed += read;
                    return Err(DecodeFailure { offset });
                }
            }
        }
    }
}

/// Encoder from text to the configured output encoding.
pub struct TextEncoder {
    spec: EncodingSpec,
}

impl TextEncoder {
    pub fn new(spec: EncodingSpec) -> Self {
        Self { spec }
    }

    pub fn encoding_name(&self) -> &'static str {
        self.spec.name()
    }

    /// Encodes `text`; `line` only feeds the error message.
    pub fn encode(&self, text: &str, line: usize) -> Result<Vec<u8>, CsvError> {
        let encoding = self.spec.encoding;
        if encoding == UTF_8 {
            return Ok(text.as_bytes().to_vec());
        }
        // encoding_rs never encodes into UTF-16; do it by hand.
        if encoding == UTF_16LE {
            return Ok(text.encode_utf16().flat_map(u16::to_le_bytes).collect());
        }
        if encoding == UTF_16BE {
            return Ok(text.encode_utf16().flat_map(u16::to_be_bytes).collect());
        }

        let mut encoder = encoding.new_encoder();
        let capacity = encoder
            .max_buffer_length_from_utf8_without_replacement(text.len())
            .unwrap_or(text.len().saturating_mul(4) + 16);
        let mut out = Vec::with_capacity(capacity);
        let (result, _read) = encoder.encode_from_utf8_to_vec_without_replacement(text, &mut out, true);
        match result {
            EncoderResult::InputEmpty => Ok(out),
            _ => Err(CsvError::UnmappableCharacter {
                encoding: encoding.name().to_string(),
                line,
            }),
        }
    }
}
