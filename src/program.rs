//! Program images.
//!
//! Two formats are accepted:
//! - Hex text: one 32-bit word per line, `0x` prefix optional, `_` separators
//!   allowed. Anything after `#` or `;` is a comment; blank lines are ignored.
//! - Raw binary (`.bin`): consecutive little-endian 32-bit words.
//!
//! Images are placed at address 0 in execution order.

use std::path::Path;
use thiserror::Error;

/// A loaded program image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramImage {
    /// Instruction words, in load order.
    pub words: Vec<u32>,
}

impl ProgramImage {
    pub fn new(words: Vec<u32>) -> Self {
        Self { words }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Parse a hex text image.
pub fn parse_hex(source: &str) -> Result<ProgramImage, ImageError> {
    let mut words = Vec::new();

    for (line_num, line) in source.lines().enumerate() {
        let code = line.split(['#', ';']).next().unwrap_or("").trim();
        if code.is_empty() {
            continue;
        }

        let digits = code
            .strip_prefix("0x")
            .or_else(|| code.strip_prefix("0X"))
            .unwrap_or(code)
            .replace('_', "");

        let word = u32::from_str_radix(&digits, 16).map_err(|e| ImageError::ParseError {
            line: line_num + 1,
            message: format!("`{}`: {}", code, e),
        })?;
        words.push(word);
    }

    Ok(ProgramImage { words })
}

/// Interpret raw bytes as little-endian words.
pub fn from_bytes(bytes: &[u8]) -> Result<ProgramImage, ImageError> {
    if bytes.len() % 4 != 0 {
        return Err(ImageError::TruncatedWord { len: bytes.len() });
    }

    let words = bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    Ok(ProgramImage { words })
}

/// Load an image from disk; `.bin` files are raw, everything else is hex text.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<ProgramImage, ImageError> {
    let path = path.as_ref();
    let is_binary = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("bin"));

    if is_binary {
        let bytes = std::fs::read(path).map_err(|e| ImageError::IoError(e.to_string()))?;
        from_bytes(&bytes)
    } else {
        let source = std::fs::read_to_string(path).map_err(|e| ImageError::IoError(e.to_string()))?;
        parse_hex(&source)
    }
}

/// Errors that can occur while reading a program image.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("parse error on line {line}: {message}")]
    ParseError { line: usize, message: String },

    #[error("binary image of {len} bytes is not a whole number of words")]
    TruncatedWord { len: usize },
}
