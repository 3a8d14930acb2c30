//! Compilation of verified text into an executable unit.

use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::ast::Program;
use crate::parser::{parse, ParseError};

/// Opaque, immutable result of compiling one text.
#[derive(Debug, Clone)]
pub struct CompiledUnit {
    program: Arc<Program>,
    name: Arc<str>,
    digest: String,
}

impl CompiledUnit {
    /// Diagnostic name the unit was compiled under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Hex SHA-256 of the compiled text.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub(crate) fn program(&self) -> &Program {
        &self.program
    }
}

/// Compile `text` (preamble included). Error lines are in `text` coordinates.
pub fn compile(text: &str, name: &str) -> Result<CompiledUnit, ParseError> {
    let name: Arc<str> = Arc::from(name);
    let program = parse(text, name.clone())?;
    Ok(CompiledUnit {
        program: Arc::new(program),
        name,
        digest: hex::encode(Sha256::digest(text.as_bytes())),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_text_has_identical_digest() {
        let a = compile("x = 1\n", "a").expect("compile");
        let b = compile("x = 1\n", "b").expect("compile");
        assert_eq!(a.digest(), b.digest());
        assert_eq!(a.digest().len(), 64);
        assert_eq!(b.name(), "b");
    }

    #[test]
    fn syntax_errors_keep_compiled_text_lines() {
        let err = compile("# header\nx = = 1\n", "t").unwrap_err();
        assert_eq!(err.line, 2);
    }
}
