//! Error types with rich diagnostics using miette
//!
//! Construction-time errors abort the whole run; they carry the formula
//! source so the offending span can be shown in context.

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Source context for formula error reporting
#[derive(Debug, Clone)]
pub struct SourceContext {
    /// Name of the source (usually "<formula>")
    pub name: String,
    /// The full formula text
    pub source: String,
}

impl SourceContext {
    /// Create a new source context
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }

    /// Create a NamedSource for miette
    pub fn named_source(&self) -> NamedSource<String> {
        NamedSource::new(&self.name, self.source.clone())
    }
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Invalid combination of stage construction arguments.
///
/// Fatal: the stage never starts.
#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("neither calculation nor deletion specified")]
    #[diagnostic(
        code(tagcalc::config::nothing_to_do),
        help("give a formula, a removal list, or both")
    )]
    NothingToDo,

    #[error("output attribute name must not be empty")]
    #[diagnostic(
        code(tagcalc::config::missing_output),
        help("a formula needs an attribute name to store its result under")
    )]
    MissingOutput,

    #[error(transparent)]
    #[diagnostic(transparent)]
    Formula(#[from] FormulaError),
}

// ============================================================================
// Formula Errors
// ============================================================================

/// Formula text failed to compile against the declared variables.
///
/// Fatal at construction; never raised per record.
#[derive(Error, Diagnostic, Debug)]
pub enum FormulaError {
    #[error("formula syntax error")]
    #[diagnostic(code(tagcalc::formula::syntax))]
    Syntax {
        message: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("{message}")]
        span: SourceSpan,
    },

    #[error("unknown variable: {name}")]
    #[diagnostic(
        code(tagcalc::formula::unknown_variable),
        help("declare it as an input attribute, or use the built-in `lat`/`lon`")
    )]
    UnknownVariable {
        name: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("not a declared input")]
        span: SourceSpan,
    },
}
