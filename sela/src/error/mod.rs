//! Error types and reporting
//!
//! Semantic errors are fatal for the current compilation unit and carry a
//! stable numeric code plus the offending span. Internal errors cover
//! conditions a correct front-end should never produce; they are kept in a
//! separate code range so drivers can tell user mistakes from compiler bugs.

use crate::ast::Span;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, CompileError>;

/// Stable numeric error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Semantic errors: anything a malformed source program can trigger
    TypeNotFound = 101,
    ValueNotFound = 102,
    TypeMismatch = 103,
    NotEnoughArguments = 104,
    AmbiguousOverload = 105,
    NoOverload = 106,
    CaseTypeMismatch = 107,
    MissingInitializer = 108,
    CannotInferType = 109,
    NumericTypeExpected = 110,
    OperatorNotApplicable = 111,
    DuplicateDefinition = 112,

    // Internal errors: invariant violations in the front-end
    InflateNonGeneric = 201,
    GenericParamsRedefined = 202,
    DuplicateSymbol = 203,
}

impl ErrorCode {
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    pub fn is_internal(self) -> bool {
        self.as_u16() >= 200
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "E{:03}", self.as_u16())
    }
}

/// Compile error
#[derive(Debug, Error)]
pub enum CompileError {
    /// Malformed token sequence, raised by the (external) parser
    #[error("Syntax error at {span}: {message}")]
    Syntax { message: String, span: Span },

    /// Fatal semantic error with a stable code and source location
    #[error("{code} at {span}: {message}")]
    Semantic {
        code: ErrorCode,
        message: String,
        span: Span,
    },

    /// Invariant violation; not reachable from well-formed parser output
    #[error("internal error {code}: {message}")]
    Internal { code: ErrorCode, message: String },
}

impl CompileError {
    pub fn syntax(message: impl Into<String>, span: Span) -> Self {
        Self::Syntax {
            message: message.into(),
            span,
        }
    }

    pub fn semantic(code: ErrorCode, message: impl Into<String>, span: Span) -> Self {
        Self::Semantic {
            code,
            message: message.into(),
            span,
        }
    }

    pub fn internal(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Internal {
            code,
            message: message.into(),
        }
    }

    pub fn type_not_found(name: &str, hint: &str, span: Span) -> Self {
        Self::semantic(
            ErrorCode::TypeNotFound,
            format!("type `{name}` not found{hint}"),
            span,
        )
    }

    pub fn value_not_found(name: &str, hint: &str, span: Span) -> Self {
        Self::semantic(
            ErrorCode::ValueNotFound,
            format!("value `{name}` not found{hint}"),
            span,
        )
    }

    pub fn type_mismatch(expected: &str, actual: &str, span: Span) -> Self {
        Self::semantic(
            ErrorCode::TypeMismatch,
            format!("expected {expected}, got {actual}"),
            span,
        )
    }

    pub fn not_enough_arguments(name: &str, span: Span) -> Self {
        Self::semantic(
            ErrorCode::NotEnoughArguments,
            format!("not enough arguments for `{name}`"),
            span,
        )
    }

    pub fn ambiguous_overload(name: &str, count: usize, span: Span) -> Self {
        Self::semantic(
            ErrorCode::AmbiguousOverload,
            format!("ambiguous call: {count} overloads of `{name}` match"),
            span,
        )
    }

    pub fn no_overload(name: &str, args: &str, span: Span) -> Self {
        Self::semantic(
            ErrorCode::NoOverload,
            format!("no overload of `{name}` accepts ({args})"),
            span,
        )
    }

    pub fn case_type_mismatch(span: Span) -> Self {
        Self::semantic(
            ErrorCode::CaseTypeMismatch,
            "case clauses have incompatible result types",
            span,
        )
    }

    pub fn missing_initializer(name: &str, span: Span) -> Self {
        Self::semantic(
            ErrorCode::MissingInitializer,
            format!("`{name}` needs a type annotation or an initializer"),
            span,
        )
    }

    pub fn cannot_infer_type(param: &str, span: Span) -> Self {
        Self::semantic(
            ErrorCode::CannotInferType,
            format!("cannot infer type argument `{param}`; annotate it explicitly"),
            span,
        )
    }

    pub fn numeric_type_expected(actual: &str, span: Span) -> Self {
        Self::semantic(
            ErrorCode::NumericTypeExpected,
            format!("numeric type expected, got {actual}"),
            span,
        )
    }

    pub fn operator_not_applicable(op: &str, left: &str, right: &str, span: Span) -> Self {
        Self::semantic(
            ErrorCode::OperatorNotApplicable,
            format!("operator `{op}` is not applicable to {left} and {right}"),
            span,
        )
    }

    pub fn duplicate_definition(name: &str, span: Span) -> Self {
        Self::semantic(
            ErrorCode::DuplicateDefinition,
            format!("`{name}` is already defined"),
            span,
        )
    }

    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Syntax { .. } => None,
            Self::Semantic { code, .. } => Some(*code),
            Self::Internal { code, .. } => Some(*code),
        }
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            Self::Syntax { span, .. } => Some(*span),
            Self::Semantic { span, .. } => Some(*span),
            Self::Internal { .. } => None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Syntax { message, .. } => message,
            Self::Semantic { message, .. } => message,
            Self::Internal { message, .. } => message,
        }
    }
}

/// Non-fatal diagnostic collected during analysis
#[derive(Debug, Clone)]
pub enum CompileWarning {
    /// A local binding that is never read
    UnusedBinding { name: String, span: Span },
    /// A `var` that is never assigned after its declaration
    NeverMutated { name: String, span: Span },
}

impl CompileWarning {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnusedBinding { .. } => "unused_binding",
            Self::NeverMutated { .. } => "never_mutated",
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Self::UnusedBinding { span, .. } => *span,
            Self::NeverMutated { span, .. } => *span,
        }
    }
}

impl std::fmt::Display for CompileWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnusedBinding { name, span } => {
                write!(f, "unused binding `{name}` at {span}")
            }
            Self::NeverMutated { name, span } => {
                write!(f, "`{name}` is declared `var` but never mutated at {span}")
            }
        }
    }
}

/// Report error with ariadne
pub fn report_error(filename: &str, source: &str, error: &CompileError) {
    use ariadne::{Color, Label, Report, ReportKind, Source};

    let kind = match error {
        CompileError::Syntax { .. } => "Syntax",
        CompileError::Semantic { .. } => "Semantic",
        CompileError::Internal { .. } => "Internal",
    };

    if let Some(span) = error.span() {
        Report::build(ReportKind::Error, (filename, span.start..span.end))
            .with_message(format!("{kind} error"))
            .with_label(
                Label::new((filename, span.start..span.end))
                    .with_message(error.message())
                    .with_color(Color::Red),
            )
            .finish()
            .print((filename, Source::from(source)))
            .unwrap();
    } else {
        Report::build(ReportKind::Error, (filename, 0..0))
            .with_message(format!("{kind} error: {}", error.message()))
            .finish()
            .print((filename, Source::from(source)))
            .unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_values_are_stable() {
        assert_eq!(ErrorCode::TypeNotFound.as_u16(), 101);
        assert_eq!(ErrorCode::OperatorNotApplicable.as_u16(), 111);
        assert_eq!(ErrorCode::InflateNonGeneric.as_u16(), 201);
    }

    #[test]
    fn test_error_code_display() {
        assert_eq!(ErrorCode::TypeMismatch.to_string(), "E103");
    }

    #[test]
    fn test_internal_range() {
        assert!(!ErrorCode::TypeMismatch.is_internal());
        assert!(ErrorCode::DuplicateSymbol.is_internal());
    }

    #[test]
    fn test_semantic_error_carries_code_and_span() {
        let err = CompileError::type_mismatch("Int", "String", Span::new(3, 9));
        assert_eq!(err.code(), Some(ErrorCode::TypeMismatch));
        assert_eq!(err.span(), Some(Span::new(3, 9)));
        assert!(err.message().contains("Int"));
    }

    #[test]
    fn test_internal_error_has_no_span() {
        let err = CompileError::internal(ErrorCode::DuplicateSymbol, "x rebound");
        assert_eq!(err.span(), None);
        assert_eq!(err.code(), Some(ErrorCode::DuplicateSymbol));
    }

    #[test]
    fn test_warning_kind() {
        let w = CompileWarning::UnusedBinding {
            name: "x".to_string(),
            span: Span::dummy(),
        };
        assert_eq!(w.kind(), "unused_binding");
    }
}
