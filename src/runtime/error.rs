use crate::{
    language::{
        location::{Address, Location},
        span::Span,
    },
    runtime::{metering::MeteringError, value::PathValue},
    sema::ty::Type,
};
use std::fmt;
use thiserror::Error;

pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Whether a failure is the program's fault or a bug in the interpreter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    User,
    Internal,
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum RuntimeError {
    #[error("pre-condition failed{}", render_message(.message))]
    PreCondition { message: String },
    #[error("post-condition failed{}", render_message(.message))]
    PostCondition { message: String },
    #[error("{message}")]
    Panic { message: String },
    #[error("overflow: result does not fit into `{ty}`")]
    Overflow { ty: Type },
    #[error("underflow: result does not fit into `{ty}`")]
    Underflow { ty: Type },
    #[error("division by zero")]
    DivisionByZero,
    #[error("array index out of bounds: {index}, but size is {size}")]
    ArrayIndexOutOfBounds { index: String, size: usize },
    #[error("unexpectedly found nil while forcing an Optional value")]
    ForceNil,
    #[error("unexpectedly found non-`{expected}` while force-casting value: got `{actual}`")]
    ForceCastTypeMismatch { expected: Type, actual: Type },
    #[error("mismatched types: expected `{expected}`, got `{actual}`")]
    TypeMismatch { expected: Type, actual: Type },
    /// A storage reference found its slot empty (`cause` is `None`) or
    /// holding a value that no longer conforms to the borrowed type.
    #[error("failed to dereference {path} in account {address}: {}", render_dereference(.cause))]
    Dereference {
        address: Address,
        path: PathValue,
        #[source]
        cause: Option<Box<RuntimeError>>,
    },
    #[error("resource loss: attempted to overwrite or drop resource of type `{ty}`")]
    ResourceLoss { ty: Type },
    #[error("cannot store non-storable value of type `{ty}`")]
    NonStorableValue { ty: Type },
    #[error("cannot create a reference to a reference of type `{ty}`")]
    NestedReference { ty: Type },
    #[error("referenced resource has been moved or destroyed")]
    InvalidatedResourceReference,
    #[error("resource has been destroyed and cannot be accessed")]
    DestroyedResource,
    #[error("cannot find `{name}` in this scope")]
    NotDeclared { name: String },
    #[error("cannot invoke value of type `{ty}`")]
    NotInvokable { ty: Type },
    #[error("incorrect number of arguments: expected {expected}, got {actual}")]
    ArgumentCount { expected: usize, actual: usize },
    #[error("call stack depth exceeded the limit of {limit}")]
    CallStackLimitExceeded { limit: usize },
    #[error(transparent)]
    Metering(#[from] MeteringError),
    #[error("internal error: resource `{name}` was used after it was moved")]
    InvalidatedResource { name: String },
    #[error("internal error: member `{member}` has unexpected kind of value `{actual}`")]
    MemberAccessType { member: String, actual: Type },
    #[error("internal error: transferred value of type `{actual}` does not conform to `{expected}`")]
    ValueTransferType { expected: Type, actual: Type },
    #[error("internal error: authorization `{actual}` cannot be widened to `{expected}`")]
    UnexpectedMappedEntitlement { expected: String, actual: String },
    #[error("internal error: {message}")]
    Unreachable { message: String },
}

fn render_message(message: &str) -> String {
    if message.is_empty() {
        String::new()
    } else {
        format!(": {message}")
    }
}

fn render_dereference(cause: &Option<Box<RuntimeError>>) -> &'static str {
    match cause {
        None => "no value stored",
        Some(_) => "stored value changed type",
    }
}

impl RuntimeError {
    pub fn class(&self) -> ErrorClass {
        match self {
            RuntimeError::InvalidatedResource { .. }
            | RuntimeError::MemberAccessType { .. }
            | RuntimeError::ValueTransferType { .. }
            | RuntimeError::UnexpectedMappedEntitlement { .. }
            | RuntimeError::Unreachable { .. } => ErrorClass::Internal,
            _ => ErrorClass::User,
        }
    }

    pub fn is_internal(&self) -> bool {
        self.class() == ErrorClass::Internal
    }

    pub(crate) fn unreachable(message: impl Into<String>) -> Self {
        RuntimeError::Unreachable {
            message: message.into(),
        }
    }
}

/// One entry of the interpreter's call stack.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StackFrame {
    pub function: String,
    pub span: Span,
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}..{}", self.function, self.span.start, self.span.end)
    }
}

/// A runtime failure together with where it happened.
#[derive(Clone, Debug, Error)]
#[error("{cause}")]
pub struct Error {
    #[source]
    pub cause: RuntimeError,
    pub location: Location,
    /// Innermost frame last.
    pub stack_trace: Vec<StackFrame>,
}

impl Error {
    pub fn new(cause: RuntimeError, location: Location) -> Self {
        Self {
            cause,
            location,
            stack_trace: Vec::new(),
        }
    }

    pub fn with_stack_trace(mut self, stack_trace: Vec<StackFrame>) -> Self {
        self.stack_trace = stack_trace;
        self
    }

    pub fn class(&self) -> ErrorClass {
        self.cause.class()
    }

    /// Span of the innermost frame, when one was active.
    pub fn span(&self) -> Option<Span> {
        self.stack_trace.last().map(|frame| frame.span)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn internal_errors_are_classified() {
        assert_eq!(RuntimeError::DivisionByZero.class(), ErrorClass::User);
        assert!(RuntimeError::InvalidatedResource { name: "r".into() }.is_internal());
        assert!(RuntimeError::unreachable("missing body").is_internal());
    }

    #[test]
    fn condition_messages_are_rendered() {
        let error = RuntimeError::PreCondition {
            message: "amount must be positive".into(),
        };
        assert_eq!(error.to_string(), "pre-condition failed: amount must be positive");
        let error = RuntimeError::PostCondition { message: String::new() };
        assert_eq!(error.to_string(), "post-condition failed");
    }

    #[test]
    fn error_exposes_its_cause() {
        let error = Error::new(RuntimeError::ForceNil, Location::script("test")).with_stack_trace(vec![
            StackFrame {
                function: "main".into(),
                span: Span::new(3, 9),
            },
        ]);
        assert_eq!(error.span(), Some(Span::new(3, 9)));
        let source = error.source().map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("unexpectedly found nil while forcing an Optional value"));
    }
}
