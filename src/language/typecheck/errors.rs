use crate::{
    language::{ast::CompositeKind, span::Span},
    sema::{access::Access, conformance::ResolutionError, ty::Type},
};
use num_bigint::BigInt;
use std::fmt;
use thiserror::Error;

fn render_range(min: &Option<BigInt>, max: &Option<BigInt>) -> String {
    let bound = |value: &Option<BigInt>, infinite: &str| {
        value
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| infinite.to_string())
    };
    format!("[{}, {}]", bound(min, "-inf"), bound(max, "+inf"))
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum CheckerErrorKind {
    #[error("cannot find {kind} in this scope: `{name}`")]
    NotDeclared { name: String, kind: &'static str },
    #[error("cannot redeclare `{name}`: it is already declared")]
    Redeclaration { name: String },
    #[error("mismatched types: expected `{expected}`, got `{actual}`")]
    TypeMismatch { expected: Type, actual: Type },
    #[error("cannot apply unary operation `{operation}` to type: expected `{expected}`, got `{actual}`")]
    InvalidUnaryOperand {
        operation: &'static str,
        expected: Type,
        actual: Type,
    },
    #[error("cannot apply binary operation `{operation}` to types: `{left}`, `{right}`")]
    InvalidBinaryOperands {
        operation: &'static str,
        left: Type,
        right: Type,
    },
    #[error("cannot compare values of non-equatable type `{ty}`")]
    NotEquatableType { ty: Type },
    #[error("cannot infer type: requires an explicit type annotation")]
    TypeAnnotationRequired,
    #[error("integer literal out of range for `{ty}`: expected a value in {}", render_range(.min, .max))]
    InvalidIntegerLiteralRange {
        ty: Type,
        min: Option<BigInt>,
        max: Option<BigInt>,
    },
    #[error("invalid fixed-point literal `{literal}` for `{ty}`")]
    InvalidFixedPointLiteral { literal: String, ty: Type },
    #[error("incorrect number of array literal elements: expected {expected}, got {actual}")]
    ConstantSizedArrayLiteralSize { expected: u64, actual: usize },
    #[error("invalid base for constant sized array size: expected decimal, got base {base}")]
    InvalidConstantSizedTypeBase { base: u32 },
    #[error("invalid size for constant sized array: `{size}` is not in the range [0, {}]", u64::MAX)]
    InvalidConstantSizedTypeSize { size: String },
    #[error("cannot use `{ty}` as dictionary key type")]
    InvalidDictionaryKeyType { ty: Type },
    #[error("cannot access `{member}`: member requires `{access}`, but {found} was used")]
    InvalidAccess {
        member: String,
        access: Access,
        found: String,
    },
    #[error("cannot assign to `{member}`: fields may only be assigned inside their declaring type")]
    InvalidAssignmentAccess { member: String },
    #[error("`{name}` is not an entitlement")]
    InvalidNonEntitlementAccess { name: String },
    #[error("entitlement access is not allowed on {declaration}")]
    InvalidEntitlementAccess { declaration: String },
    #[error("cannot assign to an index through {found}: requires `Mutate` or `Insert, Remove` authorization")]
    UnauthorizedReferenceAssignment { found: String },
    #[error("value of type `{ty}` has no member `{name}`")]
    NotDeclaredMember { ty: Type, name: String },
    #[error("member `{name}` is not available for resource container type `{ty}`")]
    InvalidResourceArrayMember { ty: Type, name: String },
    #[error("cannot assign to constant member `{name}`")]
    AssignmentToConstantMember { name: String },
    #[error("cannot assign to constant `{name}`")]
    AssignmentToConstant { name: String },
    #[error("cannot assign to this expression")]
    InvalidAssignmentTarget,
    #[error("cannot call type `{ty}`")]
    NotCallable { ty: Type },
    #[error("incorrect number of arguments: expected {expected}, got {actual}")]
    ArgumentCount { expected: usize, actual: usize },
    #[error("cannot index into value of type `{ty}`")]
    NotIndexable { ty: Type },
    #[error("cannot iterate over value of type `{ty}`")]
    NotIterable { ty: Type },
    #[error("optional binding requires an optional value, got `{ty}`")]
    InvalidOptionalBinding { ty: Type },
    #[error("missing return statement")]
    MissingReturnStatement,
    #[error("`{statement}` can only be used inside a loop")]
    ControlStatementOutsideLoop { statement: &'static str },
    #[error("expression nesting exceeds the maximum depth of {max}")]
    MaxNestingDepthExceeded { max: usize },
    #[error("cannot create reference to reference type `{ty}`")]
    NestedReference { ty: Type },
    #[error("expected reference type, got `{ty}`")]
    NonReferenceType { ty: Type },
    #[error("invalid enum raw type `{ty}`: expected a concrete integer type")]
    InvalidEnumRawType { ty: Type },

    #[error("missing move operation `<-` for resource of type `{ty}`")]
    MissingMoveOperation { ty: Type },
    #[error("invalid move operation `<-` for non-resource type `{ty}`")]
    InvalidMoveOperation { ty: Type },
    #[error("missing resource annotation `@` for type `{ty}`")]
    MissingResourceAnnotation { ty: Type },
    #[error("invalid resource annotation `@` for non-resource type `{ty}`")]
    InvalidResourceAnnotation { ty: Type },
    #[error("use of previously moved or destroyed resource `{name}`")]
    ResourceUseAfterInvalidation { name: String },
    #[error("loss of resource{}", .name.as_ref().map(|name| format!(" `{name}`")).unwrap_or_default())]
    ResourceLoss { name: Option<String> },
    #[error("field `{name}` of {kind} type cannot have resource type `{ty}`")]
    InvalidResourceField {
        name: String,
        kind: &'static str,
        ty: Type,
    },
    #[error("cannot create resource `{ty}` without `create`")]
    MissingCreate { ty: Type },
    #[error("cannot use `create` with non-resource type `{ty}`")]
    InvalidConstruction { ty: Type },
    #[error("cannot destroy non-resource type `{ty}`")]
    InvalidDestruction { ty: Type },

    #[error("`{type_name}` does not conform to `{interface}`: missing {}", .missing.join(", "))]
    Conformance {
        type_name: String,
        interface: String,
        missing: Vec<String>,
    },
    #[error("`{type_name}` inherits conflicting default implementations of `{function}` from {}", .interfaces.join(", "))]
    DefaultFunctionConflict {
        type_name: String,
        function: String,
        interfaces: Vec<String>,
    },
    #[error("`{interface}` has a cyclic conformance: {}", .cycle.join(" -> "))]
    CyclicConformance { interface: String, cycle: Vec<String> },
    #[error("access of `{member}` in `{type_name}` must be `{expected}`, found `{actual}`")]
    ConformanceAccessMismatch {
        type_name: String,
        member: String,
        expected: Access,
        actual: Access,
    },
    #[error("`{name}` is not an interface")]
    InvalidConformance { name: String },
    #[error("{} `{type_name}` cannot conform to {} interface `{interface}`", .actual.keyword(), .expected.keyword())]
    CompositeKindMismatch {
        type_name: String,
        interface: String,
        expected: CompositeKind,
        actual: CompositeKind,
    },
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
}

impl CheckerErrorKind {
    /// Stable name of the error kind, used as a diagnostic code.
    pub fn code(&self) -> &'static str {
        use CheckerErrorKind::*;
        match self {
            NotDeclared { .. } => "NotDeclared",
            Redeclaration { .. } => "Redeclaration",
            TypeMismatch { .. } => "TypeMismatch",
            InvalidUnaryOperand { .. } => "InvalidUnaryOperand",
            InvalidBinaryOperands { .. } => "InvalidBinaryOperands",
            NotEquatableType { .. } => "NotEquatableType",
            TypeAnnotationRequired => "TypeAnnotationRequired",
            InvalidIntegerLiteralRange { .. } => "InvalidIntegerLiteralRange",
            InvalidFixedPointLiteral { .. } => "InvalidFixedPointLiteral",
            ConstantSizedArrayLiteralSize { .. } => "ConstantSizedArrayLiteralSize",
            InvalidConstantSizedTypeBase { .. } => "InvalidConstantSizedTypeBase",
            InvalidConstantSizedTypeSize { .. } => "InvalidConstantSizedTypeSize",
            InvalidDictionaryKeyType { .. } => "InvalidDictionaryKeyType",
            InvalidAccess { .. } => "InvalidAccess",
            InvalidAssignmentAccess { .. } => "InvalidAssignmentAccess",
            InvalidNonEntitlementAccess { .. } => "InvalidNonEntitlementAccess",
            InvalidEntitlementAccess { .. } => "InvalidEntitlementAccess",
            UnauthorizedReferenceAssignment { .. } => "UnauthorizedReferenceAssignment",
            NotDeclaredMember { .. } => "NotDeclaredMember",
            InvalidResourceArrayMember { .. } => "InvalidResourceArrayMember",
            AssignmentToConstantMember { .. } => "AssignmentToConstantMember",
            AssignmentToConstant { .. } => "AssignmentToConstant",
            InvalidAssignmentTarget => "InvalidAssignmentTarget",
            NotCallable { .. } => "NotCallable",
            ArgumentCount { .. } => "ArgumentCount",
            NotIndexable { .. } => "NotIndexable",
            NotIterable { .. } => "NotIterable",
            InvalidOptionalBinding { .. } => "InvalidOptionalBinding",
            MissingReturnStatement => "MissingReturnStatement",
            ControlStatementOutsideLoop { .. } => "ControlStatementOutsideLoop",
            MaxNestingDepthExceeded { .. } => "MaxNestingDepthExceeded",
            NestedReference { .. } => "NestedReference",
            NonReferenceType { .. } => "NonReferenceType",
            InvalidEnumRawType { .. } => "InvalidEnumRawType",
            MissingMoveOperation { .. } => "MissingMoveOperation",
            InvalidMoveOperation { .. } => "InvalidMoveOperation",
            MissingResourceAnnotation { .. } => "MissingResourceAnnotation",
            InvalidResourceAnnotation { .. } => "InvalidResourceAnnotation",
            ResourceUseAfterInvalidation { .. } => "ResourceUseAfterInvalidation",
            ResourceLoss { .. } => "ResourceLoss",
            InvalidResourceField { .. } => "InvalidResourceField",
            MissingCreate { .. } => "MissingCreate",
            InvalidConstruction { .. } => "InvalidConstruction",
            InvalidDestruction { .. } => "InvalidDestruction",
            Conformance { .. } => "Conformance",
            DefaultFunctionConflict { .. } => "DefaultFunctionConflict",
            CyclicConformance { .. } => "CyclicConformance",
            ConformanceAccessMismatch { .. } => "ConformanceAccessMismatch",
            InvalidConformance { .. } => "InvalidConformance",
            CompositeKindMismatch { .. } => "CompositeKindMismatch",
            Resolution(_) => "Resolution",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CheckerError {
    pub kind: CheckerErrorKind,
    pub span: Span,
    pub help: Option<String>,
}

impl CheckerError {
    pub fn new(kind: CheckerErrorKind, span: Span) -> Self {
        Self {
            kind,
            span,
            help: None,
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn display_message(&self) -> String {
        format!("[{}] {}", self.kind.code(), self.kind)
    }
}

impl fmt::Display for CheckerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind.fmt(f)
    }
}

impl std::error::Error for CheckerError {}

/// Every error reported by one checker pass, in report order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CheckerErrors {
    pub errors: Vec<CheckerError>,
}

impl CheckerErrors {
    pub fn new(errors: Vec<CheckerError>) -> Self {
        Self { errors }
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CheckerError> {
        self.errors.iter()
    }

    pub fn kinds(&self) -> impl Iterator<Item = &CheckerErrorKind> {
        self.errors.iter().map(|error| &error.kind)
    }
}

impl fmt::Display for CheckerErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.as_slice() {
            [only] => write!(f, "checking failed: {only}"),
            errors => {
                write!(f, "checking failed with {} errors", errors.len())?;
                for error in errors {
                    write!(f, "\n  {error}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for CheckerErrors {}

impl IntoIterator for CheckerErrors {
    type Item = CheckerError;
    type IntoIter = std::vec::IntoIter<CheckerError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sema::ty::PrimitiveType;

    #[test]
    fn integer_range_message_renders_open_bounds() {
        let kind = CheckerErrorKind::InvalidIntegerLiteralRange {
            ty: Type::UINT,
            min: Some(BigInt::from(0)),
            max: None,
        };
        assert_eq!(
            kind.to_string(),
            "integer literal out of range for `UInt`: expected a value in [0, +inf]"
        );
    }

    #[test]
    fn error_list_display() {
        let errors = CheckerErrors::new(vec![
            CheckerError::new(CheckerErrorKind::TypeAnnotationRequired, Span::new(0, 2)),
            CheckerError::new(
                CheckerErrorKind::TypeMismatch {
                    expected: Type::Primitive(PrimitiveType::Int8),
                    actual: Type::STRING,
                },
                Span::new(3, 4),
            ),
        ]);
        let rendered = errors.to_string();
        assert!(rendered.starts_with("checking failed with 2 errors"));
        assert!(rendered.contains("expected `Int8`, got `String`"));
        assert_eq!(errors.errors[1].display_message(), "[TypeMismatch] mismatched types: expected `Int8`, got `String`");
    }

    #[test]
    fn resource_loss_names_variable() {
        let kind = CheckerErrorKind::ResourceLoss {
            name: Some("r".into()),
        };
        assert_eq!(kind.to_string(), "loss of resource `r`");
        assert_eq!(
            CheckerErrorKind::ResourceLoss { name: None }.to_string(),
            "loss of resource"
        );
    }
}
