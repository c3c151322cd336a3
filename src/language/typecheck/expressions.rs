use super::{checker::Checker, declarations::Signature, errors::CheckerErrorKind};
use crate::{
    language::{
        ast::{BinaryOp, CastKind, CompositeKind, Expr, ExprKind, FunctionExpr, PathDomain, UnaryOp},
        span::Span,
    },
    sema::{
        builtins::conversion_function,
        supertype::least_common_supertype,
        ty::{parse_fixed_point, CompositeType, FunctionType, PrimitiveType, Type},
    },
};
use num_bigint::BigInt;
use std::sync::Arc;

fn is_numeric_literal(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Integer(_) | ExprKind::FixedPoint(_) => true,
        ExprKind::Unary {
            op: UnaryOp::Negate,
            expr,
        } => is_numeric_literal(expr),
        _ => false,
    }
}

/// Strips optionals from an expected type, so `[Int]?` guides `[1]`.
fn expected_shape(expected: Option<&Type>) -> Option<&Type> {
    expected.map(Type::unwrap_optional)
}

fn numeric(ty: &Type) -> Option<PrimitiveType> {
    ty.primitive().filter(|primitive| primitive.is_numeric())
}

impl Checker<'_> {
    /// Infers the type of `expr`, guided by `expected`, and records it.
    pub(super) fn check_expression(&mut self, expr: &Expr, expected: Option<&Type>) -> Type {
        if !self.enter_expression(expr.span) {
            self.exit_expression();
            return self.record(expr.id, Type::Invalid);
        }
        let ty = self.infer(expr, expected);
        self.exit_expression();
        self.record(expr.id, ty)
    }

    /// Checks `expr` against `expected`, reporting a mismatch.
    pub(super) fn expect_expression(&mut self, expr: &Expr, expected: &Type) -> Type {
        let actual = self.check_expression(expr, Some(expected));
        if !actual.is_invalid() && !expected.is_invalid() && !actual.is_subtype_of(expected) {
            self.report(
                CheckerErrorKind::TypeMismatch {
                    expected: expected.clone(),
                    actual: actual.clone(),
                },
                expr.span,
            );
        }
        actual
    }

    fn infer(&mut self, expr: &Expr, expected: Option<&Type>) -> Type {
        match &expr.kind {
            ExprKind::Bool(_) => Type::BOOL,
            ExprKind::Nil => Type::nil(),
            ExprKind::String(value) => {
                let wants_character = expected_shape(expected).is_some_and(|ty| ty.is_primitive(PrimitiveType::Character));
                if wants_character && value.chars().count() == 1 {
                    Type::Primitive(PrimitiveType::Character)
                } else {
                    Type::STRING
                }
            }
            ExprKind::Integer(value) => self.check_integer_literal(value, expected, expr.span),
            ExprKind::FixedPoint(literal) => self.check_fixed_point_literal(literal, expected, expr.span),
            ExprKind::Address(_) => Type::Primitive(PrimitiveType::Address),
            ExprKind::Path { domain, .. } => match domain {
                PathDomain::Storage => Type::Primitive(PrimitiveType::StoragePath),
                PathDomain::Public => Type::Primitive(PrimitiveType::PublicPath),
            },
            ExprKind::Identifier(name) => self.check_identifier(name, expr.span),
            ExprKind::Array(elements) => self.check_array_literal(elements, expected, expr.span),
            ExprKind::Dictionary(entries) => self.check_dictionary_literal(entries, expected, expr.span),
            ExprKind::Unary { op, expr: operand } => self.check_unary(*op, operand, expected, expr.span),
            ExprKind::Binary { op, left, right } => self.check_binary(*op, left, right, expected, expr.span),
            ExprKind::Conditional { test, then, otherwise } => {
                self.expect_expression(test, &Type::BOOL);
                let then_type = self.check_expression(then, expected);
                let otherwise_type = self.check_expression(otherwise, expected);
                if let Some(expected) = expected {
                    for (branch, ty) in [(then, &then_type), (otherwise, &otherwise_type)] {
                        if !ty.is_invalid() && !ty.is_subtype_of(expected) {
                            self.report(
                                CheckerErrorKind::TypeMismatch {
                                    expected: expected.clone(),
                                    actual: ty.clone(),
                                },
                                branch.span,
                            );
                        }
                    }
                    return expected.clone();
                }
                self.common_supertype(&[then_type, otherwise_type], expr.span)
            }
            ExprKind::Member { expr: receiver, name, optional } => {
                self.check_member(receiver, name, *optional, expr.span)
            }
            ExprKind::Index { expr: target, index } => self.check_index(target, index, expr.span),
            ExprKind::Invocation { callee, args } => self.check_invocation(callee, args, false, expr.span),
            ExprKind::Create(invocation) => self.check_create(invocation, expr.span),
            ExprKind::Destroy(operand) => {
                let ty = self.check_expression(operand, None);
                if !ty.is_invalid() && !ty.is_resource() {
                    self.report(CheckerErrorKind::InvalidDestruction { ty }, expr.span);
                }
                self.consume(operand);
                Type::VOID
            }
            ExprKind::Move(operand) => {
                let ty = self.check_expression(operand, expected);
                if !ty.is_invalid() && !ty.is_never() && !ty.is_resource() {
                    self.report(CheckerErrorKind::InvalidMoveOperation { ty: ty.clone() }, expr.span);
                }
                self.consume(operand);
                ty
            }
            ExprKind::Reference { expr: referenced, ty } => {
                let target = self.resolve_type(&ty.ty, ty.span);
                self.check_reference(referenced, target, expr.span)
            }
            ExprKind::Cast { expr: operand, kind, ty } => {
                let target = self.resolve_annotation(ty);
                match kind {
                    CastKind::Static => {
                        self.expect_expression(operand, &target);
                        target
                    }
                    CastKind::Failable => {
                        self.check_expression(operand, None);
                        Type::optional(target)
                    }
                    CastKind::Force => {
                        self.check_expression(operand, None);
                        target
                    }
                }
            }
            ExprKind::ForceUnwrap(operand) => {
                let expected = expected.map(|ty| Type::optional(ty.clone()));
                match self.check_expression(operand, expected.as_ref()) {
                    Type::Optional(inner) => *inner,
                    other => other,
                }
            }
            ExprKind::Function(function) => self.check_function_expression(function, expr.span),
        }
    }

    pub(super) fn common_supertype(&mut self, types: &[Type], span: Span) -> Type {
        match least_common_supertype(types) {
            Some(ty) => ty,
            None => {
                self.report(CheckerErrorKind::TypeAnnotationRequired, span);
                Type::Invalid
            }
        }
    }

    // Literals

    fn check_integer_literal(&mut self, value: &BigInt, expected: Option<&Type>, span: Span) -> Type {
        let ty = match expected_shape(expected).and_then(Type::primitive) {
            Some(primitive) if primitive.is_signed_integer() || primitive.is_unsigned_integer() => primitive,
            _ => PrimitiveType::Int,
        };
        if !ty.integer_in_range(value) {
            let (min, max) = ty.integer_range().unwrap_or((None, None));
            self.report(
                CheckerErrorKind::InvalidIntegerLiteralRange {
                    ty: Type::Primitive(ty),
                    min,
                    max,
                },
                span,
            );
        }
        Type::Primitive(ty)
    }

    fn check_fixed_point_literal(&mut self, literal: &str, expected: Option<&Type>, span: Span) -> Type {
        let negative = literal.trim_start().starts_with('-');
        let ty = match expected_shape(expected).and_then(Type::primitive) {
            Some(primitive) if primitive.is_concrete_fixed_point() => primitive,
            _ if negative => PrimitiveType::Fix64,
            _ => PrimitiveType::UFix64,
        };
        let in_range = match (parse_fixed_point(literal), ty.fixed_point_range()) {
            (Some(value), Some((min, max))) => value >= min && value <= max,
            _ => false,
        };
        if !in_range {
            self.report(
                CheckerErrorKind::InvalidFixedPointLiteral {
                    literal: literal.to_string(),
                    ty: Type::Primitive(ty),
                },
                span,
            );
        }
        Type::Primitive(ty)
    }

    fn check_array_literal(&mut self, elements: &[Expr], expected: Option<&Type>, span: Span) -> Type {
        match expected_shape(expected) {
            Some(Type::VariableSized(element)) => {
                let element = (**element).clone();
                for expr in elements {
                    self.check_element(expr, &element);
                }
                Type::array(element)
            }
            Some(Type::ConstantSized { element, size }) => {
                let (element, size) = ((**element).clone(), *size);
                for expr in elements {
                    self.check_element(expr, &element);
                }
                if elements.len() as u64 != size {
                    self.report(
                        CheckerErrorKind::ConstantSizedArrayLiteralSize {
                            expected: size,
                            actual: elements.len(),
                        },
                        span,
                    );
                }
                Type::constant_array(element, size)
            }
            _ => {
                let types: Vec<Type> = elements
                    .iter()
                    .map(|expr| {
                        let ty = self.check_expression(expr, None);
                        self.check_transfer_position(expr, &ty);
                        ty
                    })
                    .collect();
                if types.is_empty() {
                    self.report(CheckerErrorKind::TypeAnnotationRequired, span);
                    return Type::Invalid;
                }
                match self.common_supertype(&types, span) {
                    Type::Invalid => Type::Invalid,
                    element => Type::array(element),
                }
            }
        }
    }

    fn check_element(&mut self, expr: &Expr, element: &Type) {
        let ty = self.expect_expression(expr, element);
        self.check_transfer_position(expr, &ty);
    }

    fn check_dictionary_literal(&mut self, entries: &[(Expr, Expr)], expected: Option<&Type>, span: Span) -> Type {
        if let Some(Type::Dictionary { key, value }) = expected_shape(expected) {
            let (key, value) = ((**key).clone(), (**value).clone());
            for (key_expr, value_expr) in entries {
                self.expect_expression(key_expr, &key);
                self.check_element(value_expr, &value);
            }
            return Type::dictionary(key, value);
        }

        let mut keys = Vec::with_capacity(entries.len());
        let mut values = Vec::with_capacity(entries.len());
        for (key_expr, value_expr) in entries {
            keys.push(self.check_expression(key_expr, None));
            let value = self.check_expression(value_expr, None);
            self.check_transfer_position(value_expr, &value);
            values.push(value);
        }
        if entries.is_empty() {
            self.report(CheckerErrorKind::TypeAnnotationRequired, span);
            return Type::Invalid;
        }
        let key = self.common_supertype(&keys, span);
        let value = self.common_supertype(&values, span);
        if key.is_invalid() || value.is_invalid() {
            return Type::Invalid;
        }
        if !key.is_hashable() {
            self.report(CheckerErrorKind::InvalidDictionaryKeyType { ty: key.clone() }, span);
        }
        Type::dictionary(key, value)
    }

    // Operators

    fn check_unary(&mut self, op: UnaryOp, operand: &Expr, expected: Option<&Type>, span: Span) -> Type {
        match op {
            UnaryOp::Not => {
                let ty = self.check_expression(operand, Some(&Type::BOOL));
                if !ty.is_invalid() && !ty.is_primitive(PrimitiveType::Bool) {
                    self.report(
                        CheckerErrorKind::InvalidUnaryOperand {
                            operation: "!",
                            expected: Type::BOOL,
                            actual: ty,
                        },
                        span,
                    );
                }
                Type::BOOL
            }
            UnaryOp::Negate => {
                // Negative literals are range-checked as a whole.
                let ty = match &operand.kind {
                    ExprKind::Integer(value) => {
                        let ty = self.check_integer_literal(&-value, expected, span);
                        return self.record(operand.id, ty);
                    }
                    ExprKind::FixedPoint(literal) => {
                        let ty = self.check_fixed_point_literal(&format!("-{literal}"), expected, span);
                        return self.record(operand.id, ty);
                    }
                    _ => self.check_expression(operand, expected),
                };
                if ty.is_invalid() {
                    return ty;
                }
                let signed = numeric(&ty).is_some_and(|primitive| PrimitiveType::SignedNumber.contains(primitive));
                if !signed {
                    self.report(
                        CheckerErrorKind::InvalidUnaryOperand {
                            operation: "-",
                            expected: Type::Primitive(PrimitiveType::SignedNumber),
                            actual: ty,
                        },
                        span,
                    );
                    return Type::Invalid;
                }
                ty
            }
        }
    }

    /// Checks both operands, letting a literal take the type of the other side.
    fn check_operands(&mut self, left: &Expr, right: &Expr, expected: Option<&Type>) -> (Type, Type) {
        if is_numeric_literal(left) && !is_numeric_literal(right) {
            let right_type = self.check_expression(right, expected);
            let left_type = self.check_expression(left, Some(&right_type));
            (left_type, right_type)
        } else {
            let left_type = self.check_expression(left, expected);
            let right_type = self.check_expression(right, Some(&left_type));
            (left_type, right_type)
        }
    }

    fn check_binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr, expected: Option<&Type>, span: Span) -> Type {
        let invalid_operands = |left: &Type, right: &Type| CheckerErrorKind::InvalidBinaryOperands {
            operation: op.symbol(),
            left: left.clone(),
            right: right.clone(),
        };

        if op.is_arithmetic() || op.is_comparison() {
            let expected = expected.filter(|ty| op.is_arithmetic() && numeric(ty).is_some());
            let (left_type, right_type) = self.check_operands(left, right, expected);
            if left_type.is_invalid() || right_type.is_invalid() {
                return Type::Invalid;
            }
            if numeric(&left_type).is_none() || left_type != right_type {
                self.report(invalid_operands(&left_type, &right_type), span);
                return Type::Invalid;
            }
            return if op.is_comparison() { Type::BOOL } else { left_type };
        }

        match op {
            BinaryOp::Equal | BinaryOp::NotEqual => {
                let (left_type, right_type) = self.check_operands(left, right, None);
                if left_type.is_invalid() || right_type.is_invalid() {
                    return Type::BOOL;
                }
                if !left_type.is_subtype_of(&right_type) && !right_type.is_subtype_of(&left_type) {
                    self.report(invalid_operands(&left_type, &right_type), span);
                } else if let Some(ty) = [&left_type, &right_type].into_iter().find(|ty| !ty.is_equatable()) {
                    self.report(CheckerErrorKind::NotEquatableType { ty: ty.clone() }, span);
                }
                Type::BOOL
            }
            BinaryOp::And | BinaryOp::Or => {
                let left_type = self.check_expression(left, Some(&Type::BOOL));
                let right_type = self.check_expression(right, Some(&Type::BOOL));
                let valid = |ty: &Type| ty.is_invalid() || ty.is_primitive(PrimitiveType::Bool);
                if !valid(&left_type) || !valid(&right_type) {
                    self.report(invalid_operands(&left_type, &right_type), span);
                }
                Type::BOOL
            }
            BinaryOp::NilCoalescing => {
                let expected_left = expected.map(|ty| Type::optional(ty.clone()));
                let left_type = self.check_expression(left, expected_left.as_ref());
                let inner = match &left_type {
                    Type::Optional(inner) => (**inner).clone(),
                    Type::Invalid => return Type::Invalid,
                    other => {
                        let right_type = self.check_expression(right, None);
                        self.report(invalid_operands(other, &right_type), span);
                        return Type::Invalid;
                    }
                };
                let right_type = self.check_expression(right, expected.or(Some(&inner)));
                if let Some(expected) = expected {
                    return expected.clone();
                }
                self.common_supertype(&[inner, right_type], span)
            }
            _ => Type::Invalid,
        }
    }

    // Names and calls

    /// Composite whose constructor `callee` names, if any.
    fn constructed_composite(&self, callee: &Expr) -> Option<Arc<CompositeType>> {
        let ExprKind::Identifier(name) = &callee.kind else {
            return None;
        };
        if self.lookup_variable(name).is_some() {
            return None;
        }
        match self.lookup_nominal_type(name)? {
            Type::Composite(composite) => Some(composite),
            _ => None,
        }
    }

    pub(super) fn check_identifier(&mut self, name: &str, span: Span) -> Type {
        if let Some(variable) = self.lookup_variable(name).cloned() {
            if variable.resource.is_some_and(|id| self.resources.is_invalidated(id)) {
                self.report(
                    CheckerErrorKind::ResourceUseAfterInvalidation {
                        name: name.to_string(),
                    },
                    span,
                );
            }
            return variable.ty;
        }

        if let Some(Type::Composite(composite)) = self.lookup_nominal_type(name) {
            return match composite.kind {
                CompositeKind::Contract => Type::Composite(composite),
                CompositeKind::Enum => {
                    let raw = Type::Primitive(composite.enum_raw_type.unwrap_or(PrimitiveType::Int));
                    Type::function(vec![raw], Type::optional(Type::Composite(composite)))
                }
                CompositeKind::Structure | CompositeKind::Resource => {
                    let params = self
                        .elaboration
                        .composite(&composite.id())
                        .and_then(|info| info.initializer.as_ref())
                        .map(|initializer| initializer.params.clone())
                        .unwrap_or_default();
                    Type::Function(Arc::new(FunctionType::new(params, Type::Composite(composite))))
                }
            };
        }

        self.report(
            CheckerErrorKind::NotDeclared {
                name: name.to_string(),
                kind: "variable",
            },
            span,
        );
        Type::Invalid
    }

    fn check_invocation(&mut self, callee: &Expr, args: &[Expr], in_create: bool, span: Span) -> Type {
        if let ExprKind::Identifier(name) = &callee.kind {
            let shadowed = self.lookup_variable(name).is_some() || self.lookup_nominal_type(name).is_some();
            if let Some(target) = conversion_function(name).filter(|_| !shadowed) {
                return self.check_conversion(callee, target, args, span);
            }
        }

        let constructed = self.constructed_composite(callee);
        let callee_type = self.check_expression(callee, None);
        if let Some(composite) = &constructed {
            if composite.is_resource() && !in_create {
                self.report(
                    CheckerErrorKind::MissingCreate {
                        ty: Type::Composite(composite.clone()),
                    },
                    span,
                );
            }
        }

        let Type::Function(function) = callee_type else {
            if !callee_type.is_invalid() {
                self.report(CheckerErrorKind::NotCallable { ty: callee_type }, callee.span);
            }
            for arg in args {
                self.check_expression(arg, None);
            }
            return Type::Invalid;
        };

        if args.len() != function.params.len() {
            self.report(
                CheckerErrorKind::ArgumentCount {
                    expected: function.params.len(),
                    actual: args.len(),
                },
                span,
            );
        }
        for (index, arg) in args.iter().enumerate() {
            match function.params.get(index) {
                Some(param) => {
                    let ty = self.expect_expression(arg, param);
                    self.check_transfer_position(arg, &ty);
                }
                None => {
                    self.check_expression(arg, None);
                }
            }
        }
        function.return_type.clone()
    }

    fn check_conversion(&mut self, callee: &Expr, target: PrimitiveType, args: &[Expr], span: Span) -> Type {
        let target_type = Type::Primitive(target);
        let number = Type::Primitive(PrimitiveType::Number);
        self.record(callee.id, Type::function(vec![number.clone()], target_type.clone()));
        if args.len() != 1 {
            self.report(
                CheckerErrorKind::ArgumentCount {
                    expected: 1,
                    actual: args.len(),
                },
                span,
            );
        }
        for arg in args {
            let ty = self.check_expression(arg, Some(&target_type));
            if !ty.is_invalid() && numeric(&ty).is_none() {
                self.report(
                    CheckerErrorKind::TypeMismatch {
                        expected: number.clone(),
                        actual: ty,
                    },
                    arg.span,
                );
            }
        }
        target_type
    }

    fn check_create(&mut self, invocation: &Expr, span: Span) -> Type {
        let ExprKind::Invocation { callee, args } = &invocation.kind else {
            let ty = self.check_expression(invocation, None);
            if !ty.is_invalid() {
                self.report(CheckerErrorKind::InvalidConstruction { ty }, span);
            }
            return Type::Invalid;
        };
        let constructed = self.constructed_composite(callee);
        let ty = self.check_invocation(callee, args, true, invocation.span);
        let ty = self.record(invocation.id, ty);
        match constructed {
            Some(composite) if composite.is_resource() => ty,
            _ => {
                if !ty.is_invalid() {
                    self.report(CheckerErrorKind::InvalidConstruction { ty: ty.clone() }, span);
                }
                ty
            }
        }
    }

    fn check_reference(&mut self, referenced: &Expr, target: Type, span: Span) -> Type {
        let (reference, optional) = match &target {
            Type::Reference(reference) => (reference.clone(), false),
            Type::Optional(inner) => match &**inner {
                Type::Reference(reference) => (reference.clone(), true),
                _ => {
                    self.check_expression(referenced, None);
                    self.report(CheckerErrorKind::NonReferenceType { ty: target.clone() }, span);
                    return Type::Invalid;
                }
            },
            Type::Invalid => {
                self.check_expression(referenced, None);
                return Type::Invalid;
            }
            other => {
                self.check_expression(referenced, None);
                self.report(CheckerErrorKind::NonReferenceType { ty: other.clone() }, span);
                return Type::Invalid;
            }
        };

        let borrowed = if optional {
            Type::optional(reference.ty.clone())
        } else {
            reference.ty.clone()
        };
        let actual = self.check_expression(referenced, Some(&borrowed));
        if actual.is_invalid() {
            return target;
        }
        if matches!(actual.unwrap_optional(), Type::Reference(_)) {
            self.report(CheckerErrorKind::NestedReference { ty: actual }, span);
        } else if !actual.is_subtype_of(&borrowed) {
            self.report(
                CheckerErrorKind::TypeMismatch {
                    expected: borrowed,
                    actual,
                },
                referenced.span,
            );
        }
        target
    }

    fn check_function_expression(&mut self, function: &FunctionExpr, span: Span) -> Type {
        let param_types: Vec<Type> = function
            .params
            .iter()
            .map(|param| self.resolve_annotation(&param.ty))
            .collect();
        let return_type = match &function.return_type {
            Some(annotation) => self.resolve_annotation(annotation),
            None => Type::VOID,
        };
        let enclosing = self
            .functions
            .last()
            .map(|function| function.name.clone())
            .unwrap_or_default();
        let signature = Signature {
            name: format!("{enclosing}.<closure>"),
            params: &function.params,
            param_types: param_types.clone(),
            return_type: return_type.clone(),
            is_initializer: false,
        };
        self.check_function(&signature, Some(&function.body), span, None);
        Type::function(param_types, return_type)
    }
}
