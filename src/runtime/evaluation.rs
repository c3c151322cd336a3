use crate::{
    language::ast::{BinaryOp, CastKind, CompositeKind, Expr, ExprKind, FunctionExpr, UnaryOp},
    runtime::{
        error::{RuntimeError, RuntimeResult},
        interpreter::{array_index, int_value, Interpreter},
        metering::MemoryKind,
        numeric,
        reference::{EphemeralReference, ReferenceValue},
        value::{
            ArrayValue, Closure, DictionaryValue, FunctionKind, FunctionValue, PathValue, Value,
        },
    },
    sema::{
        access::Authorization,
        builtins::conversion_function,
        ty::{PrimitiveType, ReferenceType, Type},
    },
};
use indexmap::IndexMap;
use std::rc::Rc;

impl<'a> Interpreter<'a> {
    pub(super) fn recorded_type(&self, expr: &Expr) -> Option<&'a Type> {
        self.elaboration().expression_type(expr.id)
    }

    pub(super) fn evaluate(&mut self, expr: &Expr) -> RuntimeResult<Value> {
        match &expr.kind {
            ExprKind::Bool(value) => Ok(Value::Bool(*value)),
            ExprKind::Nil => Ok(Value::Nil),
            ExprKind::Integer(_) | ExprKind::FixedPoint(_) => {
                numeric::literal(&expr.kind, false, self.recorded_type(expr))
            }
            ExprKind::String(text) => {
                let character = self
                    .recorded_type(expr)
                    .is_some_and(|ty| ty.is_primitive(PrimitiveType::Character));
                if character {
                    Ok(Value::Character(text.clone()))
                } else {
                    self.meter_memory(MemoryKind::String, text.len())?;
                    Ok(Value::String(text.clone()))
                }
            }
            ExprKind::Address(address) => Ok(Value::Address(*address)),
            ExprKind::Path { domain, identifier } => Ok(Value::Path(PathValue {
                domain: *domain,
                identifier: identifier.clone(),
            })),
            ExprKind::Identifier(name) => self.evaluate_identifier(expr, name),
            ExprKind::Array(elements) => self.evaluate_array(expr, elements),
            ExprKind::Dictionary(entries) => self.evaluate_dictionary(expr, entries),
            ExprKind::Unary { op, expr: operand } => match op {
                UnaryOp::Not => Ok(Value::Bool(!self.evaluate_bool(operand)?)),
                UnaryOp::Negate => match &operand.kind {
                    ExprKind::Integer(_) | ExprKind::FixedPoint(_) => {
                        numeric::literal(&operand.kind, true, self.recorded_type(expr))
                    }
                    _ => numeric::negate(&self.evaluate(operand)?),
                },
            },
            ExprKind::Binary { op, left, right } => self.evaluate_binary(*op, left, right),
            ExprKind::Conditional { test, then, otherwise } => {
                if self.evaluate_bool(test)? {
                    self.evaluate(then)
                } else {
                    self.evaluate(otherwise)
                }
            }
            ExprKind::Member {
                expr: receiver,
                name,
                optional,
            } => self.evaluate_member(expr, receiver, name, *optional),
            ExprKind::Index { expr: target, index } => self.evaluate_index(expr, target, index),
            ExprKind::Invocation { callee, args } => {
                let function = match self.evaluate(callee)? {
                    Value::Function(function) => function,
                    other => return Err(RuntimeError::NotInvokable { ty: other.dynamic_type() }),
                };
                let mut arguments = Vec::with_capacity(args.len());
                for arg in args {
                    arguments.push(self.evaluate(arg)?.transfer());
                }
                self.call(&function, arguments, expr.span)
            }
            ExprKind::Create(inner) => self.evaluate(inner),
            ExprKind::Destroy(inner) => {
                let value = match &inner.kind {
                    ExprKind::Identifier(name) => self.environment.take(name)?,
                    _ => self.evaluate(inner)?,
                };
                if value.is_destroyed() {
                    return Err(RuntimeError::DestroyedResource);
                }
                value.destroy();
                Ok(Value::Void)
            }
            ExprKind::Move(inner) => {
                let value = match &inner.kind {
                    ExprKind::Identifier(name) => self.environment.take(name)?,
                    _ => self.evaluate(inner)?,
                };
                Ok(value.transfer())
            }
            ExprKind::Reference { expr: inner, .. } => self.evaluate_reference(expr, inner),
            ExprKind::Cast { expr: inner, kind, .. } => self.evaluate_cast(expr, inner, *kind),
            ExprKind::ForceUnwrap(inner) => self.evaluate(inner)?.into_present().ok_or(RuntimeError::ForceNil),
            ExprKind::Function(function) => Ok(self.closure(expr, function)),
        }
    }

    pub(super) fn evaluate_bool(&mut self, expr: &Expr) -> RuntimeResult<bool> {
        let value = self.evaluate(expr)?;
        value.as_bool().ok_or_else(|| RuntimeError::TypeMismatch {
            expected: Type::BOOL,
            actual: value.dynamic_type(),
        })
    }

    fn evaluate_identifier(&mut self, expr: &Expr, name: &str) -> RuntimeResult<Value> {
        if let Some(value) = self.environment.get(name) {
            return match value {
                Value::Moved => Err(RuntimeError::InvalidatedResource { name: name.to_string() }),
                value => Ok(value),
            };
        }
        if let Some(target) = conversion_function(name) {
            let ty = Type::function(vec![Type::Primitive(PrimitiveType::Number)], Type::Primitive(target));
            return Ok(Value::Function(FunctionValue::new(FunctionKind::Conversion(target), ty)));
        }
        // Type names: contracts evaluate to their instance, composites to
        // their constructor.
        let not_declared = || RuntimeError::NotDeclared { name: name.to_string() };
        match self.recorded_type(expr) {
            Some(Type::Composite(composite)) if composite.kind == CompositeKind::Contract => {
                self.contract(&composite.id()).ok_or_else(not_declared)
            }
            Some(ty @ Type::Function(function)) => {
                let kind = match &function.return_type {
                    Type::Composite(composite) => FunctionKind::Constructor(composite.clone()),
                    Type::Optional(inner) => match &**inner {
                        Type::Composite(composite) if composite.kind == CompositeKind::Enum => {
                            FunctionKind::EnumConstructor(composite.clone())
                        }
                        _ => return Err(not_declared()),
                    },
                    _ => return Err(not_declared()),
                };
                Ok(Value::Function(FunctionValue::new(kind, ty.clone())))
            }
            _ => Err(not_declared()),
        }
    }

    fn evaluate_array(&mut self, expr: &Expr, elements: &[Expr]) -> RuntimeResult<Value> {
        let ty = self
            .recorded_type(expr)
            .cloned()
            .unwrap_or_else(|| Type::array(Type::ANY_STRUCT));
        let mut values = Vec::with_capacity(elements.len());
        for element in elements {
            values.push(self.evaluate(element)?.transfer());
        }
        self.meter_memory(MemoryKind::Array, values.len())?;
        Ok(Value::Array(ArrayValue::new(ty, values)))
    }

    fn evaluate_dictionary(&mut self, expr: &Expr, entries: &[(Expr, Expr)]) -> RuntimeResult<Value> {
        let ty = self
            .recorded_type(expr)
            .cloned()
            .unwrap_or_else(|| Type::dictionary(Type::HASHABLE_STRUCT, Type::ANY_STRUCT));
        let mut values = IndexMap::with_capacity(entries.len());
        for (key, value) in entries {
            let key = self.evaluate(key)?;
            let value = self.evaluate(value)?.transfer();
            let hash = key.dictionary_key().ok_or_else(|| {
                RuntimeError::unreachable(format!("`{}` is not hashable", key.dynamic_type()))
            })?;
            values.insert(hash, (key, value));
        }
        self.meter_memory(MemoryKind::Dictionary, values.len())?;
        Ok(Value::Dictionary(DictionaryValue::new(ty, values)))
    }

    fn evaluate_binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> RuntimeResult<Value> {
        match op {
            BinaryOp::And => Ok(Value::Bool(self.evaluate_bool(left)? && self.evaluate_bool(right)?)),
            BinaryOp::Or => Ok(Value::Bool(self.evaluate_bool(left)? || self.evaluate_bool(right)?)),
            BinaryOp::NilCoalescing => match self.evaluate(left)?.into_present() {
                Some(value) => Ok(value),
                None => self.evaluate(right),
            },
            BinaryOp::Equal | BinaryOp::NotEqual => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                let equal = left.equals(&right);
                Ok(Value::Bool(if op == BinaryOp::Equal { equal } else { !equal }))
            }
            BinaryOp::Less | BinaryOp::LessEqual | BinaryOp::Greater | BinaryOp::GreaterEqual => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                Ok(Value::Bool(numeric::compare(op, &left, &right)?))
            }
            BinaryOp::Add | BinaryOp::Subtract | BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::Modulo => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                numeric::arithmetic(op, &left, &right)
            }
        }
    }

    /// Separates a reference from its target. Storage references must
    /// find a value.
    pub(super) fn split_reference(&mut self, value: Value) -> RuntimeResult<(Option<Authorization>, Value)> {
        match value {
            Value::Reference(reference) => {
                let target = self.dereference(&reference)?;
                Ok((Some(reference.authorization().clone()), target))
            }
            other => Ok((None, other)),
        }
    }

    fn evaluate_member(&mut self, expr: &Expr, receiver: &Expr, name: &str, optional: bool) -> RuntimeResult<Value> {
        if let Some(case) = self.evaluate_enum_case(receiver, name)? {
            return Ok(case);
        }

        let value = self.evaluate(receiver)?;
        let (value, chained) = if optional {
            match value {
                Value::Nil => return Ok(Value::Nil),
                Value::Some(inner) => (*inner, true),
                other => (other, true),
            }
        } else {
            (value, false)
        };

        let (authorization, owner) = match value {
            Value::Reference(reference) => {
                let owner = if chained {
                    match self.dereference_optional(&reference)? {
                        Some(owner) => owner,
                        None => return Ok(Value::Nil),
                    }
                } else {
                    self.dereference(&reference)?
                };
                (Some(reference.authorization().clone()), owner)
            }
            other => (None, other),
        };

        let member = self.read_member(expr, &owner, name)?;
        let member = match &authorization {
            Some(held) => self.reauthorize(expr, member, held)?,
            None => member,
        };
        Ok(match member {
            member @ (Value::Nil | Value::Some(_)) => member,
            member if chained => Value::some(member),
            member => member,
        })
    }

    /// `E.case` on an enum type name.
    fn evaluate_enum_case(&mut self, receiver: &Expr, name: &str) -> RuntimeResult<Option<Value>> {
        let ExprKind::Identifier(type_name) = &receiver.kind else {
            return Ok(None);
        };
        if self.environment.get(type_name).is_some() {
            return Ok(None);
        }
        let Some(Type::Composite(composite)) = self.recorded_type(receiver) else {
            return Ok(None);
        };
        if composite.kind != CompositeKind::Enum {
            return Ok(None);
        }
        self.enum_case(&composite.id(), name)
            .map(Some)
            .ok_or_else(|| RuntimeError::MemberAccessType {
                member: name.to_string(),
                actual: Type::Composite(composite.clone()),
            })
    }

    fn read_member(&self, expr: &Expr, owner: &Value, name: &str) -> RuntimeResult<Value> {
        let function_type = || {
            self.recorded_type(expr)
                .map(|ty| ty.unwrap_optional().clone())
                .unwrap_or(Type::Invalid)
        };
        match owner {
            Value::Composite(composite) => {
                if owner.is_destroyed() {
                    return Err(RuntimeError::DestroyedResource);
                }
                if let Some(value) = composite.field(name) {
                    return Ok(value);
                }
                let is_function = self
                    .elaboration()
                    .composite(&composite.ty().id())
                    .and_then(|info| info.members.get(name))
                    .is_some_and(|member| !member.is_field());
                if !is_function {
                    return Err(RuntimeError::MemberAccessType {
                        member: name.to_string(),
                        actual: owner.dynamic_type(),
                    });
                }
                let kind = FunctionKind::Bound {
                    receiver: composite.clone(),
                    name: name.to_string(),
                };
                Ok(Value::Function(FunctionValue::new(kind, function_type())))
            }
            Value::Array(array) if name == "length" => Ok(int_value(array.len())),
            Value::Dictionary(dictionary) => match name {
                "length" => Ok(int_value(dictionary.len())),
                "keys" => {
                    let keys = dictionary
                        .borrow()
                        .entries
                        .values()
                        .map(|(key, _)| key.deep_copy())
                        .collect();
                    Ok(Value::Array(ArrayValue::new(Type::array(dictionary.key_type()), keys)))
                }
                "values" => {
                    let values = dictionary
                        .borrow()
                        .entries
                        .values()
                        .map(|(_, value)| value.deep_copy())
                        .collect();
                    Ok(Value::Array(ArrayValue::new(Type::array(dictionary.value_type()), values)))
                }
                _ => Ok(builtin(owner, name, function_type())),
            },
            Value::String(text) if name == "length" => Ok(int_value(text.chars().count())),
            Value::Array(_) | Value::String(_) => Ok(builtin(owner, name, function_type())),
            other => Err(RuntimeError::MemberAccessType {
                member: name.to_string(),
                actual: other.dynamic_type(),
            }),
        }
    }

    /// Members of containers and resources reached through a reference are
    /// themselves returned behind a reference, as the checker typed them.
    fn reauthorize(&mut self, expr: &Expr, member: Value, held: &Authorization) -> RuntimeResult<Value> {
        let Some(Type::Reference(reference)) = self.recorded_type(expr).map(Type::unwrap_optional) else {
            return Ok(member);
        };
        let reference = reference.clone();
        match member {
            Value::Reference(_) | Value::Nil => Ok(member),
            Value::Some(inner) => Ok(Value::some(self.wrap_reference(*inner, &reference, held)?)),
            other => self.wrap_reference(other, &reference, held),
        }
    }

    fn wrap_reference(&mut self, target: Value, reference: &ReferenceType, held: &Authorization) -> RuntimeResult<Value> {
        if let Value::Reference(_) = target {
            return Ok(target);
        }
        if !held.grants(&reference.authorization) {
            return Err(RuntimeError::UnexpectedMappedEntitlement {
                expected: authorization_name(&reference.authorization),
                actual: authorization_name(held),
            });
        }
        self.meter_memory(MemoryKind::Reference, 1)?;
        Ok(Value::Reference(ReferenceValue::Ephemeral(EphemeralReference::new(
            reference.authorization.clone(),
            reference.ty.clone(),
            target,
        ))))
    }

    fn evaluate_index(&mut self, expr: &Expr, target: &Expr, index: &Expr) -> RuntimeResult<Value> {
        let container = self.evaluate(target)?;
        let (authorization, container) = self.split_reference(container)?;
        let index = self.evaluate(index)?;
        let element = match &container {
            Value::Array(array) => {
                let position = array_index(&index, array.len())?;
                array.borrow().elements[position].clone()
            }
            Value::Dictionary(dictionary) => {
                let key = index.dictionary_key().ok_or_else(|| {
                    RuntimeError::unreachable(format!("`{}` is not hashable", index.dynamic_type()))
                })?;
                Value::optional(dictionary.get(&key))
            }
            other => {
                return Err(RuntimeError::unreachable(format!(
                    "value of type `{}` is not indexable",
                    other.dynamic_type()
                )))
            }
        };
        match &authorization {
            Some(held) => self.reauthorize(expr, element, held),
            None => Ok(element),
        }
    }

    fn evaluate_reference(&mut self, expr: &Expr, inner: &Expr) -> RuntimeResult<Value> {
        let (reference, optional) = match self.recorded_type(expr) {
            Some(Type::Reference(reference)) => (reference.clone(), false),
            Some(Type::Optional(wrapped)) => match &**wrapped {
                Type::Reference(reference) => (reference.clone(), true),
                other => return Err(RuntimeError::unreachable(format!("`{other}` is not a reference type"))),
            },
            _ => return Err(RuntimeError::unreachable("reference expression was not checked")),
        };
        let value = self.evaluate(inner)?;
        let target = if optional {
            match value.into_present() {
                Some(target) => target,
                None => return Ok(Value::Nil),
            }
        } else {
            value
        };
        if let Value::Reference(_) = target {
            return Err(RuntimeError::NestedReference {
                ty: target.dynamic_type(),
            });
        }
        let actual = target.dynamic_type();
        if !actual.is_subtype_of(&reference.ty) {
            return Err(RuntimeError::TypeMismatch {
                expected: reference.ty.clone(),
                actual,
            });
        }
        self.meter_memory(MemoryKind::Reference, 1)?;
        let value = Value::Reference(ReferenceValue::Ephemeral(EphemeralReference::new(
            reference.authorization.clone(),
            reference.ty.clone(),
            target,
        )));
        Ok(if optional { Value::some(value) } else { value })
    }

    fn evaluate_cast(&mut self, expr: &Expr, inner: &Expr, kind: CastKind) -> RuntimeResult<Value> {
        let value = self.evaluate(inner)?;
        let target = match self.recorded_type(expr) {
            Some(ty) => ty.clone(),
            None => return Err(RuntimeError::unreachable("cast was not checked")),
        };
        match kind {
            CastKind::Static => Ok(value),
            CastKind::Failable => {
                let target = match target {
                    Type::Optional(inner) => *inner,
                    other => other,
                };
                Ok(if value.dynamic_type().is_subtype_of(&target) {
                    Value::some(value)
                } else {
                    Value::Nil
                })
            }
            CastKind::Force => {
                let actual = value.dynamic_type();
                if actual.is_subtype_of(&target) {
                    Ok(value)
                } else {
                    Err(RuntimeError::ForceCastTypeMismatch {
                        expected: target,
                        actual,
                    })
                }
            }
        }
    }

    fn closure(&self, expr: &Expr, function: &FunctionExpr) -> Value {
        let ty = self
            .recorded_type(expr)
            .cloned()
            .unwrap_or_else(|| Type::function(Vec::new(), Type::VOID));
        let closure = Closure {
            name: format!("{}.<closure>", self.current_function()),
            function: function.clone(),
            activation: self.environment.capture(),
        };
        Value::Function(FunctionValue::new(FunctionKind::Closure(Rc::new(closure)), ty))
    }
}

fn builtin(receiver: &Value, name: &str, ty: Type) -> Value {
    let kind = FunctionKind::Builtin {
        receiver: Box::new(receiver.clone()),
        name: name.to_string(),
    };
    Value::Function(FunctionValue::new(kind, ty))
}

fn authorization_name(authorization: &Authorization) -> String {
    authorization.id().unwrap_or_else(|| "unauthorized".to_string())
}
