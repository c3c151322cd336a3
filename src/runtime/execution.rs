use crate::{
    language::ast::{Block, Expr, ExprKind, IfCondition, Statement, Transfer, VariableKind},
    runtime::{
        error::{RuntimeError, RuntimeResult},
        interpreter::{array_index, Interpreter},
        reference::{EphemeralReference, ReferenceValue},
        value::Value,
    },
    sema::ty::Type,
};

/// How control leaves a statement.
pub(super) enum FlowSignal {
    Next,
    Break,
    Continue,
    Return(Value),
}

impl Interpreter<'_> {
    /// Runs a function body and produces its return value.
    pub(super) fn execute_body(&mut self, block: &Block) -> RuntimeResult<Value> {
        match self.execute_statements(&block.statements)? {
            FlowSignal::Return(value) => Ok(value),
            _ => Ok(Value::Void),
        }
    }

    fn execute_block(&mut self, block: &Block) -> RuntimeResult<FlowSignal> {
        self.environment.push_scope();
        let flow = self.execute_statements(&block.statements);
        self.environment.pop_scope();
        flow
    }

    fn execute_statements(&mut self, statements: &[Statement]) -> RuntimeResult<FlowSignal> {
        for statement in statements {
            match self.execute_statement(statement)? {
                FlowSignal::Next => {}
                flow => return Ok(flow),
            }
        }
        Ok(FlowSignal::Next)
    }

    fn execute_statement(&mut self, statement: &Statement) -> RuntimeResult<FlowSignal> {
        self.meter_statement()?;
        match statement {
            Statement::Variable(variable) => {
                let value = self.evaluate_transfer(&variable.value, variable.transfer)?;
                self.environment
                    .declare(&variable.name, value, variable.kind == VariableKind::Variable);
                Ok(FlowSignal::Next)
            }
            Statement::Assignment {
                target, transfer, value, ..
            } => {
                let value = self.evaluate_transfer(value, *transfer)?;
                self.assign(target, value)?;
                Ok(FlowSignal::Next)
            }
            Statement::Expression(expr) => {
                self.evaluate(expr)?;
                Ok(FlowSignal::Next)
            }
            Statement::Return { value, .. } => {
                let value = match value {
                    Some(value) => self.evaluate(value)?.transfer(),
                    None => Value::Void,
                };
                Ok(FlowSignal::Return(value))
            }
            Statement::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => match condition {
                IfCondition::Expr(test) => {
                    if self.evaluate_bool(test)? {
                        self.execute_block(then_branch)
                    } else {
                        self.execute_else(else_branch.as_ref())
                    }
                }
                IfCondition::Let { name, transfer, value } => match self.evaluate_transfer(value, *transfer)?.into_present() {
                    Some(bound) => {
                        self.environment.push_scope();
                        self.environment.declare(name, bound, false);
                        let flow = self.execute_block(then_branch);
                        self.environment.pop_scope();
                        flow
                    }
                    None => self.execute_else(else_branch.as_ref()),
                },
            },
            Statement::While { condition, body, .. } => {
                while self.evaluate_bool(condition)? {
                    self.meter_loop()?;
                    match self.execute_block(body)? {
                        FlowSignal::Break => break,
                        FlowSignal::Return(value) => return Ok(FlowSignal::Return(value)),
                        FlowSignal::Next | FlowSignal::Continue => {}
                    }
                }
                Ok(FlowSignal::Next)
            }
            Statement::For {
                variable,
                iterable,
                body,
                ..
            } => {
                for element in self.iteration_elements(iterable)? {
                    self.meter_loop()?;
                    self.environment.push_scope();
                    self.environment.declare(variable, element, false);
                    let flow = self.execute_block(body);
                    self.environment.pop_scope();
                    match flow? {
                        FlowSignal::Break => break,
                        FlowSignal::Return(value) => return Ok(FlowSignal::Return(value)),
                        FlowSignal::Next | FlowSignal::Continue => {}
                    }
                }
                Ok(FlowSignal::Next)
            }
            Statement::Break(_) => Ok(FlowSignal::Break),
            Statement::Continue(_) => Ok(FlowSignal::Continue),
        }
    }

    /// Value of the right-hand side of a transfer. Moving a variable leaves
    /// it invalidated.
    fn evaluate_transfer(&mut self, expr: &Expr, transfer: Transfer) -> RuntimeResult<Value> {
        let value = match (&expr.kind, transfer) {
            (ExprKind::Identifier(name), Transfer::Move) => self.environment.take(name)?,
            _ => self.evaluate(expr)?,
        };
        // Composite types are nominal, so a mismatch here means the
        // elaboration and the value disagree.
        if let (Some(composite), Some(expected)) = (value.as_composite(), self.recorded_type(expr)) {
            let actual = Type::Composite(composite.ty());
            if !actual.is_subtype_of(expected) {
                return Err(RuntimeError::ValueTransferType {
                    expected: expected.clone(),
                    actual,
                });
            }
        }
        Ok(value.transfer())
    }

    fn execute_else(&mut self, else_branch: Option<&Block>) -> RuntimeResult<FlowSignal> {
        match else_branch {
            Some(block) => self.execute_block(block),
            None => Ok(FlowSignal::Next),
        }
    }

    /// Array elements or dictionary keys. Iterating through a reference
    /// yields references to container and resource elements, carrying the
    /// reference's authorization.
    fn iteration_elements(&mut self, iterable: &Expr) -> RuntimeResult<Vec<Value>> {
        let iterable = self.evaluate(iterable)?;
        let (authorization, target) = self.split_reference(iterable)?;
        let (elements, element_type) = match &target {
            Value::Array(array) => (array.elements(), array.element_type()),
            Value::Dictionary(dictionary) => {
                let keys = dictionary
                    .borrow()
                    .entries
                    .values()
                    .map(|(key, _)| key.clone())
                    .collect();
                (keys, dictionary.key_type())
            }
            other => {
                return Err(RuntimeError::unreachable(format!(
                    "value of type `{}` is not iterable",
                    other.dynamic_type()
                )))
            }
        };
        Ok(match authorization {
            Some(authorization) if element_type.is_container() || element_type.is_resource() => elements
                .into_iter()
                .map(|element| {
                    Value::Reference(ReferenceValue::Ephemeral(EphemeralReference::new(
                        authorization.clone(),
                        element_type.clone(),
                        element,
                    )))
                })
                .collect(),
            _ => elements.iter().map(Value::deep_copy).collect(),
        })
    }

    /// Writes `value` to an identifier, field or index target.
    fn assign(&mut self, target: &Expr, value: Value) -> RuntimeResult<()> {
        match &target.kind {
            ExprKind::Identifier(name) => self.environment.assign(name, value),
            ExprKind::Member { expr: receiver, name, .. } => {
                let owner = self.evaluate(receiver)?;
                let (_, owner) = self.split_reference(owner)?;
                let owner = owner.into_present().unwrap_or(Value::Nil);
                match &owner {
                    Value::Composite(composite) => {
                        if owner.is_destroyed() {
                            return Err(RuntimeError::DestroyedResource);
                        }
                        composite.set_field(name, value);
                        Ok(())
                    }
                    other => Err(RuntimeError::MemberAccessType {
                        member: name.clone(),
                        actual: other.dynamic_type(),
                    }),
                }
            }
            ExprKind::Index { expr: container, index } => {
                let container = self.evaluate(container)?;
                let (_, container) = self.split_reference(container)?;
                let index = self.evaluate(index)?;
                match &container {
                    Value::Array(array) => {
                        let position = array_index(&index, array.len())?;
                        array.borrow_mut().elements[position] = value;
                        Ok(())
                    }
                    Value::Dictionary(dictionary) => {
                        let key = index.dictionary_key().ok_or_else(|| {
                            RuntimeError::unreachable(format!("`{}` is not hashable", index.dynamic_type()))
                        })?;
                        if let Some(existing) = dictionary.get(&key) {
                            if existing.is_resource() {
                                return Err(RuntimeError::ResourceLoss {
                                    ty: existing.dynamic_type(),
                                });
                            }
                        }
                        let mut data = dictionary.borrow_mut();
                        match value.into_present() {
                            Some(value) => {
                                data.entries.insert(key, (index, value));
                            }
                            None => {
                                data.entries.shift_remove(&key);
                            }
                        }
                        Ok(())
                    }
                    other => Err(RuntimeError::TypeMismatch {
                        expected: Type::array(Type::ANY_STRUCT),
                        actual: other.dynamic_type(),
                    }),
                }
            }
            _ => Err(RuntimeError::unreachable("invalid assignment target")),
        }
    }
}
