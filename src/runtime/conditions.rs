//! Pre- and post-condition checking.
//!
//! A composite function's conditions come from the function itself and
//! from every interface it conforms to, in the order the conformance
//! resolver computed. Each declaration's conditions see that
//! declaration's own parameter names.

use crate::{
    language::ast::{Condition, ConditionKind, FunctionBlock, Parameter},
    runtime::{
        error::{RuntimeError, RuntimeResult},
        interpreter::Interpreter,
        value::Value,
    },
    sema::ty::Type,
};

/// Conditions of one declaration, with the parameters they refer to.
pub(super) struct ConditionBlock<'f> {
    params: &'f [Parameter],
    conditions: &'f [Condition],
}

#[derive(Default)]
pub(super) struct ConditionPlan<'f> {
    pre: Vec<ConditionBlock<'f>>,
    post: Vec<ConditionBlock<'f>>,
}

impl<'f> ConditionPlan<'f> {
    /// The function's own conditions only.
    pub(super) fn own(params: &'f [Parameter], body: &'f FunctionBlock) -> Self {
        let mut plan = Self::default();
        plan.push_pre(params, &body.pre_conditions);
        plan.push_post(params, &body.post_conditions);
        plan
    }

    pub(super) fn push_pre(&mut self, params: &'f [Parameter], conditions: &'f [Condition]) {
        if !conditions.is_empty() {
            self.pre.push(ConditionBlock { params, conditions });
        }
    }

    pub(super) fn push_post(&mut self, params: &'f [Parameter], conditions: &'f [Condition]) {
        if !conditions.is_empty() {
            self.post.push(ConditionBlock { params, conditions });
        }
    }
}

impl Interpreter<'_> {
    pub(super) fn check_pre_conditions(&mut self, plan: &ConditionPlan<'_>, arguments: &[Value]) -> RuntimeResult<()> {
        for block in &plan.pre {
            self.check_block(block, arguments)?;
        }
        Ok(())
    }

    /// Post-conditions see the return value as `result`.
    pub(super) fn check_post_conditions(
        &mut self,
        plan: &ConditionPlan<'_>,
        arguments: &[Value],
        result: &Value,
    ) -> RuntimeResult<()> {
        if plan.post.is_empty() {
            return Ok(());
        }
        self.environment.push_scope();
        self.environment.declare("result", result.clone(), false);
        let checked = plan
            .post
            .iter()
            .try_for_each(|block| self.check_block(block, arguments));
        self.environment.pop_scope();
        checked
    }

    fn check_block(&mut self, block: &ConditionBlock<'_>, arguments: &[Value]) -> RuntimeResult<()> {
        self.environment.push_scope();
        for (param, argument) in block.params.iter().zip(arguments) {
            self.environment.declare(&param.name, argument.clone(), false);
        }
        let checked = block
            .conditions
            .iter()
            .try_for_each(|condition| self.check_condition(condition));
        self.environment.pop_scope();
        checked
    }

    fn check_condition(&mut self, condition: &Condition) -> RuntimeResult<()> {
        let value = self.evaluate(&condition.test)?;
        match value.as_bool() {
            Some(true) => Ok(()),
            Some(false) => {
                let message = match &condition.message {
                    Some(message) => match self.evaluate(message)? {
                        Value::String(message) => message,
                        other => other.to_string(),
                    },
                    None => String::new(),
                };
                Err(match condition.kind {
                    ConditionKind::Pre => RuntimeError::PreCondition { message },
                    ConditionKind::Post => RuntimeError::PostCondition { message },
                })
            }
            None => Err(RuntimeError::TypeMismatch {
                expected: Type::BOOL,
                actual: value.dynamic_type(),
            }),
        }
    }
}
