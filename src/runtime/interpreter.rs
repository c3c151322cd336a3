//! Tree-walking interpreter over a checked program.
//!
//! The interpreter trusts the elaboration: literal types, container types,
//! cast targets and reference authorizations come from what the checker
//! recorded for each expression. Statement execution lives in
//! `execution.rs`, expression evaluation in `evaluation.rs`.

use crate::{
    language::{
        ast::{CompositeKind, Declaration, FunctionBlock, FunctionDecl, Parameter, Program, VariableKind},
        location::{Address, Location},
        span::Span,
        typecheck::Elaboration,
    },
    runtime::{
        conditions::ConditionPlan,
        config::Config,
        environment::{Activation, Environment},
        error::{Error, RuntimeError, RuntimeResult, StackFrame},
        metering::{ComputationKind, MemoryKind, MemoryUsage, MeterGauge},
        numeric,
        reference::{ReferenceValue, StorageReference},
        storage::{check_storable, Storage},
        value::{CompositeValue, FunctionKind, FunctionValue, PathValue, Value},
    },
    sema::{
        access::Authorization,
        ty::{CompositeType, PrimitiveType, Type},
    },
};
use indexmap::IndexMap;
use num_bigint::BigInt;
use std::{collections::HashMap, rc::Rc, sync::Arc};
use tracing::{debug, debug_span, warn};

/// Declarations of a program, indexed for dispatch.
#[derive(Default)]
struct Declarations<'a> {
    functions: HashMap<String, &'a FunctionDecl>,
    /// Functions of composites and interfaces keyed by `(type ID, name)`.
    members: HashMap<(String, String), &'a FunctionDecl>,
    initializers: HashMap<String, &'a FunctionDecl>,
}

impl<'a> Declarations<'a> {
    fn collect(&mut self, location: &Location, prefix: &mut Vec<String>, declarations: &'a [Declaration]) {
        for declaration in declarations {
            match declaration {
                Declaration::Composite(composite) => {
                    prefix.push(composite.name.clone());
                    let type_id = location.type_id(&prefix.join("."));
                    for function in &composite.members.functions {
                        self.members
                            .insert((type_id.clone(), function.name.clone()), function);
                    }
                    if let Some(initializer) = &composite.members.initializer {
                        self.initializers.insert(type_id, initializer);
                    }
                    self.collect(location, prefix, &composite.members.nested);
                    prefix.pop();
                }
                Declaration::Interface(interface) => {
                    prefix.push(interface.name.clone());
                    let type_id = location.type_id(&prefix.join("."));
                    for function in &interface.members.functions {
                        self.members
                            .insert((type_id.clone(), function.name.clone()), function);
                    }
                    self.collect(location, prefix, &interface.members.nested);
                    prefix.pop();
                }
                Declaration::Function(function) if prefix.is_empty() => {
                    self.functions.insert(function.name.clone(), function);
                }
                _ => {}
            }
        }
    }
}

pub struct Interpreter<'a> {
    program: &'a Program,
    elaboration: &'a Elaboration,
    config: &'a Config,
    storage: &'a mut dyn Storage,
    gauge: &'a mut dyn MeterGauge,
    declarations: Declarations<'a>,
    globals: Rc<Activation>,
    pub(super) environment: Environment,
    contracts: HashMap<String, CompositeValue>,
    enum_cases: HashMap<String, Vec<(String, CompositeValue)>>,
    stack: Vec<StackFrame>,
    failure_trace: Option<Vec<StackFrame>>,
}

impl<'a> Interpreter<'a> {
    /// Prepares `program` for invocation: binds host and declared functions,
    /// instantiates contracts and evaluates top-level variables in order.
    pub fn new(
        program: &'a Program,
        elaboration: &'a Elaboration,
        config: &'a Config,
        storage: &'a mut dyn Storage,
        gauge: &'a mut dyn MeterGauge,
    ) -> Result<Self, Error> {
        let mut declarations = Declarations::default();
        declarations.collect(&program.location, &mut Vec::new(), &program.declarations);

        let globals = Activation::root();
        for host in config.base_activation(&program.location).iter() {
            let function = FunctionValue::new(FunctionKind::Host(host.clone()), host.ty.clone());
            globals.declare(&host.name, Value::Function(function), false);
        }
        for name in declarations.functions.keys() {
            let ty = elaboration
                .global_type(name)
                .cloned()
                .unwrap_or_else(|| Type::function(Vec::new(), Type::VOID));
            let function = FunctionValue::new(FunctionKind::Declared(name.clone()), ty);
            globals.declare(name, Value::Function(function), false);
        }

        let mut interpreter = Self {
            program,
            elaboration,
            config,
            storage,
            gauge,
            declarations,
            environment: Environment::new(Rc::clone(&globals)),
            globals,
            contracts: HashMap::new(),
            enum_cases: HashMap::new(),
            stack: Vec::new(),
            failure_trace: None,
        };
        interpreter.declare_enum_cases();
        if let Err(cause) = interpreter.initialize() {
            return Err(interpreter.fail(cause));
        }
        Ok(interpreter)
    }

    fn declare_enum_cases(&mut self) {
        for info in self.elaboration.composites() {
            if info.ty.kind != CompositeKind::Enum {
                continue;
            }
            let raw_type = info.ty.enum_raw_type.unwrap_or(PrimitiveType::Int);
            let cases = info
                .enum_cases
                .iter()
                .enumerate()
                .map(|(index, name)| {
                    let mut fields = IndexMap::new();
                    fields.insert("rawValue".to_string(), Value::integer(raw_type, index));
                    (name.clone(), CompositeValue::new(Arc::clone(&info.ty), fields))
                })
                .collect();
            self.enum_cases.insert(info.ty.id(), cases);
        }
    }

    fn initialize(&mut self) -> RuntimeResult<()> {
        let program = self.program;
        for declaration in &program.declarations {
            match declaration {
                Declaration::Composite(composite) if composite.kind == CompositeKind::Contract => {
                    let type_id = program.location.type_id(&composite.name);
                    let ty = self
                        .elaboration
                        .composite(&type_id)
                        .map(|info| Arc::clone(&info.ty))
                        .ok_or_else(|| RuntimeError::unreachable(format!("unchecked contract `{type_id}`")))?;
                    debug!(contract = %type_id, "instantiating contract");
                    let contract = self.construct(&ty, Vec::new())?;
                    if let Value::Composite(contract) = contract {
                        self.globals.declare(&composite.name, Value::Composite(contract.clone()), false);
                        self.contracts.insert(type_id, contract);
                    }
                }
                Declaration::Variable(variable) => {
                    let value = self.evaluate(&variable.value)?.transfer();
                    self.globals
                        .declare(&variable.name, value, variable.kind == VariableKind::Variable);
                }
                _ => {}
            }
        }
        Ok(())
    }

    pub fn location(&self) -> &Location {
        &self.program.location
    }

    pub fn storage(&mut self) -> &mut (dyn Storage + 'a) {
        &mut *self.storage
    }

    /// Invokes the global function `name` with host-supplied arguments.
    pub fn invoke(&mut self, name: &str, arguments: Vec<Value>) -> Result<Value, Error> {
        let _span = self
            .config
            .tracing_enabled
            .then(|| debug_span!("invoke", function = name).entered());
        debug!(function = name, arguments = arguments.len(), "invocation started");
        self.failure_trace = None;
        match self.invoke_global(name, arguments) {
            Ok(value) => {
                debug!(function = name, "invocation finished");
                Ok(value)
            }
            Err(cause) => Err(self.fail(cause)),
        }
    }

    fn invoke_global(&mut self, name: &str, arguments: Vec<Value>) -> RuntimeResult<Value> {
        let function = match self.globals.lookup(name) {
            Some(Value::Function(function)) => function,
            Some(other) => return Err(RuntimeError::NotInvokable { ty: other.dynamic_type() }),
            None => return Err(RuntimeError::NotDeclared { name: name.to_string() }),
        };
        if let Type::Function(ty) = &function.ty {
            if ty.params.len() != arguments.len() {
                return Err(RuntimeError::ArgumentCount {
                    expected: ty.params.len(),
                    actual: arguments.len(),
                });
            }
            for (param, argument) in ty.params.iter().zip(&arguments) {
                let actual = argument.dynamic_type();
                if !actual.is_subtype_of(param) {
                    return Err(RuntimeError::TypeMismatch {
                        expected: param.clone(),
                        actual,
                    });
                }
            }
        }
        let arguments = arguments.iter().map(Value::transfer).collect();
        self.call(&function, arguments, Span::default())
    }

    fn fail(&mut self, cause: RuntimeError) -> Error {
        if cause.is_internal() {
            warn!(error = %cause, "internal interpreter error");
        }
        let stack_trace = self.failure_trace.take().unwrap_or_else(|| self.stack.clone());
        self.stack.clear();
        Error::new(cause, self.program.location.clone()).with_stack_trace(stack_trace)
    }

    /// Calls `function` with already transferred arguments.
    pub fn call(&mut self, function: &FunctionValue, arguments: Vec<Value>, span: Span) -> RuntimeResult<Value> {
        if let Type::Function(ty) = &function.ty {
            if ty.params.len() != arguments.len() {
                return Err(RuntimeError::ArgumentCount {
                    expected: ty.params.len(),
                    actual: arguments.len(),
                });
            }
        }
        match &function.kind {
            FunctionKind::Host(host) => {
                let host = host.clone();
                self.with_frame(host.name.clone(), span, |this| host.call(this, arguments))
            }
            FunctionKind::Conversion(target) => {
                let argument = arguments.first().ok_or(RuntimeError::ArgumentCount {
                    expected: 1,
                    actual: 0,
                })?;
                numeric::convert(*target, argument)
            }
            FunctionKind::Builtin { receiver, name } => self.call_builtin(receiver, name, arguments),
            FunctionKind::EnumConstructor(ty) => Ok(self.enum_case_for_raw_value(ty, arguments.first())),
            FunctionKind::Constructor(ty) => {
                let ty = Arc::clone(ty);
                self.with_frame(format!("{}.init", ty.qualified_identifier), span, |this| {
                    this.construct(&ty, arguments)
                })
            }
            FunctionKind::Declared(name) => {
                let declaration = self
                    .declarations
                    .functions
                    .get(name)
                    .copied()
                    .ok_or_else(|| RuntimeError::NotDeclared { name: name.clone() })?;
                let body = declaration
                    .body
                    .as_ref()
                    .ok_or_else(|| RuntimeError::unreachable(format!("function `{name}` has no body")))?;
                let globals = Rc::clone(&self.globals);
                self.with_frame(name.clone(), span, |this| {
                    let plan = ConditionPlan::own(&declaration.params, body);
                    this.run_function(globals, None, &declaration.params, body, plan, arguments)
                })
            }
            FunctionKind::Closure(closure) => {
                let closure = Rc::clone(closure);
                self.with_frame(closure.name.clone(), span, |this| {
                    let function = &closure.function;
                    let plan = ConditionPlan::own(&function.params, &function.body);
                    this.run_function(
                        Rc::clone(&closure.activation),
                        None,
                        &function.params,
                        &function.body,
                        plan,
                        arguments,
                    )
                })
            }
            FunctionKind::Bound { receiver, name } => {
                let receiver = receiver.clone();
                self.with_frame(function.name(), span, |this| this.call_bound(receiver, name, arguments))
            }
        }
    }

    fn with_frame<T>(
        &mut self,
        function: String,
        span: Span,
        body: impl FnOnce(&mut Self) -> RuntimeResult<T>,
    ) -> RuntimeResult<T> {
        let limit = self.config.stack_depth_limit;
        if self.stack.len() >= limit {
            return Err(RuntimeError::CallStackLimitExceeded { limit });
        }
        self.gauge.meter_computation(ComputationKind::FunctionInvocation, 1)?;
        self.stack.push(StackFrame { function, span });
        let result = body(self);
        if result.is_err() && self.failure_trace.is_none() {
            self.failure_trace = Some(self.stack.clone());
        }
        self.stack.pop();
        result
    }

    /// Runs a composite function: conditions in resolution order around the
    /// implementation the conformance resolver chose.
    fn call_bound(&mut self, receiver: CompositeValue, name: &str, arguments: Vec<Value>) -> RuntimeResult<Value> {
        let receiver_value = Value::Composite(receiver.clone());
        if receiver_value.is_destroyed() {
            return Err(RuntimeError::DestroyedResource);
        }
        let ty = receiver.ty();
        let resolution = self
            .elaboration
            .resolve_function(&ty, name)
            .map_err(|error| RuntimeError::unreachable(error.to_string()))?;
        let implementation = resolution.implementation.as_deref().ok_or_else(|| {
            RuntimeError::unreachable(format!("`{}` has no implementation of `{name}`", ty.qualified_identifier))
        })?;
        let declaration = self.member_function(implementation, name)?;
        let body = declaration
            .body
            .as_ref()
            .ok_or_else(|| RuntimeError::unreachable(format!("`{implementation}.{name}` has no body")))?;

        let mut plan = ConditionPlan::default();
        for type_id in &resolution.pre_conditions {
            let declaration = self.member_function(type_id, name)?;
            plan.push_pre(&declaration.params, declaration.pre_conditions());
        }
        for type_id in &resolution.post_conditions {
            let declaration = self.member_function(type_id, name)?;
            plan.push_post(&declaration.params, declaration.post_conditions());
        }

        let globals = Rc::clone(&self.globals);
        self.run_function(globals, Some(receiver_value), &declaration.params, body, plan, arguments)
    }

    fn member_function(&self, type_id: &str, name: &str) -> RuntimeResult<&'a FunctionDecl> {
        self.declarations
            .members
            .get(&(type_id.to_string(), name.to_string()))
            .copied()
            .ok_or_else(|| RuntimeError::unreachable(format!("missing declaration of `{type_id}.{name}`")))
    }

    /// Creates a composite and runs its initializer with `self` bound.
    pub(super) fn construct(&mut self, ty: &Arc<CompositeType>, arguments: Vec<Value>) -> RuntimeResult<Value> {
        self.gauge.meter_memory(MemoryUsage::new(MemoryKind::Composite, 1))?;
        let composite = CompositeValue::new(Arc::clone(ty), IndexMap::new());
        let initializer = self.declarations.initializers.get(&ty.id()).copied();
        if let Some(initializer) = initializer {
            if let Some(body) = &initializer.body {
                let globals = Rc::clone(&self.globals);
                let plan = ConditionPlan::own(&initializer.params, body);
                self.run_function(
                    globals,
                    Some(Value::Composite(composite.clone())),
                    &initializer.params,
                    body,
                    plan,
                    arguments,
                )?;
            }
        }
        Ok(Value::Composite(composite))
    }

    fn enum_case_for_raw_value(&self, ty: &CompositeType, raw_value: Option<&Value>) -> Value {
        let Some(Value::Integer { value, .. }) = raw_value else {
            return Value::Nil;
        };
        let case = self.enum_cases.get(&ty.id()).and_then(|cases| {
            cases.iter().find(|(_, case)| {
                matches!(case.field("rawValue"), Some(Value::Integer { value: raw, .. }) if &raw == value)
            })
        });
        Value::optional(case.map(|(_, case)| Value::Composite(case.clone())))
    }

    pub(super) fn enum_case(&self, type_id: &str, name: &str) -> Option<Value> {
        self.enum_cases
            .get(type_id)?
            .iter()
            .find(|(case, _)| case == name)
            .map(|(_, value)| Value::Composite(value.clone()))
    }

    pub(super) fn contract(&self, type_id: &str) -> Option<Value> {
        self.contracts.get(type_id).cloned().map(Value::Composite)
    }

    /// Binds arguments and `self`, then checks conditions around the body.
    fn run_function(
        &mut self,
        parent: Rc<Activation>,
        receiver: Option<Value>,
        params: &[Parameter],
        body: &FunctionBlock,
        plan: ConditionPlan<'_>,
        arguments: Vec<Value>,
    ) -> RuntimeResult<Value> {
        let environment = Environment::new(Activation::child(parent));
        let saved = std::mem::replace(&mut self.environment, environment);
        let result = self.execute_function(receiver, params, body, plan, arguments);
        self.environment = saved;
        result
    }

    fn execute_function(
        &mut self,
        receiver: Option<Value>,
        params: &[Parameter],
        body: &FunctionBlock,
        plan: ConditionPlan<'_>,
        arguments: Vec<Value>,
    ) -> RuntimeResult<Value> {
        if let Some(receiver) = receiver {
            self.environment.declare("self", receiver, false);
        }
        for (param, argument) in params.iter().zip(&arguments) {
            self.environment.declare(&param.name, argument.clone(), false);
        }

        self.check_pre_conditions(&plan, &arguments)?;
        let result = match &body.statements {
            Some(block) => self.execute_body(block)?,
            None => Value::Void,
        };
        self.check_post_conditions(&plan, &arguments, &result)?;
        Ok(result)
    }

    pub(super) fn meter_statement(&mut self) -> RuntimeResult<()> {
        Ok(self.gauge.meter_computation(ComputationKind::Statement, 1)?)
    }

    pub(super) fn meter_loop(&mut self) -> RuntimeResult<()> {
        Ok(self.gauge.meter_computation(ComputationKind::Loop, 1)?)
    }

    pub(super) fn meter_memory(&mut self, kind: MemoryKind, amount: usize) -> RuntimeResult<()> {
        Ok(self.gauge.meter_memory(MemoryUsage::new(kind, amount as u64))?)
    }

    pub(super) fn elaboration(&self) -> &'a Elaboration {
        self.elaboration
    }

    pub(super) fn current_function(&self) -> &str {
        self.stack.last().map(|frame| frame.function.as_str()).unwrap_or_default()
    }

    // Host storage API

    /// Moves `value` into the account slot at `path`. Overwriting a stored
    /// resource would lose it and is refused.
    pub fn save(&mut self, address: Address, path: &PathValue, value: Value) -> RuntimeResult<()> {
        check_storable(&value)?;
        if let Some(existing) = self.storage.read_stored(address, path.domain, &path.identifier)? {
            if existing.is_resource() {
                return Err(RuntimeError::ResourceLoss {
                    ty: existing.dynamic_type(),
                });
            }
        }
        debug!(%address, %path, "saving value");
        self.storage
            .write_value(address, path.domain, &path.identifier, Some(value.transfer()))
    }

    /// Moves the value out of the slot at `path`, leaving it empty.
    pub fn load(&mut self, address: Address, path: &PathValue) -> RuntimeResult<Option<Value>> {
        let value = self.storage.read_stored(address, path.domain, &path.identifier)?;
        if value.is_some() {
            self.storage.write_value(address, path.domain, &path.identifier, None)?;
        }
        Ok(value.map(|value| value.transfer()))
    }

    /// A storage reference to the slot at `path`. The slot is read again on
    /// every use, so the reference follows whatever is stored there.
    pub fn borrow(&self, address: Address, path: &PathValue, authorization: Authorization, borrowed_type: Type) -> Value {
        Value::Reference(ReferenceValue::Storage(StorageReference {
            authorization,
            borrowed_type,
            address,
            path: path.clone(),
        }))
    }

    /// Target of a reference. Storage references must find a value.
    pub fn dereference(&mut self, reference: &ReferenceValue) -> RuntimeResult<Value> {
        match reference {
            ReferenceValue::Ephemeral(reference) => reference.dereference(),
            ReferenceValue::Storage(reference) => reference.dereference_required(&mut *self.storage),
        }
    }

    /// Like [`Interpreter::dereference`], but an empty storage slot is `None`.
    pub(super) fn dereference_optional(&mut self, reference: &ReferenceValue) -> RuntimeResult<Option<Value>> {
        match reference {
            ReferenceValue::Ephemeral(reference) => reference.dereference().map(Some),
            ReferenceValue::Storage(reference) => reference.dereference(&mut *self.storage),
        }
    }
}

/// Index into an array, checked against its length.
pub(super) fn array_index(index: &Value, size: usize) -> RuntimeResult<usize> {
    let Value::Integer { value, .. } = index else {
        return Err(RuntimeError::TypeMismatch {
            expected: Type::INT,
            actual: index.dynamic_type(),
        });
    };
    usize::try_from(value)
        .ok()
        .filter(|position| *position < size)
        .ok_or_else(|| RuntimeError::ArrayIndexOutOfBounds {
            index: value.to_string(),
            size,
        })
}

pub(super) fn int_value(value: usize) -> Value {
    Value::int(BigInt::from(value))
}
