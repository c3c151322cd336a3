use crate::{
    language::{
        ast::{CompositeKind, FunctionExpr, PathDomain},
        location::Address,
    },
    runtime::{
        environment::Activation,
        error::RuntimeResult,
        interpreter::Interpreter,
        reference::ReferenceValue,
    },
    sema::ty::{format_fixed_point, CompositeType, PrimitiveType, Type},
};
use indexmap::IndexMap;
use num_bigint::BigInt;
use std::{
    cell::{Ref, RefCell, RefMut},
    fmt,
    rc::Rc,
    sync::Arc,
};

/// Generation counter and destroyed flag of a value with identity.
///
/// Ephemeral references remember the generation they were created at; a
/// move bumps it, which invalidates every outstanding reference at once.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Lifecycle {
    generation: u64,
    destroyed: bool,
}

impl Lifecycle {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }
}

#[derive(Debug)]
pub struct CompositeData {
    pub ty: Arc<CompositeType>,
    pub fields: IndexMap<String, Value>,
    lifecycle: Lifecycle,
}

#[derive(Clone, Debug)]
pub struct CompositeValue(Rc<RefCell<CompositeData>>);

impl CompositeValue {
    pub fn new(ty: Arc<CompositeType>, fields: IndexMap<String, Value>) -> Self {
        Self(Rc::new(RefCell::new(CompositeData {
            ty,
            fields,
            lifecycle: Lifecycle::default(),
        })))
    }

    pub fn borrow(&self) -> Ref<'_, CompositeData> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, CompositeData> {
        self.0.borrow_mut()
    }

    pub fn ty(&self) -> Arc<CompositeType> {
        Arc::clone(&self.0.borrow().ty)
    }

    pub fn field(&self, name: &str) -> Option<Value> {
        self.0.borrow().fields.get(name).cloned()
    }

    pub fn set_field(&self, name: &str, value: Value) {
        self.0.borrow_mut().fields.insert(name.to_string(), value);
    }

    pub fn ptr_eq(&self, other: &CompositeValue) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

#[derive(Debug)]
pub struct ArrayData {
    /// `[T]` or `[T; N]`.
    pub ty: Type,
    pub elements: Vec<Value>,
    lifecycle: Lifecycle,
}

#[derive(Clone, Debug)]
pub struct ArrayValue(Rc<RefCell<ArrayData>>);

impl ArrayValue {
    pub fn new(ty: Type, elements: Vec<Value>) -> Self {
        Self(Rc::new(RefCell::new(ArrayData {
            ty,
            elements,
            lifecycle: Lifecycle::default(),
        })))
    }

    pub fn borrow(&self) -> Ref<'_, ArrayData> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, ArrayData> {
        self.0.borrow_mut()
    }

    pub fn ty(&self) -> Type {
        self.0.borrow().ty.clone()
    }

    pub fn element_type(&self) -> Type {
        self.0.borrow().ty.element_type().cloned().unwrap_or(Type::ANY_STRUCT)
    }

    pub fn len(&self) -> usize {
        self.0.borrow().elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn elements(&self) -> Vec<Value> {
        self.0.borrow().elements.clone()
    }
}

/// Key of a dictionary entry. Only hashable values have one.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DictionaryKey {
    Bool(bool),
    String(String),
    Character(String),
    Address(Address),
    Path(PathDomain, String),
    Integer(PrimitiveType, BigInt),
    Fixed(PrimitiveType, i128),
    Enum(String, BigInt),
}

#[derive(Debug)]
pub struct DictionaryData {
    /// `{K: V}`.
    pub ty: Type,
    /// Insertion ordered; each entry keeps the original key value.
    pub entries: IndexMap<DictionaryKey, (Value, Value)>,
    lifecycle: Lifecycle,
}

#[derive(Clone, Debug)]
pub struct DictionaryValue(Rc<RefCell<DictionaryData>>);

impl DictionaryValue {
    pub fn new(ty: Type, entries: IndexMap<DictionaryKey, (Value, Value)>) -> Self {
        Self(Rc::new(RefCell::new(DictionaryData {
            ty,
            entries,
            lifecycle: Lifecycle::default(),
        })))
    }

    pub fn borrow(&self) -> Ref<'_, DictionaryData> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, DictionaryData> {
        self.0.borrow_mut()
    }

    pub fn ty(&self) -> Type {
        self.0.borrow().ty.clone()
    }

    pub fn key_type(&self) -> Type {
        match &self.0.borrow().ty {
            Type::Dictionary { key, .. } => (**key).clone(),
            _ => Type::HASHABLE_STRUCT,
        }
    }

    pub fn value_type(&self) -> Type {
        match &self.0.borrow().ty {
            Type::Dictionary { value, .. } => (**value).clone(),
            _ => Type::ANY_STRUCT,
        }
    }

    pub fn get(&self, key: &DictionaryKey) -> Option<Value> {
        self.0.borrow().entries.get(key).map(|(_, value)| value.clone())
    }

    pub fn len(&self) -> usize {
        self.0.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PathValue {
    pub domain: PathDomain,
    pub identifier: String,
}

impl PathValue {
    pub fn storage(identifier: impl Into<String>) -> Self {
        Self {
            domain: PathDomain::Storage,
            identifier: identifier.into(),
        }
    }

    pub fn public(identifier: impl Into<String>) -> Self {
        Self {
            domain: PathDomain::Public,
            identifier: identifier.into(),
        }
    }
}

impl fmt::Display for PathValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.domain.identifier(), self.identifier)
    }
}

pub type HostFunctionBody = dyn Fn(&mut Interpreter<'_>, Vec<Value>) -> RuntimeResult<Value>;

/// A function implemented by the embedding host.
#[derive(Clone)]
pub struct HostFunction {
    pub name: String,
    pub ty: Type,
    body: Rc<HostFunctionBody>,
}

impl HostFunction {
    pub fn new<F>(name: impl Into<String>, ty: Type, body: F) -> Self
    where
        F: Fn(&mut Interpreter<'_>, Vec<Value>) -> RuntimeResult<Value> + 'static,
    {
        Self {
            name: name.into(),
            ty,
            body: Rc::new(body),
        }
    }

    pub fn call(&self, interpreter: &mut Interpreter<'_>, arguments: Vec<Value>) -> RuntimeResult<Value> {
        (self.body)(interpreter, arguments)
    }
}

impl fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostFunction")
            .field("name", &self.name)
            .field("ty", &self.ty)
            .finish_non_exhaustive()
    }
}

pub struct Closure {
    pub name: String,
    pub function: FunctionExpr,
    pub activation: Rc<Activation>,
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Closure").field("name", &self.name).finish_non_exhaustive()
    }
}

#[derive(Clone, Debug)]
pub enum FunctionKind {
    /// Top-level function, by name.
    Declared(String),
    Closure(Rc<Closure>),
    /// Composite function bound to its receiver.
    Bound { receiver: CompositeValue, name: String },
    /// Member function of an array, dictionary or string.
    Builtin { receiver: Box<Value>, name: String },
    Constructor(Arc<CompositeType>),
    EnumConstructor(Arc<CompositeType>),
    Conversion(PrimitiveType),
    Host(HostFunction),
}

#[derive(Clone, Debug)]
pub struct FunctionValue {
    pub kind: FunctionKind,
    pub ty: Type,
}

impl FunctionValue {
    pub fn new(kind: FunctionKind, ty: Type) -> Self {
        Self { kind, ty }
    }

    pub fn name(&self) -> String {
        match &self.kind {
            FunctionKind::Declared(name) => name.clone(),
            FunctionKind::Closure(closure) => closure.name.clone(),
            FunctionKind::Bound { receiver, name } => {
                format!("{}.{name}", receiver.ty().qualified_identifier)
            }
            FunctionKind::Builtin { name, .. } => name.clone(),
            FunctionKind::Constructor(ty) | FunctionKind::EnumConstructor(ty) => {
                ty.qualified_identifier.to_string()
            }
            FunctionKind::Conversion(target) => target.name().to_string(),
            FunctionKind::Host(host) => host.name.clone(),
        }
    }
}

#[derive(Clone, Debug)]
pub enum Value {
    Void,
    Nil,
    Some(Box<Value>),
    Bool(bool),
    String(String),
    Character(String),
    Address(Address),
    Path(PathValue),
    Integer { ty: PrimitiveType, value: BigInt },
    /// Scaled by [`crate::sema::ty::FIXED_POINT_FACTOR`].
    Fixed { ty: PrimitiveType, value: i128 },
    Array(ArrayValue),
    Dictionary(DictionaryValue),
    Composite(CompositeValue),
    Reference(ReferenceValue),
    Function(FunctionValue),
    /// Left in a variable whose resource was moved out.
    Moved,
}

impl Value {
    pub fn int(value: impl Into<BigInt>) -> Self {
        Value::Integer {
            ty: PrimitiveType::Int,
            value: value.into(),
        }
    }

    pub fn integer(ty: PrimitiveType, value: impl Into<BigInt>) -> Self {
        Value::Integer {
            ty,
            value: value.into(),
        }
    }

    pub fn string(value: impl Into<String>) -> Self {
        Value::String(value.into())
    }

    pub fn some(value: Value) -> Self {
        Value::Some(Box::new(value))
    }

    /// `Nil` for `None`.
    pub fn optional(value: Option<Value>) -> Self {
        value.map(Value::some).unwrap_or(Value::Nil)
    }

    /// Strips one level of optional; plain values count as present.
    pub fn into_present(self) -> Option<Value> {
        match self {
            Value::Nil => None,
            Value::Some(inner) => Some(*inner),
            other => Some(other),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_composite(&self) -> Option<&CompositeValue> {
        match self {
            Value::Composite(composite) => Some(composite),
            _ => None,
        }
    }

    /// The most specific static type describing this value.
    pub fn dynamic_type(&self) -> Type {
        match self {
            Value::Void | Value::Moved => Type::VOID,
            Value::Nil => Type::nil(),
            Value::Some(inner) => Type::optional(inner.dynamic_type()),
            Value::Bool(_) => Type::BOOL,
            Value::String(_) => Type::STRING,
            Value::Character(_) => Type::Primitive(PrimitiveType::Character),
            Value::Address(_) => Type::Primitive(PrimitiveType::Address),
            Value::Path(path) => Type::Primitive(match path.domain {
                PathDomain::Storage => PrimitiveType::StoragePath,
                PathDomain::Public => PrimitiveType::PublicPath,
            }),
            Value::Integer { ty, .. } | Value::Fixed { ty, .. } => Type::Primitive(*ty),
            Value::Array(array) => array.ty(),
            Value::Dictionary(dictionary) => dictionary.ty(),
            Value::Composite(composite) => Type::Composite(composite.ty()),
            Value::Reference(reference) => reference.static_type(),
            Value::Function(function) => function.ty.clone(),
        }
    }

    pub fn is_resource(&self) -> bool {
        match self {
            Value::Some(inner) => inner.is_resource(),
            Value::Composite(composite) => composite.borrow().ty.is_resource(),
            Value::Array(array) => array.borrow().ty.is_resource(),
            Value::Dictionary(dictionary) => dictionary.borrow().ty.is_resource(),
            _ => false,
        }
    }

    fn lifecycle(&self) -> Option<Lifecycle> {
        match self {
            Value::Composite(composite) => Some(composite.borrow().lifecycle),
            Value::Array(array) => Some(array.borrow().lifecycle),
            Value::Dictionary(dictionary) => Some(dictionary.borrow().lifecycle),
            _ => None,
        }
    }

    /// Generation of a value with identity, `None` for plain values.
    pub fn generation(&self) -> Option<u64> {
        self.lifecycle().map(|lifecycle| lifecycle.generation)
    }

    pub fn is_destroyed(&self) -> bool {
        self.lifecycle().is_some_and(|lifecycle| lifecycle.destroyed)
    }

    /// The value a transfer (assignment, argument, return, storage write)
    /// produces. Resources keep their identity and invalidate references to
    /// them; everything else is copied.
    pub fn transfer(&self) -> Value {
        if self.is_resource() {
            self.invalidate_references();
            self.clone()
        } else {
            self.deep_copy()
        }
    }

    fn invalidate_references(&self) {
        match self {
            Value::Some(inner) => inner.invalidate_references(),
            Value::Composite(composite) => {
                let fields: Vec<Value> = {
                    let mut data = composite.borrow_mut();
                    data.lifecycle.generation += 1;
                    data.fields.values().cloned().collect()
                };
                fields.iter().for_each(Value::invalidate_references);
            }
            Value::Array(array) => {
                let elements = {
                    let mut data = array.borrow_mut();
                    data.lifecycle.generation += 1;
                    data.elements.clone()
                };
                elements.iter().for_each(Value::invalidate_references);
            }
            Value::Dictionary(dictionary) => {
                let values: Vec<Value> = {
                    let mut data = dictionary.borrow_mut();
                    data.lifecycle.generation += 1;
                    data.entries.values().map(|(_, value)| value.clone()).collect()
                };
                values.iter().for_each(Value::invalidate_references);
            }
            _ => {}
        }
    }

    /// Copies containers and structures recursively.
    pub fn deep_copy(&self) -> Value {
        match self {
            Value::Some(inner) => Value::some(inner.deep_copy()),
            Value::Composite(composite) => {
                let data = composite.borrow();
                if data.ty.is_resource() {
                    return self.clone();
                }
                let fields = data
                    .fields
                    .iter()
                    .map(|(name, value)| (name.clone(), value.deep_copy()))
                    .collect();
                Value::Composite(CompositeValue::new(Arc::clone(&data.ty), fields))
            }
            Value::Array(array) => {
                let data = array.borrow();
                let elements = data.elements.iter().map(Value::deep_copy).collect();
                Value::Array(ArrayValue::new(data.ty.clone(), elements))
            }
            Value::Dictionary(dictionary) => {
                let data = dictionary.borrow();
                let entries = data
                    .entries
                    .iter()
                    .map(|(hash, (key, value))| (hash.clone(), (key.clone(), value.deep_copy())))
                    .collect();
                Value::Dictionary(DictionaryValue::new(data.ty.clone(), entries))
            }
            other => other.clone(),
        }
    }

    /// Destroys a resource and every resource nested in it.
    pub fn destroy(&self) {
        match self {
            Value::Some(inner) => inner.destroy(),
            Value::Composite(composite) => {
                let fields: Vec<Value> = {
                    let mut data = composite.borrow_mut();
                    data.lifecycle.destroyed = true;
                    data.fields.values().cloned().collect()
                };
                fields.iter().for_each(Value::destroy);
            }
            Value::Array(array) => {
                let elements = {
                    let mut data = array.borrow_mut();
                    data.lifecycle.destroyed = true;
                    std::mem::take(&mut data.elements)
                };
                elements.iter().for_each(Value::destroy);
            }
            Value::Dictionary(dictionary) => {
                let entries = {
                    let mut data = dictionary.borrow_mut();
                    data.lifecycle.destroyed = true;
                    std::mem::take(&mut data.entries)
                };
                entries.values().for_each(|(_, value)| value.destroy());
            }
            _ => {}
        }
    }

    pub fn dictionary_key(&self) -> Option<DictionaryKey> {
        Some(match self {
            Value::Bool(value) => DictionaryKey::Bool(*value),
            Value::String(value) => DictionaryKey::String(value.clone()),
            Value::Character(value) => DictionaryKey::Character(value.clone()),
            Value::Address(address) => DictionaryKey::Address(*address),
            Value::Path(path) => DictionaryKey::Path(path.domain, path.identifier.clone()),
            Value::Integer { ty, value } => DictionaryKey::Integer(*ty, value.clone()),
            Value::Fixed { ty, value } => DictionaryKey::Fixed(*ty, *value),
            Value::Composite(composite) => {
                let data = composite.borrow();
                if data.ty.kind != CompositeKind::Enum {
                    return None;
                }
                match data.fields.get("rawValue") {
                    Some(Value::Integer { value, .. }) => DictionaryKey::Enum(data.ty.id(), value.clone()),
                    _ => return None,
                }
            }
            _ => return None,
        })
    }

    /// Structural equality of equatable values.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Void, Value::Void) | (Value::Nil, Value::Nil) => true,
            (Value::Some(left), Value::Some(right)) => left.equals(right),
            (Value::Some(left), right) => left.equals(right),
            (left, Value::Some(right)) => left.equals(right),
            (Value::Bool(left), Value::Bool(right)) => left == right,
            (Value::String(left), Value::String(right))
            | (Value::Character(left), Value::Character(right)) => left == right,
            (Value::Address(left), Value::Address(right)) => left == right,
            (Value::Path(left), Value::Path(right)) => left == right,
            (
                Value::Integer { ty: left_ty, value: left },
                Value::Integer { ty: right_ty, value: right },
            ) => left_ty == right_ty && left == right,
            (
                Value::Fixed { ty: left_ty, value: left },
                Value::Fixed { ty: right_ty, value: right },
            ) => left_ty == right_ty && left == right,
            (Value::Array(left), Value::Array(right)) => {
                let (left, right) = (left.borrow(), right.borrow());
                left.elements.len() == right.elements.len()
                    && left
                        .elements
                        .iter()
                        .zip(&right.elements)
                        .all(|(left, right)| left.equals(right))
            }
            (Value::Dictionary(left), Value::Dictionary(right)) => {
                let (left, right) = (left.borrow(), right.borrow());
                left.entries.len() == right.entries.len()
                    && left.entries.iter().all(|(key, (_, value))| {
                        right
                            .entries
                            .get(key)
                            .is_some_and(|(_, other)| value.equals(other))
                    })
            }
            (Value::Composite(left), Value::Composite(right)) => {
                match (self.dictionary_key(), other.dictionary_key()) {
                    (Some(DictionaryKey::Enum(..)), Some(DictionaryKey::Enum(..))) => {
                        self.dictionary_key() == other.dictionary_key()
                    }
                    _ => left.ptr_eq(right),
                }
            }
            (Value::Reference(left), Value::Reference(right)) => left.same_target(right),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Void => f.write_str("()"),
            Value::Nil => f.write_str("nil"),
            Value::Some(inner) => write!(f, "{inner}"),
            Value::Bool(value) => write!(f, "{value}"),
            Value::String(value) | Value::Character(value) => write!(f, "{value:?}"),
            Value::Address(address) => write!(f, "{address}"),
            Value::Path(path) => write!(f, "{path}"),
            Value::Integer { value, .. } => write!(f, "{value}"),
            Value::Fixed { value, .. } => f.write_str(&format_fixed_point(*value)),
            Value::Array(array) => {
                let elements: Vec<String> = array.borrow().elements.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", elements.join(", "))
            }
            Value::Dictionary(dictionary) => {
                let entries: Vec<String> = dictionary
                    .borrow()
                    .entries
                    .values()
                    .map(|(key, value)| format!("{key}: {value}"))
                    .collect();
                write!(f, "{{{}}}", entries.join(", "))
            }
            Value::Composite(composite) => {
                let data = composite.borrow();
                let fields: Vec<String> = data
                    .fields
                    .iter()
                    .map(|(name, value)| format!("{name}: {value}"))
                    .collect();
                write!(f, "{}({})", data.ty.id(), fields.join(", "))
            }
            Value::Reference(reference) => write!(f, "{reference}"),
            Value::Function(function) => write!(f, "Function<{}>", function.name()),
            Value::Moved => f.write_str("<moved>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::location::Location;

    fn vault_type() -> Arc<CompositeType> {
        Arc::new(CompositeType::new(
            Location::script("test"),
            "Vault",
            CompositeKind::Resource,
        ))
    }

    fn vault(balance: i64) -> Value {
        let mut fields = IndexMap::new();
        fields.insert("balance".to_string(), Value::int(balance));
        Value::Composite(CompositeValue::new(vault_type(), fields))
    }

    #[test]
    fn structs_are_copied_on_transfer() {
        let array = Value::Array(ArrayValue::new(Type::array(Type::INT), vec![Value::int(1)]));
        let copy = array.transfer();
        if let Value::Array(copy) = &copy {
            copy.borrow_mut().elements.push(Value::int(2));
        }
        assert_eq!(array.to_string(), "[1]");
        assert_eq!(copy.to_string(), "[1, 2]");
    }

    #[test]
    fn resources_keep_identity_and_bump_generation() {
        let resource = vault(10);
        let before = resource.generation();
        let moved = resource.transfer();
        assert_ne!(resource.generation(), before);
        match (&resource, &moved) {
            (Value::Composite(left), Value::Composite(right)) => assert!(left.ptr_eq(right)),
            _ => panic!("expected composites"),
        }
    }

    #[test]
    fn destroying_marks_nested_resources() {
        let inner = vault(1);
        let outer = Value::Array(ArrayValue::new(
            Type::array(Type::Composite(vault_type())),
            vec![inner.clone()],
        ));
        outer.destroy();
        assert!(outer.is_destroyed());
        assert!(inner.is_destroyed());
    }

    #[test]
    fn integers_of_different_types_are_distinct_keys() {
        let int = Value::int(1);
        let byte = Value::integer(PrimitiveType::UInt8, 1);
        assert_ne!(int.dictionary_key(), byte.dictionary_key());
        assert!(!int.equals(&byte));
        assert!(int.equals(&Value::some(Value::int(1))));
    }
}
