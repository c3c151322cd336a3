use crate::{
    language::{ast::CompositeKind, location::Location},
    sema::access::Authorization,
};
use num_bigint::BigInt;
use num_traits::One;
use std::{
    fmt,
    hash::{Hash, Hasher},
    sync::{Arc, OnceLock},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Never,
    Void,
    Bool,
    String,
    Character,
    Address,
    Path,
    StoragePath,
    PublicPath,
    CapabilityPath,
    Number,
    SignedNumber,
    Integer,
    SignedInteger,
    FixedPoint,
    SignedFixedPoint,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Int128,
    Int256,
    UInt,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    UInt128,
    UInt256,
    Word8,
    Word16,
    Word32,
    Word64,
    Fix64,
    UFix64,
    AnyStruct,
    AnyResource,
    HashableStruct,
}

use PrimitiveType as P;

pub const ALL_PRIMITIVES: &[PrimitiveType] = &[
    P::Never,
    P::Void,
    P::Bool,
    P::String,
    P::Character,
    P::Address,
    P::Path,
    P::StoragePath,
    P::PublicPath,
    P::CapabilityPath,
    P::Number,
    P::SignedNumber,
    P::Integer,
    P::SignedInteger,
    P::FixedPoint,
    P::SignedFixedPoint,
    P::Int,
    P::Int8,
    P::Int16,
    P::Int32,
    P::Int64,
    P::Int128,
    P::Int256,
    P::UInt,
    P::UInt8,
    P::UInt16,
    P::UInt32,
    P::UInt64,
    P::UInt128,
    P::UInt256,
    P::Word8,
    P::Word16,
    P::Word32,
    P::Word64,
    P::Fix64,
    P::UFix64,
    P::AnyStruct,
    P::AnyResource,
    P::HashableStruct,
];

/// Scale of the fixed-point types: eight decimal places.
pub const FIXED_POINT_SCALE: u32 = 8;
pub const FIXED_POINT_FACTOR: i128 = 100_000_000;

/// Parses a decimal literal such as `-1.5` into its value scaled by
/// [`FIXED_POINT_FACTOR`]. `None` if the literal is malformed or has more
/// than eight fractional digits.
pub fn parse_fixed_point(literal: &str) -> Option<i128> {
    let (negative, digits) = match literal.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, literal),
    };
    let digits: String = digits.chars().filter(|c| *c != '_').collect();
    let (integer, fraction) = digits.split_once('.').unwrap_or((digits.as_str(), ""));
    if integer.is_empty()
        || fraction.len() > FIXED_POINT_SCALE as usize
        || !integer.bytes().all(|b| b.is_ascii_digit())
        || !fraction.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }

    let integer: i128 = integer.parse().ok()?;
    let mut scaled_fraction: i128 = if fraction.is_empty() { 0 } else { fraction.parse().ok()? };
    for _ in fraction.len()..FIXED_POINT_SCALE as usize {
        scaled_fraction *= 10;
    }
    let value = integer
        .checked_mul(FIXED_POINT_FACTOR)?
        .checked_add(scaled_fraction)?;
    Some(if negative { -value } else { value })
}

/// Renders a scaled fixed-point value with all eight decimal places.
pub fn format_fixed_point(value: i128) -> String {
    let sign = if value < 0 { "-" } else { "" };
    let magnitude = value.unsigned_abs();
    let factor = FIXED_POINT_FACTOR as u128;
    format!("{sign}{}.{:08}", magnitude / factor, magnitude % factor)
}

impl PrimitiveType {
    pub fn name(self) -> &'static str {
        match self {
            P::Never => "Never",
            P::Void => "Void",
            P::Bool => "Bool",
            P::String => "String",
            P::Character => "Character",
            P::Address => "Address",
            P::Path => "Path",
            P::StoragePath => "StoragePath",
            P::PublicPath => "PublicPath",
            P::CapabilityPath => "CapabilityPath",
            P::Number => "Number",
            P::SignedNumber => "SignedNumber",
            P::Integer => "Integer",
            P::SignedInteger => "SignedInteger",
            P::FixedPoint => "FixedPoint",
            P::SignedFixedPoint => "SignedFixedPoint",
            P::Int => "Int",
            P::Int8 => "Int8",
            P::Int16 => "Int16",
            P::Int32 => "Int32",
            P::Int64 => "Int64",
            P::Int128 => "Int128",
            P::Int256 => "Int256",
            P::UInt => "UInt",
            P::UInt8 => "UInt8",
            P::UInt16 => "UInt16",
            P::UInt32 => "UInt32",
            P::UInt64 => "UInt64",
            P::UInt128 => "UInt128",
            P::UInt256 => "UInt256",
            P::Word8 => "Word8",
            P::Word16 => "Word16",
            P::Word32 => "Word32",
            P::Word64 => "Word64",
            P::Fix64 => "Fix64",
            P::UFix64 => "UFix64",
            P::AnyStruct => "AnyStruct",
            P::AnyResource => "AnyResource",
            P::HashableStruct => "HashableStruct",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        ALL_PRIMITIVES
            .iter()
            .copied()
            .find(|primitive| primitive.name() == name)
    }

    pub fn is_numeric(self) -> bool {
        self.is_integer() || self.is_fixed_point() || matches!(self, P::Number | P::SignedNumber)
    }

    pub fn is_integer(self) -> bool {
        self.is_signed_integer()
            || self.is_unsigned_integer()
            || matches!(self, P::Integer | P::SignedInteger)
    }

    /// Concrete signed integer types.
    pub fn is_signed_integer(self) -> bool {
        matches!(
            self,
            P::Int | P::Int8 | P::Int16 | P::Int32 | P::Int64 | P::Int128 | P::Int256
        )
    }

    /// Concrete unsigned integer types, including the wrapping `Word` types.
    pub fn is_unsigned_integer(self) -> bool {
        matches!(
            self,
            P::UInt
                | P::UInt8
                | P::UInt16
                | P::UInt32
                | P::UInt64
                | P::UInt128
                | P::UInt256
                | P::Word8
                | P::Word16
                | P::Word32
                | P::Word64
        )
    }

    pub fn is_word(self) -> bool {
        matches!(self, P::Word8 | P::Word16 | P::Word32 | P::Word64)
    }

    pub fn is_fixed_point(self) -> bool {
        matches!(
            self,
            P::Fix64 | P::UFix64 | P::FixedPoint | P::SignedFixedPoint
        )
    }

    pub fn is_concrete_fixed_point(self) -> bool {
        matches!(self, P::Fix64 | P::UFix64)
    }

    pub fn is_abstract_numeric(self) -> bool {
        matches!(
            self,
            P::Number
                | P::SignedNumber
                | P::Integer
                | P::SignedInteger
                | P::FixedPoint
                | P::SignedFixedPoint
        )
    }

    pub fn is_path(self) -> bool {
        matches!(
            self,
            P::Path | P::StoragePath | P::PublicPath | P::CapabilityPath
        )
    }

    pub fn is_hashable(self) -> bool {
        self.is_numeric()
            || self.is_path()
            || matches!(
                self,
                P::Bool | P::String | P::Character | P::Address | P::HashableStruct
            )
    }

    pub fn is_equatable(self) -> bool {
        !matches!(
            self,
            P::Never | P::Void | P::AnyStruct | P::AnyResource | P::HashableStruct
        )
    }

    /// Bit width of the bounded integer types.
    pub fn integer_bits(self) -> Option<u32> {
        match self {
            P::Int8 | P::UInt8 | P::Word8 => Some(8),
            P::Int16 | P::UInt16 | P::Word16 => Some(16),
            P::Int32 | P::UInt32 | P::Word32 => Some(32),
            P::Int64 | P::UInt64 | P::Word64 => Some(64),
            P::Int128 | P::UInt128 => Some(128),
            P::Int256 | P::UInt256 => Some(256),
            _ => None,
        }
    }

    /// Inclusive value range of a concrete integer type, `None` meaning unbounded.
    pub fn integer_range(self) -> Option<(Option<BigInt>, Option<BigInt>)> {
        if !self.is_signed_integer() && !self.is_unsigned_integer() {
            return None;
        }
        let bits = self.integer_bits();
        if self.is_signed_integer() {
            let range = bits.map(|bits| {
                let half = BigInt::one() << (bits - 1);
                (-half.clone(), half - 1)
            });
            Some(match range {
                Some((min, max)) => (Some(min), Some(max)),
                None => (None, None),
            })
        } else {
            let max = bits.map(|bits| (BigInt::one() << bits) - 1);
            Some((Some(BigInt::from(0)), max))
        }
    }

    /// Inclusive range of the scaled representation of a concrete fixed-point type.
    pub fn fixed_point_range(self) -> Option<(i128, i128)> {
        match self {
            P::Fix64 => Some((i64::MIN as i128, i64::MAX as i128)),
            P::UFix64 => Some((0, u64::MAX as i128)),
            _ => None,
        }
    }

    pub fn integer_in_range(self, value: &BigInt) -> bool {
        match self.integer_range() {
            Some((min, max)) => {
                min.map_or(true, |min| value >= &min) && max.map_or(true, |max| value <= &max)
            }
            None => false,
        }
    }

    /// Whether `self` is a supertype of `other` in the primitive hierarchy.
    pub fn contains(self, other: PrimitiveType) -> bool {
        if self == other {
            return true;
        }
        match self {
            P::Number => other.is_numeric(),
            P::SignedNumber => {
                other.is_signed_integer()
                    || matches!(other, P::SignedInteger | P::Fix64 | P::SignedFixedPoint)
            }
            P::Integer => other.is_integer(),
            P::SignedInteger => other.is_signed_integer(),
            P::FixedPoint => other.is_fixed_point(),
            P::SignedFixedPoint => other == P::Fix64,
            P::Path => other.is_path(),
            P::CapabilityPath => other == P::PublicPath,
            P::HashableStruct => other.is_hashable(),
            P::AnyStruct => !matches!(other, P::AnyResource),
            _ => false,
        }
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn qualified_id(location: &Location, qualified_identifier: &str) -> String {
    location.type_id(qualified_identifier)
}

/// A user-declared struct, resource, contract or enum.
///
/// Conformances are attached once, after every type of the program has been
/// declared, so that declarations can refer to each other in any order.
#[derive(Debug)]
pub struct CompositeType {
    pub location: Location,
    pub qualified_identifier: Arc<str>,
    pub kind: CompositeKind,
    pub enum_raw_type: Option<PrimitiveType>,
    conformances: OnceLock<Vec<Arc<InterfaceType>>>,
}

impl CompositeType {
    pub fn new(location: Location, qualified_identifier: impl AsRef<str>, kind: CompositeKind) -> Self {
        Self {
            location,
            qualified_identifier: Arc::from(qualified_identifier.as_ref()),
            kind,
            enum_raw_type: None,
            conformances: OnceLock::new(),
        }
    }

    pub fn with_enum_raw_type(mut self, raw_type: PrimitiveType) -> Self {
        self.enum_raw_type = Some(raw_type);
        self
    }

    pub fn id(&self) -> String {
        qualified_id(&self.location, &self.qualified_identifier)
    }

    pub fn identifier(&self) -> &str {
        self.qualified_identifier
            .rsplit('.')
            .next()
            .unwrap_or(&self.qualified_identifier)
    }

    /// Attaches the declared conformances. Later calls are ignored.
    pub fn set_conformances(&self, conformances: Vec<Arc<InterfaceType>>) {
        let _ = self.conformances.set(conformances);
    }

    pub fn conformances(&self) -> &[Arc<InterfaceType>] {
        self.conformances.get().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every interface reachable through conformances, depth-first pre-order.
    pub fn effective_conformances(&self) -> Vec<Arc<InterfaceType>> {
        crate::sema::conformance::linearize(self.conformances())
    }

    pub fn conforms_to(&self, interface: &InterfaceType) -> bool {
        let target = interface.id();
        self.effective_conformances()
            .iter()
            .any(|candidate| candidate.id() == target)
    }

    pub fn is_resource(&self) -> bool {
        self.kind.is_resource()
    }
}

impl PartialEq for CompositeType {
    fn eq(&self, other: &Self) -> bool {
        self.location == other.location && self.qualified_identifier == other.qualified_identifier
    }
}

impl Eq for CompositeType {}

#[derive(Debug)]
pub struct InterfaceType {
    pub location: Location,
    pub qualified_identifier: Arc<str>,
    pub kind: CompositeKind,
    conformances: OnceLock<Vec<Arc<InterfaceType>>>,
}

impl InterfaceType {
    pub fn new(location: Location, qualified_identifier: impl AsRef<str>, kind: CompositeKind) -> Self {
        Self {
            location,
            qualified_identifier: Arc::from(qualified_identifier.as_ref()),
            kind,
            conformances: OnceLock::new(),
        }
    }

    pub fn id(&self) -> String {
        qualified_id(&self.location, &self.qualified_identifier)
    }

    pub fn set_conformances(&self, conformances: Vec<Arc<InterfaceType>>) {
        let _ = self.conformances.set(conformances);
    }

    pub fn conformances(&self) -> &[Arc<InterfaceType>] {
        self.conformances.get().map(Vec::as_slice).unwrap_or(&[])
    }

    /// This interface followed by all of its ancestors.
    pub fn self_and_ancestors(self: &Arc<Self>) -> Vec<Arc<InterfaceType>> {
        let mut all = vec![Arc::clone(self)];
        all.extend(crate::sema::conformance::linearize(self.conformances()));
        all
    }

    pub fn is_resource(&self) -> bool {
        self.kind.is_resource()
    }
}

impl PartialEq for InterfaceType {
    fn eq(&self, other: &Self) -> bool {
        self.location == other.location && self.qualified_identifier == other.qualified_identifier
    }
}

impl Eq for InterfaceType {}

/// `{I1, I2}`: the interfaces are kept sorted by ID and deduplicated.
#[derive(Debug, PartialEq, Eq)]
pub struct IntersectionType {
    interfaces: Vec<Arc<InterfaceType>>,
}

impl IntersectionType {
    pub fn new(mut interfaces: Vec<Arc<InterfaceType>>) -> Self {
        interfaces.sort_by_key(|interface| interface.id());
        interfaces.dedup_by_key(|interface| interface.id());
        Self { interfaces }
    }

    pub fn interfaces(&self) -> &[Arc<InterfaceType>] {
        &self.interfaces
    }

    /// The listed interfaces and all of their ancestors.
    pub fn effective_interfaces(&self) -> Vec<Arc<InterfaceType>> {
        crate::sema::conformance::linearize(&self.interfaces)
    }

    pub fn is_resource(&self) -> bool {
        self.interfaces.iter().any(|interface| interface.is_resource())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct TypeParameter {
    pub name: Arc<str>,
    pub bound: Option<Type>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct FunctionType {
    pub type_parameters: Vec<Arc<TypeParameter>>,
    pub params: Vec<Type>,
    pub return_type: Type,
}

impl FunctionType {
    pub fn new(params: Vec<Type>, return_type: Type) -> Self {
        Self {
            type_parameters: Vec::new(),
            params,
            return_type,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ReferenceType {
    pub authorization: Authorization,
    pub ty: Type,
}

/// Static type. Two types are equal iff their IDs are equal.
#[derive(Clone, Debug)]
pub enum Type {
    Primitive(PrimitiveType),
    Optional(Box<Type>),
    VariableSized(Box<Type>),
    ConstantSized { element: Box<Type>, size: u64 },
    Dictionary { key: Box<Type>, value: Box<Type> },
    Function(Arc<FunctionType>),
    Reference(Arc<ReferenceType>),
    Composite(Arc<CompositeType>),
    Interface(Arc<InterfaceType>),
    Intersection(Arc<IntersectionType>),
    Generic(Arc<TypeParameter>),
    /// Produced after an error has been reported, to avoid cascades.
    Invalid,
}

impl Type {
    pub const NEVER: Type = Type::Primitive(P::Never);
    pub const VOID: Type = Type::Primitive(P::Void);
    pub const BOOL: Type = Type::Primitive(P::Bool);
    pub const STRING: Type = Type::Primitive(P::String);
    pub const INT: Type = Type::Primitive(P::Int);
    pub const UINT: Type = Type::Primitive(P::UInt);
    pub const INTEGER: Type = Type::Primitive(P::Integer);
    pub const FIX64: Type = Type::Primitive(P::Fix64);
    pub const ANY_STRUCT: Type = Type::Primitive(P::AnyStruct);
    pub const ANY_RESOURCE: Type = Type::Primitive(P::AnyResource);
    pub const HASHABLE_STRUCT: Type = Type::Primitive(P::HashableStruct);

    pub fn optional(inner: Type) -> Type {
        Type::Optional(Box::new(inner))
    }

    pub fn array(element: Type) -> Type {
        Type::VariableSized(Box::new(element))
    }

    pub fn constant_array(element: Type, size: u64) -> Type {
        Type::ConstantSized {
            element: Box::new(element),
            size,
        }
    }

    pub fn dictionary(key: Type, value: Type) -> Type {
        Type::Dictionary {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    pub fn reference(authorization: Authorization, ty: Type) -> Type {
        Type::Reference(Arc::new(ReferenceType { authorization, ty }))
    }

    pub fn function(params: Vec<Type>, return_type: Type) -> Type {
        Type::Function(Arc::new(FunctionType::new(params, return_type)))
    }

    pub fn intersection(interfaces: Vec<Arc<InterfaceType>>) -> Type {
        Type::Intersection(Arc::new(IntersectionType::new(interfaces)))
    }

    /// Type of the `nil` literal.
    pub fn nil() -> Type {
        Type::optional(Type::NEVER)
    }

    pub fn id(&self) -> String {
        match self {
            Type::Primitive(primitive) => primitive.name().to_string(),
            Type::Optional(inner) => format!("{}?", inner.id()),
            Type::VariableSized(element) => format!("[{}]", element.id()),
            Type::ConstantSized { element, size } => format!("[{};{size}]", element.id()),
            Type::Dictionary { key, value } => format!("{{{}:{}}}", key.id(), value.id()),
            Type::Function(function) => {
                let params: Vec<String> = function.params.iter().map(Type::id).collect();
                format!("fun({}):{}", params.join(","), function.return_type.id())
            }
            Type::Reference(reference) => match reference.authorization.id() {
                Some(auth) => format!("auth({auth})&{}", reference.ty.id()),
                None => format!("&{}", reference.ty.id()),
            },
            Type::Composite(composite) => composite.id(),
            Type::Interface(interface) => interface.id(),
            Type::Intersection(intersection) => {
                let ids: Vec<String> = intersection.interfaces().iter().map(|i| i.id()).collect();
                format!("{{{}}}", ids.join(","))
            }
            Type::Generic(parameter) => parameter.name.to_string(),
            Type::Invalid => "<<invalid>>".to_string(),
        }
    }

    pub fn primitive(&self) -> Option<PrimitiveType> {
        match self {
            Type::Primitive(primitive) => Some(*primitive),
            _ => None,
        }
    }

    pub fn is_primitive(&self, primitive: PrimitiveType) -> bool {
        self.primitive() == Some(primitive)
    }

    pub fn is_never(&self) -> bool {
        self.is_primitive(P::Never)
    }

    pub fn is_invalid(&self) -> bool {
        match self {
            Type::Invalid => true,
            Type::Optional(inner) | Type::VariableSized(inner) => inner.is_invalid(),
            Type::ConstantSized { element, .. } => element.is_invalid(),
            Type::Dictionary { key, value } => key.is_invalid() || value.is_invalid(),
            Type::Reference(reference) => reference.ty.is_invalid(),
            Type::Function(function) => {
                function.return_type.is_invalid() || function.params.iter().any(Type::is_invalid)
            }
            _ => false,
        }
    }

    pub fn is_resource(&self) -> bool {
        match self {
            Type::Primitive(primitive) => *primitive == P::AnyResource,
            Type::Optional(inner) | Type::VariableSized(inner) => inner.is_resource(),
            Type::ConstantSized { element, .. } => element.is_resource(),
            Type::Dictionary { value, .. } => value.is_resource(),
            Type::Composite(composite) => composite.is_resource(),
            Type::Interface(interface) => interface.is_resource(),
            Type::Intersection(intersection) => intersection.is_resource(),
            Type::Generic(parameter) => parameter.bound.as_ref().is_some_and(Type::is_resource),
            Type::Function(_) | Type::Reference(_) | Type::Invalid => false,
        }
    }

    pub fn is_equatable(&self) -> bool {
        match self {
            Type::Primitive(primitive) => primitive.is_equatable(),
            Type::Optional(inner) => inner.is_never() || inner.is_equatable(),
            Type::VariableSized(inner) => inner.is_equatable(),
            Type::ConstantSized { element, .. } => element.is_equatable(),
            Type::Dictionary { value, .. } => value.is_equatable(),
            Type::Reference(reference) => reference.ty.is_equatable(),
            Type::Composite(composite) => composite.kind == CompositeKind::Enum,
            Type::Invalid => true,
            Type::Function(_) | Type::Interface(_) | Type::Intersection(_) | Type::Generic(_) => false,
        }
    }

    /// Valid as a dictionary key.
    pub fn is_hashable(&self) -> bool {
        match self {
            Type::Primitive(primitive) => primitive.is_hashable(),
            Type::Composite(composite) => composite.kind == CompositeKind::Enum,
            Type::Invalid => true,
            _ => false,
        }
    }

    /// Values of this type are reached through a reference rather than
    /// copied when accessed as a member of a referenced value.
    pub fn is_container(&self) -> bool {
        match self {
            Type::Composite(composite) => composite.kind != CompositeKind::Enum,
            Type::VariableSized(_)
            | Type::ConstantSized { .. }
            | Type::Dictionary { .. }
            | Type::Intersection(_)
            | Type::Interface(_) => true,
            Type::Primitive(primitive) => matches!(primitive, P::AnyStruct | P::AnyResource),
            _ => false,
        }
    }

    pub fn unwrap_optional(&self) -> &Type {
        match self {
            Type::Optional(inner) => inner.unwrap_optional(),
            other => other,
        }
    }

    pub fn optional_depth(&self) -> usize {
        match self {
            Type::Optional(inner) => 1 + inner.optional_depth(),
            _ => 0,
        }
    }

    pub fn element_type(&self) -> Option<&Type> {
        match self {
            Type::VariableSized(element) => Some(element),
            Type::ConstantSized { element, .. } => Some(element),
            _ => None,
        }
    }

    /// Top type of the matching resource kind.
    pub fn top_for(resource: bool) -> Type {
        if resource {
            Type::ANY_RESOURCE
        } else {
            Type::ANY_STRUCT
        }
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Type::Primitive(a), Type::Primitive(b)) => a == b,
            _ => self.id() == other.id(),
        }
    }
}

impl Eq for Type {}

impl Hash for Type {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl From<PrimitiveType> for Type {
    fn from(primitive: PrimitiveType) -> Self {
        Type::Primitive(primitive)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Primitive(primitive) => f.write_str(primitive.name()),
            Type::Optional(inner) => write!(f, "{inner}?"),
            Type::VariableSized(element) => write!(f, "[{element}]"),
            Type::ConstantSized { element, size } => write!(f, "[{element}; {size}]"),
            Type::Dictionary { key, value } => write!(f, "{{{key}: {value}}}"),
            Type::Function(function) => {
                let params: Vec<String> = function.params.iter().map(ToString::to_string).collect();
                write!(f, "fun({}): {}", params.join(", "), function.return_type)
            }
            Type::Reference(reference) => write!(f, "{}&{}", reference.authorization, reference.ty),
            Type::Composite(composite) => f.write_str(&composite.qualified_identifier),
            Type::Interface(interface) => f.write_str(&interface.qualified_identifier),
            Type::Intersection(intersection) => {
                let names: Vec<&str> = intersection
                    .interfaces()
                    .iter()
                    .map(|interface| &*interface.qualified_identifier)
                    .collect();
                write!(f, "{{{}}}", names.join(", "))
            }
            Type::Generic(parameter) => f.write_str(&parameter.name),
            Type::Invalid => f.write_str("<<invalid>>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sema::access::EntitlementType;

    fn interface(name: &str) -> Arc<InterfaceType> {
        Arc::new(InterfaceType::new(
            Location::script("test"),
            name,
            CompositeKind::Structure,
        ))
    }

    #[test]
    fn intersection_ids_ignore_order() {
        let (i1, i2) = (interface("I1"), interface("I2"));
        let a = Type::intersection(vec![i1.clone(), i2.clone()]);
        let b = Type::intersection(vec![i2, i1]);
        assert_eq!(a.id(), "{S.test.I1,S.test.I2}");
        assert_eq!(a, b);
    }

    #[test]
    fn container_ids() {
        assert_eq!(Type::constant_array(Type::INT, 2).id(), "[Int;2]");
        assert_eq!(
            Type::dictionary(Type::STRING, Type::optional(Type::INT)).id(),
            "{String:Int?}"
        );
        assert_ne!(Type::constant_array(Type::INT, 2), Type::constant_array(Type::INT, 3));
        let reference = Type::reference(
            Authorization::conjunction([EntitlementType::builtin("Mutate")]),
            Type::array(Type::INT),
        );
        assert_eq!(reference.id(), "auth(Mutate)&[Int]");
        assert_eq!(reference.to_string(), "auth(Mutate) &[Int]");
    }

    #[test]
    fn resource_kind_propagates_through_containers() {
        let resource = Type::Composite(Arc::new(CompositeType::new(
            Location::script("test"),
            "R",
            CompositeKind::Resource,
        )));
        assert!(resource.is_resource());
        assert!(Type::array(Type::optional(resource.clone())).is_resource());
        assert!(Type::dictionary(Type::STRING, resource.clone()).is_resource());
        assert!(!Type::reference(Authorization::Unauthorized, resource).is_resource());
    }

    #[test]
    fn integer_ranges() {
        assert!(P::Int8.integer_in_range(&BigInt::from(-128)));
        assert!(!P::Int8.integer_in_range(&BigInt::from(128)));
        assert!(P::UInt8.integer_in_range(&BigInt::from(255)));
        assert!(!P::UInt.integer_in_range(&BigInt::from(-1)));
        assert!(P::Int.integer_in_range(&(BigInt::one() << 300)));
        assert!(!P::Fix64.integer_in_range(&BigInt::from(1)));
    }

    #[test]
    fn fixed_point_literals() {
        assert_eq!(parse_fixed_point("1.5"), Some(150_000_000));
        assert_eq!(parse_fixed_point("-0.00000001"), Some(-1));
        assert_eq!(parse_fixed_point("1.000000001"), None);
        assert_eq!(parse_fixed_point(".5"), None);
        assert_eq!(format_fixed_point(-150_000_000), "-1.50000000");
        assert_eq!(P::UFix64.fixed_point_range(), Some((0, u64::MAX as i128)));
    }

    #[test]
    fn primitive_hierarchy() {
        assert!(P::Integer.contains(P::UInt8));
        assert!(P::SignedInteger.contains(P::Int64));
        assert!(!P::SignedInteger.contains(P::UInt64));
        assert!(P::Number.contains(P::UFix64));
        assert!(!P::Int.contains(P::Int8));
        assert!(P::HashableStruct.contains(P::String));
        assert!(P::CapabilityPath.contains(P::PublicPath));
    }

    #[test]
    fn hashable_and_equatable() {
        assert!(Type::STRING.is_hashable());
        assert!(!Type::array(Type::INT).is_hashable());
        assert!(Type::array(Type::INT).is_equatable());
        assert!(!Type::dictionary(Type::STRING, Type::function(vec![], Type::VOID)).is_equatable());
    }
}
