pub mod access;
pub mod builtins;
pub mod conformance;
pub mod entitlement_set;
pub mod subtype;
pub mod supertype;
pub mod ty;

pub use access::{Access, Authorization, EntitlementSetAccess, EntitlementType, PrimitiveAccess, SetKind};
pub use entitlement_set::EntitlementSet;
pub use supertype::least_common_supertype;
pub use ty::{CompositeType, FunctionType, InterfaceType, IntersectionType, PrimitiveType, ReferenceType, Type};
