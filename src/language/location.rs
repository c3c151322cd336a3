use std::{fmt, sync::Arc};

/// Account address, eight bytes big-endian.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub [u8; 8]);

impl Address {
    pub const ZERO: Address = Address([0; 8]);

    pub fn from_u64(value: u64) -> Self {
        Address(value.to_be_bytes())
    }

    pub fn to_u64(self) -> u64 {
        u64::from_be_bytes(self.0)
    }

    pub fn hex(&self) -> String {
        self.0.iter().map(|byte| format!("{byte:02x}")).collect()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.hex())
    }
}

/// Where a program (and therefore every type it declares) comes from.
///
/// The location is part of every user-defined type ID, so two declarations
/// with the same name in different locations are different types.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Location {
    /// A transaction or script identified by name.
    Script(Arc<str>),
    /// A contract deployed to an account.
    Address { address: Address, name: Arc<str> },
}

impl Location {
    pub fn script(name: impl AsRef<str>) -> Self {
        Location::Script(Arc::from(name.as_ref()))
    }

    pub fn address(address: Address, name: impl AsRef<str>) -> Self {
        Location::Address {
            address,
            name: Arc::from(name.as_ref()),
        }
    }

    /// Prefix used when building qualified type IDs.
    pub fn type_id_prefix(&self) -> String {
        match self {
            Location::Script(name) => format!("S.{name}"),
            Location::Address { address, name } => format!("A.{}.{name}", address.hex()),
        }
    }

    pub fn type_id(&self, qualified_identifier: &str) -> String {
        format!("{}.{qualified_identifier}", self.type_id_prefix())
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Script(name) => f.write_str(name),
            Location::Address { address, name } => write!(f, "{address}.{name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_ids_carry_location_prefix() {
        assert_eq!(Location::script("test").type_id("Foo.Bar"), "S.test.Foo.Bar");
        let location = Location::address(Address::from_u64(1), "C");
        assert_eq!(location.type_id("C.R"), "A.0000000000000001.C.C.R");
    }

    #[test]
    fn address_displays_as_hex() {
        assert_eq!(Address::from_u64(0x42).to_string(), "0x0000000000000042");
        assert_eq!(Address::from_u64(7).to_u64(), 7);
    }
}
