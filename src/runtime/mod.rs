pub mod conditions;
pub mod config;
pub mod containers;
pub mod environment;
pub mod error;
mod evaluation;
mod execution;
pub mod executor;
pub mod interpreter;
pub mod metering;
pub mod numeric;
pub mod reference;
pub mod storage;
pub mod value;

pub use config::{Config, HostActivation};
pub use error::{Error, ErrorClass, RuntimeError, RuntimeResult, StackFrame};
pub use executor::{ExecutionError, FunctionExecutor};
pub use interpreter::Interpreter;
pub use metering::{ComputationKind, MemoryKind, MemoryUsage, MeterGauge, MeteringError, Unmetered};
pub use reference::{EphemeralReference, ReferenceValue, StorageReference};
pub use storage::{InMemoryStorage, Ledger, Storage, StorageKey, StoredValue};
pub use value::{FunctionValue, HostFunction, PathValue, Value};
