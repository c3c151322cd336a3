//! Hooks through which a host meters computation and memory.
//!
//! The interpreter only reports usage; pricing and limits are the gauge's
//! business. A gauge error aborts the current invocation.

use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ComputationKind {
    Statement,
    Loop,
    FunctionInvocation,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MemoryKind {
    Composite,
    Array,
    Dictionary,
    String,
    Reference,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemoryUsage {
    pub kind: MemoryKind,
    pub amount: u64,
}

impl MemoryUsage {
    pub fn new(kind: MemoryKind, amount: u64) -> Self {
        Self { kind, amount }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("metering failed: {message}")]
pub struct MeteringError {
    pub message: String,
}

impl MeteringError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub trait MeterGauge {
    fn meter_computation(&mut self, kind: ComputationKind, intensity: u64) -> Result<(), MeteringError>;

    fn meter_memory(&mut self, usage: MemoryUsage) -> Result<(), MeteringError>;
}

/// Accepts everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct Unmetered;

impl MeterGauge for Unmetered {
    fn meter_computation(&mut self, _kind: ComputationKind, _intensity: u64) -> Result<(), MeteringError> {
        Ok(())
    }

    fn meter_memory(&mut self, _usage: MemoryUsage) -> Result<(), MeteringError> {
        Ok(())
    }
}
