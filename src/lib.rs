#![allow(clippy::collapsible_if)]

pub mod config;
pub mod diagnostics;
pub mod language;
pub mod runtime;
pub mod sema;

#[cfg(test)]
mod tests;
