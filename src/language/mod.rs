pub mod ast;
pub mod location;
pub mod span;
pub mod typecheck;
pub mod types;
