use crate::{
    language::typecheck::{CheckerError, CheckerErrors},
    runtime::error::{Error as RuntimeFailure, ErrorClass},
};
use miette::{Diagnostic, NamedSource, Report, SourceSpan};
use thiserror::Error;

#[derive(Debug, Error, Diagnostic, Clone)]
#[error("{message}")]
pub struct CheckerDiagnostic {
    #[source_code]
    src: NamedSource<String>,
    #[label("{label}")]
    span: SourceSpan,
    #[help]
    help: Option<String>,
    message: String,
    label: String,
}

impl CheckerDiagnostic {
    pub fn from_error(src: NamedSource<String>, error: &CheckerError) -> Self {
        Self {
            src,
            span: error.span.into(),
            help: error.help.clone(),
            message: error.display_message(),
            label: error.kind.code().to_string(),
        }
    }
}

pub fn checker_reports(name: &str, source: &str, errors: &CheckerErrors) -> Vec<Report> {
    let src = NamedSource::new(name, source.to_string());
    errors
        .iter()
        .map(|error| Report::new(CheckerDiagnostic::from_error(src.clone(), error)))
        .collect()
}

pub fn emit_checker_errors(name: &str, source: &str, errors: &CheckerErrors) {
    for report in checker_reports(name, source, errors) {
        eprintln!("{:?}", report);
    }
}

#[derive(Debug, Error, Diagnostic, Clone)]
#[error("{message}")]
pub struct RuntimeDiagnostic {
    #[source_code]
    src: NamedSource<String>,
    #[label("in {function}")]
    span: Option<SourceSpan>,
    #[help]
    help: Option<String>,
    message: String,
    function: String,
}

impl RuntimeDiagnostic {
    pub fn from_error(src: NamedSource<String>, error: &RuntimeFailure) -> Self {
        let mut help = Vec::new();
        if error.class() == ErrorClass::Internal {
            help.push("this is a bug in the interpreter, not in the program".to_string());
        }
        if error.stack_trace.len() > 1 {
            let frames: Vec<String> = error
                .stack_trace
                .iter()
                .rev()
                .map(|frame| format!("  {frame}"))
                .collect();
            help.push(format!("stack trace:\n{}", frames.join("\n")));
        }
        Self {
            src,
            span: error.span().map(SourceSpan::from),
            help: (!help.is_empty()).then(|| help.join("\n")),
            message: format!("{}: {}", error.location, error.cause),
            function: error
                .stack_trace
                .last()
                .map(|frame| frame.function.clone())
                .unwrap_or_default(),
        }
    }
}

pub fn report_runtime_error(name: &str, source: &str, error: &RuntimeFailure) {
    let src = NamedSource::new(name, source.to_string());
    eprintln!("{:?}", Report::new(RuntimeDiagnostic::from_error(src, error)));
}
