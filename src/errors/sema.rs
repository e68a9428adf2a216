// src/errors/sema.rs
//! Elaboration errors (E21xx).

use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

#[derive(Error, Debug, Diagnostic, Clone)]
pub enum ElabError {
    #[error("unresolved type '{name}'")]
    #[diagnostic(code(E2101))]
    UnresolvedType {
        name: String,
        #[label("no type with this name")]
        span: SourceSpan,
    },

    #[error("conflicting signature for '{name}' in class '{class}'")]
    #[diagnostic(
        code(E2102),
        help("two members with the same name, arity and return kind must differ in a concrete parameter type")
    )]
    SignatureConflict {
        name: String,
        class: String,
        #[label("conflicts with an earlier declaration")]
        span: SourceSpan,
    },

    #[error("class '{class}' does not implement '{method}'")]
    #[diagnostic(
        code(E2103),
        help("implement the method or declare the class abstract")
    )]
    UnimplementedObligation {
        method: String,
        class: String,
        #[label("required by an ancestor of this class")]
        span: SourceSpan,
    },

    #[error("no implementation for '{method}' in '{adaptee}'")]
    #[diagnostic(code(E2104))]
    AdapterObligation {
        method: String,
        adaptee: String,
        #[label("adapter requested here")]
        span: SourceSpan,
    },

    #[error("cannot resolve included class '{name}'")]
    #[diagnostic(code(E2105))]
    UnresolvedInclude {
        name: String,
        #[label("not a class in this program")]
        span: SourceSpan,
    },
}
