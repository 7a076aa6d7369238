//! The error type returned by fallible `hwir` operations.

use arcstr::ArcStr;
use thiserror::Error;

/// Errors produced while building or emitting a [`crate::graph::Component`].
///
/// Every variant corresponds to one of the error kinds in the design
/// document: structural, directional, typing, value, and back-end errors.
/// The library does not attempt recovery; an error is fatal to the
/// operation in progress.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// An object with this name already exists in the pool or graph.
    #[error("duplicate name `{0}` in {1}")]
    DuplicateName(ArcStr, &'static str),

    /// An object was referenced before it was added to the graph.
    #[error("object `{0}` referenced before being added to graph `{1}`")]
    NotYetAdded(ArcStr, ArcStr),

    /// An object is already owned by a different graph.
    #[error("object `{0}` is already owned by graph `{1}`")]
    AlreadyOwned(ArcStr, ArcStr),

    /// A component's ports/parameters were mutated after it was instantiated.
    #[error("component `{0}` was already instantiated; its ports and parameters are frozen")]
    Frozen(ArcStr),

    /// An instance output port was driven from its parent.
    #[error("cannot drive instance output port `{0}`")]
    DriveInstanceOutput(ArcStr),

    /// A component input port was driven from inside the component.
    #[error("cannot drive component input port `{0}` from inside the component")]
    DriveComponentInput(ArcStr),

    /// A component output port was read from before being driven.
    #[error("cannot source from component output port `{0}` inside the component")]
    SourceComponentOutput(ArcStr),

    /// An instance input port was used as a source.
    #[error("cannot source from instance input port `{0}`")]
    SourceInstanceInput(ArcStr),

    /// Two different components were connected directly.
    #[error("cannot connect across two different component graphs (`{0}` and `{1}`)")]
    CrossComponent(ArcStr, ArcStr),

    /// No mapper exists between the two connected types, and they are not
    /// structurally equal.
    #[error("no type mapper between `{0}` and `{1}`, and the types are not equal")]
    NoMapper(ArcStr, ArcStr),

    /// A literal node had an edge added to its (nonexistent) input.
    #[error("literal `{0}` cannot have an input edge")]
    LiteralHasInput(ArcStr),

    /// Division by zero during expression minimization.
    #[error("division by zero while minimizing expression `{0}`")]
    DivisionByZero(ArcStr),

    /// A parameter's default was not resolvable to a literal.
    #[error("parameter `{0}`'s default is not a literal")]
    DefaultNotLiteral(ArcStr),

    /// A vector's width could not be resolved to a literal before flattening.
    #[error("vector width for `{0}` did not resolve to a literal before flattening")]
    UnresolvedWidth(ArcStr),

    /// A node/array/edge id did not exist on the graph it was looked up on.
    #[error("no such {0} `{1}` on graph `{2}`")]
    NoSuchObject(&'static str, ArcStr, ArcStr),

    /// A name exists but refers to an object of a different kind.
    #[error("object `{0}` on graph `{1}` is not a {2}")]
    WrongKind(ArcStr, ArcStr, &'static str),

    /// The VHDL back-end encountered a non-physical type.
    #[error("cannot emit non-physical type `{0}` in VHDL")]
    NonPhysicalType(ArcStr),

    /// Signalization produced a signal driven by two sources; unreachable in
    /// a correctly built graph, reported defensively.
    #[error("signal `{0}` has more than one driver after signalization")]
    DoubleDriven(ArcStr),

    /// A back-end's text buffer failed to format; unreachable when writing
    /// to a `String`, reported defensively rather than unwrapped.
    #[error("formatting error: {0:?}")]
    Fmt(#[from] std::fmt::Error),
}

/// Convenience alias for `hwir` operations.
pub type Result<T> = std::result::Result<T, Error>;
