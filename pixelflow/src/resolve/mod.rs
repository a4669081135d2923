//! Reference resolution.
//!
//! Turns the upstream reference of a stage into a concrete path or value,
//! driven by the declaration table of the external graph.

mod declarations;
mod resolver;

pub use declarations::{DeclarationTable, StageDeclaration};
pub use resolver::{ReferenceResolver, Resolved};
