// This module groups the two rewriting passes of the back end. Boolean lowering
// runs while the front end builds the graph, once per Boolean-context triple, and
// turns Boolean expressions into compare-and-jump chains. Temporary allocation
// runs once per unit from the finalizer, after reference resolution, and assigns
// every consumed value a slot of its class.

//! Back-end passes over the triple graph.

pub mod bool_lower;
pub mod temp_alloc;

pub use bool_lower::BoolLowering;
pub use temp_alloc::{TempAllocator, TempLayout};
