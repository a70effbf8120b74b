//! Line-shape model implementations.
//!
//! Shapes are implemented as small, pure functions over the `ShapeModel` tag so
//! that fitting and kernel rendering share one code path.

pub mod shape;

pub use shape::*;
