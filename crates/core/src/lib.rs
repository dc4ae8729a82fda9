pub mod field;
pub mod geometry;

pub use field::{Field, FieldRecord, NOT_AVAILABLE};
pub use geometry::{BoundingBox, Point};
