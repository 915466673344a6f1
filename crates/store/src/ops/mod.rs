//! Library operations, one module per area of the authoring model.

mod books;
mod characters;
mod series;
mod writing;

pub use self::characters::RelationshipView;
