pub mod color;
pub mod geometry;
pub mod layout;
pub mod matrix;
pub mod node;
pub mod style;
pub mod text;
