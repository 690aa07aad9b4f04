// Vendor hierarchy stored as a nested-interval tree

pub mod node;
pub mod tree;

pub use node::*;
pub use tree::*;
