// Multi-level document verification workflow

pub mod decision;
pub mod document;
pub mod machine;

pub use decision::*;
pub use document::*;
pub use machine::*;
