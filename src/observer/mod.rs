// Observer system for side effects of committed operations:
// audit records (ring 7) and notifications (ring 9)

pub mod context;
pub mod traits;
pub mod pipeline;
pub mod error;
pub mod implementations;

// Re-export core types
pub use context::*;
pub use traits::*;
pub use pipeline::*;
pub use error::*;
pub use implementations::*;
