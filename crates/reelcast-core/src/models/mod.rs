pub mod composition;
pub mod hosting;
pub mod usage;

pub use composition::*;
pub use hosting::*;
pub use usage::*;
