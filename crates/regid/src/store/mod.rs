mod document;
mod interface;
mod memory;
mod status;

pub use document::*;
pub use interface::*;
pub use memory::*;
pub use status::*;
