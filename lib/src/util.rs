mod hash;
mod ref_id;

pub use hash::*;
pub use ref_id::*;
