pub mod h2;
pub mod stream;
pub mod types;
pub mod utils;

pub use h2::{H2Connection, H2Transport, H2};
pub use stream::*;
pub use types::*;
pub use utils::*;
