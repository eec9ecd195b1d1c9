pub mod level;
pub mod value;
pub mod record;
pub mod backend;
pub mod json;
pub mod capture;
pub mod logger;

#[cfg(feature = "async-sink")]
pub mod sink;
#[cfg(feature = "async-sink")]
pub mod channel;

pub mod layer;
pub mod init;
pub mod env;
pub mod sample;

pub use backend::Backend;
pub use level::Level;
pub use logger::Logger;
pub use value::{Attr, Value};
