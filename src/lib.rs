pub mod config;
pub mod credentials;
pub mod error;
pub mod logging;
pub mod rag;
pub mod runtime;

pub use config::RagConfig;
pub use error::{RagError, Result};
pub use runtime::RagRuntime;
