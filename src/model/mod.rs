pub mod config;
pub mod mode;
pub mod project;
pub mod snapshot;
pub mod task;

pub use config::*;
pub use mode::*;
pub use project::*;
pub use snapshot::*;
pub use task::*;
