#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]
pub mod construct;
pub mod genome;
pub mod ldsc;
pub mod pipeline;
pub mod types;
#[path = "../shared/env.rs"]
pub mod shared_env;
#[path = "../shared/files.rs"]
pub mod shared_files;
pub mod shared {
    pub use super::shared_env as env;
    pub use super::shared_files as files;
}

#[path = "../download/mod.rs"]
pub mod download;
