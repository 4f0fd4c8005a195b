//! Remote storage provider access
//!
//! The pipeline runners only see [`RemoteClient`]. Two implementations exist:
//! - [`BaiduPcsClient`] - the real provider over HTTP
//! - [`MemoryRemote`] - an in-process provider for tests and dry runs
//!
//! Provider error payloads are scrubbed by [`sanitize`] before they leave this module.

mod memory;
mod pcs;
pub mod sanitize;
mod traits;

pub use memory::{MemoryRemote, Operation};
pub use pcs::BaiduPcsClient;
pub use sanitize::{provider_message, sanitize_message};
pub use traits::{
    CAPTCHA_NEEDED_CODE, CaptchaAnswer, LIST_NOT_READY_CODE, RemoteClient, remote_file_name,
};
