mod client;
mod error;
mod types;

pub use client::{ClientConfig, CloudStackClient, DEFAULT_ASYNC_TIMEOUT, DEFAULT_POLL_INTERVAL};
pub use error::{CloudStackError, PARAM_ERROR_CODE};
pub use types::{
    Nic, Params, SecondaryIp, Tag, extract, extract_id, is_id, tags_to_map, unwrap_envelope,
};
