pub mod http;
pub mod pagination;

pub use crate::utils::error::Result;
pub use http::{execute, ApiResponse};
pub use pagination::{parse_link_header, split_envelope, unwrap_envelope, AhaPage};
