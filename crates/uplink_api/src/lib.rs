pub mod domain;
pub mod http;
pub mod uplink_api;

pub use domain::*;
pub use http::*;
pub use uplink_api::*;
