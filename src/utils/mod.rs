pub mod http;
pub mod logging;
pub mod media;
pub mod timing;
