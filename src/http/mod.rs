pub mod compression;
pub mod decode;
pub mod errorsurface;
pub mod httpcache;
pub mod request;
pub mod requestbody;
pub mod response;
pub mod streamfactory;

// Re-exports for convenience
pub use compression::{CompressionConfig, CompressionNegotiator, CompressionPreference, ContentCoding};
pub use errorsurface::{ErrorSurface, RedirectError};
pub use request::HttpRequest;
pub use requestbody::RequestBody;
pub use response::HttpResponse;
