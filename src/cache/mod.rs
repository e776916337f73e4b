//! Response caching keyed by function identity and arguments.

mod key;
mod response;

pub use key::CacheKey;
pub use response::ResponseCache;
