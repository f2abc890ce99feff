mod futures;
mod sync;

pub use futures::AsyncTimedCache;
pub use sync::TimedCache;
