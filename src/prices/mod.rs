pub mod fallback;
pub mod poller;
pub mod request_queue;
pub mod service;

pub use poller::PricePoller;
pub use service::{PriceService, PriceSettings};
