mod ports;
mod service;

pub use ports::{AttemptInfo, RateLimitStore};
pub use service::{
    RATE_LIMIT_WINDOW_SECONDS, RateLimitDecision, RateLimitScope, RateLimitService,
};
