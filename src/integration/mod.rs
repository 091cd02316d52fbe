//! Integration tests driving the buffer exchange and the stream end to end

pub mod e2e;
pub mod fixtures;
