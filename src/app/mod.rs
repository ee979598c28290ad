// Application layer: scheduling and the HTTP surface around the synchronizer.

pub mod scheduler;
pub mod server;
