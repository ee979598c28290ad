// Domain layer: sync models and the ports the synchronizer drives.

pub mod model;
pub mod ports;
