// Domain layer: report model and ports. Nothing here talks to the network
// or the filesystem.

pub mod model;
pub mod ports;
