// Domain layer: canon constants, input/report models and the ports the importers implement.

pub mod canon;
pub mod model;
pub mod ports;
