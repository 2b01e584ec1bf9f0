// Domain-driven module structure for the watchlog sidecar.

// Core infrastructure
pub mod boot;
pub mod conf;
pub mod state;

// Domain modules
pub mod collect;
pub mod runtime;
pub mod scan;
pub mod shipper;
pub mod store;
pub mod watch;
