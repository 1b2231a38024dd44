//! The portal-level and per-IPP DRCP machines.

pub mod aggregator;
pub mod gateway;
pub mod ipp_periodic;
pub mod ipp_rx;
pub mod net_ipl;
pub mod ps;
