//! HazardHawk foundation: on-device safety hazard analysis.
//!
//! Everything lives under [`orchestrator`]; the most common types are
//! re-exported there.

pub mod orchestrator;
