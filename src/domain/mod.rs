//! Domain types for the produce supply chain.
//!
//! Request/response DTOs plus the pure rules (QC evaluation, dwell time,
//! payroll, consumption, shipment lifecycle) the route handlers apply.

pub mod alerts;
pub mod attendance;
pub mod carriers;
pub mod cold_rooms;
pub mod dashboard;
pub mod employees;
pub mod gate;
pub mod numbering;
pub mod payroll;
pub mod quality;
pub mod receiving;
pub mod settings;
pub mod shipments;
pub mod suppliers;
pub mod utilities;
pub mod visitors;
