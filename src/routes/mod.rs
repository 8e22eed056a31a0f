pub mod alerts;
pub mod attendance;
pub mod carriers;
pub mod cold_rooms;
pub mod dashboard;
pub mod employees;
pub mod gate;
pub mod health;
pub mod me;
pub mod payroll;
pub mod quality_checks;
pub mod receivings;
pub mod settings;
pub mod shipments;
pub mod suppliers;
pub mod utilities;
pub mod visitors;

use axum::{
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;

use crate::app::AppState;

/// Build the authenticated API router, mounted under `/api`
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/me", get(me::get_me))
        // Settings
        .route(
            "/settings",
            get(settings::get_settings).put(settings::update_settings),
        )
        // Suppliers
        .route(
            "/suppliers",
            get(suppliers::list_suppliers).post(suppliers::create_supplier),
        )
        .route(
            "/suppliers/:id",
            get(suppliers::get_supplier)
                .put(suppliers::update_supplier)
                .delete(suppliers::delete_supplier),
        )
        // Receiving
        .route(
            "/receivings",
            get(receivings::list_receivings).post(receivings::create_receiving),
        )
        .route(
            "/receivings/:id",
            get(receivings::get_receiving).delete(receivings::delete_receiving),
        )
        .route(
            "/receivings/:id/status",
            patch(receivings::update_receiving_status),
        )
        .route("/receivings/:id/grn", get(receivings::get_grn))
        // Quality control
        .route(
            "/quality-checks",
            get(quality_checks::list_quality_checks).post(quality_checks::create_quality_check),
        )
        .route("/quality-checks/stats", get(quality_checks::get_quality_stats))
        .route("/quality-checks/:id", get(quality_checks::get_quality_check))
        // Cold rooms
        .route(
            "/cold-rooms",
            get(cold_rooms::list_cold_rooms).post(cold_rooms::create_cold_room),
        )
        .route("/cold-rooms/status", get(cold_rooms::get_status_board))
        .route(
            "/cold-rooms/:id",
            get(cold_rooms::get_cold_room)
                .put(cold_rooms::update_cold_room)
                .delete(cold_rooms::delete_cold_room),
        )
        .route(
            "/cold-rooms/:id/readings",
            get(cold_rooms::list_readings).post(cold_rooms::create_reading),
        )
        .route(
            "/cold-rooms/:id/personnel-log",
            get(cold_rooms::list_personnel_log).post(cold_rooms::create_personnel_log),
        )
        .route("/cold-rooms/:id/occupancy", get(cold_rooms::get_occupancy))
        // Carriers and shipments
        .route(
            "/carriers",
            get(carriers::list_carriers).post(carriers::create_carrier),
        )
        .route(
            "/carriers/:id",
            get(carriers::get_carrier)
                .put(carriers::update_carrier)
                .delete(carriers::delete_carrier),
        )
        .route(
            "/shipments",
            get(shipments::list_shipments).post(shipments::create_shipment),
        )
        .route(
            "/shipments/:id",
            get(shipments::get_shipment)
                .put(shipments::update_shipment)
                .delete(shipments::delete_shipment),
        )
        .route(
            "/shipments/:id/events",
            get(shipments::list_shipment_events).post(shipments::create_shipment_event),
        )
        // Workforce
        .route(
            "/employees",
            get(employees::list_employees).post(employees::create_employee),
        )
        .route(
            "/employees/:id",
            get(employees::get_employee)
                .put(employees::update_employee)
                .delete(employees::delete_employee),
        )
        .route("/attendance", get(attendance::list_attendance))
        .route("/attendance/check-in", post(attendance::check_in))
        .route("/attendance/check-out", post(attendance::check_out))
        .route(
            "/payroll/runs",
            get(payroll::list_payroll_runs).post(payroll::create_payroll_run),
        )
        .route(
            "/payroll/runs/:id",
            get(payroll::get_payroll_run).delete(payroll::delete_payroll_run),
        )
        // Gate
        .route(
            "/visitors",
            get(visitors::list_visitors).post(visitors::check_in_visitor),
        )
        .route("/visitors/:id", get(visitors::get_visitor))
        .route("/visitors/:id/check-out", post(visitors::check_out_visitor))
        .route(
            "/gate/vehicles",
            get(gate::list_movements).post(gate::record_entry),
        )
        .route("/gate/vehicles/:id/exit", post(gate::record_exit))
        // Utilities
        .route(
            "/utility-meters",
            get(utilities::list_meters).post(utilities::create_meter),
        )
        .route(
            "/utility-meters/:id",
            get(utilities::get_meter)
                .put(utilities::update_meter)
                .delete(utilities::delete_meter),
        )
        .route(
            "/utility-meters/:id/readings",
            get(utilities::list_readings).post(utilities::create_reading),
        )
        .route(
            "/utility-meters/:id/consumption",
            get(utilities::get_consumption),
        )
        // Alerts and dashboard
        .route("/alerts", get(alerts::list_alerts))
        .route("/alerts/:id/acknowledge", post(alerts::acknowledge_alert))
        .route("/dashboard/summary", get(dashboard::get_summary))
}
