//! Cold room domain types
//!
//! Rooms, temperature readings and the personnel entry/exit log from which
//! dwell time is derived.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ColdRoomResponse {
    pub id: Uuid,
    pub name: String,
    pub location: Option<String>,
    pub min_temp_c: f64,
    pub max_temp_c: f64,
    pub max_dwell_minutes: Option<i32>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ColdRoomResponse {
    pub fn in_range(&self, temperature_c: f64) -> bool {
        temperature_c >= self.min_temp_c && temperature_c <= self.max_temp_c
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_create_range"))]
pub struct CreateColdRoomRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
    pub min_temp_c: f64,
    pub max_temp_c: f64,
    #[serde(default)]
    #[validate(range(min = 1, max = 720))]
    pub max_dwell_minutes: Option<i32>,
}

fn validate_create_range(req: &CreateColdRoomRequest) -> Result<(), ValidationError> {
    if req.min_temp_c < req.max_temp_c {
        Ok(())
    } else {
        Err(ValidationError::new("temperature_range")
            .with_message("min_temp_c must be below max_temp_c".into()))
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateColdRoomRequest {
    #[serde(default)]
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub min_temp_c: Option<f64>,
    #[serde(default)]
    pub max_temp_c: Option<f64>,
    #[serde(default)]
    #[validate(range(min = 1, max = 720))]
    pub max_dwell_minutes: Option<i32>,
    #[serde(default)]
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ColdRoomQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub active: Option<bool>,
}

// ---------------------------------------------------------------------------
// Temperature readings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ReadingResponse {
    pub id: Uuid,
    pub cold_room_id: Uuid,
    pub temperature_c: f64,
    pub humidity_pct: Option<f64>,
    pub out_of_range: bool,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateReadingRequest {
    #[validate(range(max = 80.0))]
    pub temperature_c: f64,
    #[serde(default)]
    #[validate(range(min = 0.0, max = 100.0))]
    pub humidity_pct: Option<f64>,
    #[serde(default)]
    pub recorded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ReadingQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Personnel log and dwell time
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PersonnelAction {
    Entry,
    Exit,
}

impl PersonnelAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entry => "entry",
            Self::Exit => "exit",
        }
    }

    pub fn from_db(value: &str) -> Self {
        match value {
            "exit" => Self::Exit,
            _ => Self::Entry,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PersonnelLogResponse {
    pub id: Uuid,
    pub cold_room_id: Uuid,
    pub employee_id: Uuid,
    pub employee_name: String,
    pub action: PersonnelAction,
    pub occurred_at: DateTime<Utc>,
    pub recorded_by: Uuid,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePersonnelLogRequest {
    pub employee_id: Uuid,
    pub action: PersonnelAction,
    #[serde(default)]
    pub at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct PersonnelLogQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub employee_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// One entry/exit event, as needed by the occupancy reduction.
/// `seq` is the insertion order and breaks ties between equal timestamps.
#[derive(Debug, Clone)]
pub struct LogEvent {
    pub seq: i64,
    pub employee_id: Uuid,
    pub employee_name: String,
    pub action: PersonnelAction,
    pub occurred_at: DateTime<Utc>,
}

/// How far past the server clock an event time may lie
pub const MAX_EVENT_SKEW_MINUTES: i64 = 2;

/// Why a personnel event cannot be appended to the log
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersonnelLogError {
    AlreadyInside,
    NotInside,
    BeforeLastEvent { last_at: DateTime<Utc> },
    InFuture,
}

/// Check a new event against the employee's last event in the room.
///
/// Events for one employee form an alternating entry/exit sequence that
/// never goes back in time. An event at the same instant as the previous one
/// is accepted and ordered after it.
pub fn check_personnel_event(
    action: PersonnelAction,
    at: DateTime<Utc>,
    last: Option<(PersonnelAction, DateTime<Utc>)>,
    now: DateTime<Utc>,
) -> Result<(), PersonnelLogError> {
    if at > now + Duration::minutes(MAX_EVENT_SKEW_MINUTES) {
        return Err(PersonnelLogError::InFuture);
    }

    let inside = matches!(last, Some((PersonnelAction::Entry, _)));
    match (action, inside) {
        (PersonnelAction::Entry, true) => return Err(PersonnelLogError::AlreadyInside),
        (PersonnelAction::Exit, false) => return Err(PersonnelLogError::NotInside),
        _ => {}
    }

    match last {
        Some((_, last_at)) if at < last_at => Err(PersonnelLogError::BeforeLastEvent { last_at }),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DwellState {
    Ok,
    Warning,
    Exceeded,
}

#[derive(Debug, Clone, Serialize)]
pub struct Occupant {
    pub employee_id: Uuid,
    pub employee_name: String,
    pub entered_at: DateTime<Utc>,
    pub dwell_minutes: i64,
    pub state: DwellState,
}

#[derive(Debug, Clone, Serialize)]
pub struct OccupancyResponse {
    pub cold_room_id: Uuid,
    pub cold_room_name: String,
    pub max_dwell_minutes: i32,
    pub warning_after_minutes: i64,
    pub occupants: Vec<Occupant>,
    pub exceeded_count: usize,
    pub as_of: DateTime<Utc>,
}

/// Dwell limits for one room
#[derive(Debug, Clone, Copy)]
pub struct DwellPolicy {
    pub max_dwell_minutes: i32,
    pub warning_ratio: f64,
}

impl DwellPolicy {
    pub fn warning_after_minutes(&self) -> i64 {
        (self.max_dwell_minutes as f64 * self.warning_ratio).ceil() as i64
    }

    pub fn classify(&self, dwell_minutes: i64) -> DwellState {
        if dwell_minutes > self.max_dwell_minutes as i64 {
            DwellState::Exceeded
        } else if dwell_minutes >= self.warning_after_minutes() {
            DwellState::Warning
        } else {
            DwellState::Ok
        }
    }
}

/// Who is inside a room at `now`.
///
/// Events are replayed in time order, ties in insertion order: an entry puts
/// the employee inside, an exit takes them out. A second entry without an exit keeps the first entry
/// time. Events after `now` are ignored.
pub fn current_occupants(
    events: &[LogEvent],
    now: DateTime<Utc>,
    policy: DwellPolicy,
) -> Vec<Occupant> {
    let mut ordered: Vec<&LogEvent> = events.iter().filter(|e| e.occurred_at <= now).collect();
    ordered.sort_by_key(|e| (e.occurred_at, e.seq));

    let mut inside: HashMap<Uuid, (&str, DateTime<Utc>)> = HashMap::new();
    for event in ordered {
        match event.action {
            PersonnelAction::Entry => {
                inside
                    .entry(event.employee_id)
                    .or_insert((event.employee_name.as_str(), event.occurred_at));
            }
            PersonnelAction::Exit => {
                inside.remove(&event.employee_id);
            }
        }
    }

    let mut occupants: Vec<Occupant> = inside
        .into_iter()
        .map(|(employee_id, (name, entered_at))| {
            let dwell_minutes = (now - entered_at).num_minutes();
            Occupant {
                employee_id,
                employee_name: name.to_string(),
                entered_at,
                dwell_minutes,
                state: policy.classify(dwell_minutes),
            }
        })
        .collect();

    occupants.sort_by_key(|o| (o.entered_at, o.employee_id));
    occupants
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StatusBoardQuery {
    pub active: Option<bool>,
}

/// Room overview row used by the status board
#[derive(Debug, Clone, Serialize)]
pub struct ColdRoomStatus {
    pub id: Uuid,
    pub name: String,
    pub active: bool,
    pub min_temp_c: f64,
    pub max_temp_c: f64,
    pub latest_temperature_c: Option<f64>,
    pub latest_humidity_pct: Option<f64>,
    pub latest_recorded_at: Option<DateTime<Utc>>,
    pub out_of_range: bool,
    pub occupant_count: usize,
    pub exceeded_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};

    static SEQ: AtomicI64 = AtomicI64::new(1);

    fn event(id: Uuid, name: &str, action: PersonnelAction, at: DateTime<Utc>) -> LogEvent {
        LogEvent {
            seq: SEQ.fetch_add(1, Ordering::Relaxed),
            employee_id: id,
            employee_name: name.to_string(),
            action,
            occurred_at: at,
        }
    }

    fn policy() -> DwellPolicy {
        DwellPolicy {
            max_dwell_minutes: 30,
            warning_ratio: 0.8,
        }
    }

    #[test]
    fn entries_without_exit_are_inside() {
        let now = Utc::now();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let events = vec![
            event(a, "Achieng", PersonnelAction::Entry, now - Duration::minutes(40)),
            event(b, "Baraka", PersonnelAction::Entry, now - Duration::minutes(10)),
            event(b, "Baraka", PersonnelAction::Exit, now - Duration::minutes(5)),
        ];

        let occupants = current_occupants(&events, now, policy());
        assert_eq!(occupants.len(), 1);
        assert_eq!(occupants[0].employee_id, a);
        assert_eq!(occupants[0].dwell_minutes, 40);
        assert_eq!(occupants[0].state, DwellState::Exceeded);
    }

    #[test]
    fn unordered_input_is_replayed_chronologically() {
        let now = Utc::now();
        let a = Uuid::new_v4();
        let events = vec![
            event(a, "Achieng", PersonnelAction::Entry, now - Duration::minutes(5)),
            event(a, "Achieng", PersonnelAction::Exit, now - Duration::minutes(20)),
            event(a, "Achieng", PersonnelAction::Entry, now - Duration::minutes(50)),
        ];

        let occupants = current_occupants(&events, now, policy());
        assert_eq!(occupants.len(), 1);
        assert_eq!(occupants[0].dwell_minutes, 5);
        assert_eq!(occupants[0].state, DwellState::Ok);
    }

    #[test]
    fn repeated_entry_keeps_first_entry_time() {
        let now = Utc::now();
        let a = Uuid::new_v4();
        let events = vec![
            event(a, "Achieng", PersonnelAction::Entry, now - Duration::minutes(25)),
            event(a, "Achieng", PersonnelAction::Entry, now - Duration::minutes(3)),
        ];

        let occupants = current_occupants(&events, now, policy());
        assert_eq!(occupants[0].dwell_minutes, 25);
        assert_eq!(occupants[0].state, DwellState::Warning);
    }

    #[test]
    fn future_events_and_orphan_exits_are_ignored() {
        let now = Utc::now();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let events = vec![
            event(a, "Achieng", PersonnelAction::Exit, now - Duration::minutes(15)),
            event(b, "Baraka", PersonnelAction::Entry, now + Duration::minutes(1)),
        ];

        assert!(current_occupants(&events, now, policy()).is_empty());
    }

    #[test]
    fn same_instant_events_replay_in_insertion_order() {
        let now = Utc::now();
        let at = now - Duration::minutes(45);
        let a = Uuid::new_v4();

        let entry = event(a, "Achieng", PersonnelAction::Entry, at);
        let exit = event(a, "Achieng", PersonnelAction::Exit, at);

        // Storage order must not matter, only insertion order
        assert!(current_occupants(&[entry.clone(), exit.clone()], now, policy()).is_empty());
        assert!(current_occupants(&[exit.clone(), entry.clone()], now, policy()).is_empty());

        let reentry = event(a, "Achieng", PersonnelAction::Entry, at);
        let occupants = current_occupants(&[reentry, exit, entry], now, policy());
        assert_eq!(occupants.len(), 1);
        assert_eq!(occupants[0].state, DwellState::Exceeded);
    }

    #[test]
    fn personnel_events_alternate_between_entry_and_exit() {
        let now = Utc::now();
        let earlier = now - Duration::minutes(10);
        let entered = Some((PersonnelAction::Entry, earlier));
        let left = Some((PersonnelAction::Exit, earlier));

        assert_eq!(check_personnel_event(PersonnelAction::Entry, now, None, now), Ok(()));
        assert_eq!(
            check_personnel_event(PersonnelAction::Exit, now, None, now),
            Err(PersonnelLogError::NotInside)
        );
        assert_eq!(check_personnel_event(PersonnelAction::Entry, now, left, now), Ok(()));
        assert_eq!(
            check_personnel_event(PersonnelAction::Entry, now, entered, now),
            Err(PersonnelLogError::AlreadyInside)
        );
        assert_eq!(check_personnel_event(PersonnelAction::Exit, now, entered, now), Ok(()));
        assert_eq!(
            check_personnel_event(PersonnelAction::Exit, now, left, now),
            Err(PersonnelLogError::NotInside)
        );
    }

    #[test]
    fn personnel_event_times_never_go_backwards() {
        let now = Utc::now();
        let last_at = now - Duration::minutes(10);
        let entered = Some((PersonnelAction::Entry, last_at));

        assert_eq!(
            check_personnel_event(PersonnelAction::Exit, last_at, entered, now),
            Ok(())
        );
        assert_eq!(
            check_personnel_event(
                PersonnelAction::Exit,
                last_at - Duration::seconds(1),
                entered,
                now
            ),
            Err(PersonnelLogError::BeforeLastEvent { last_at })
        );
    }

    #[test]
    fn personnel_events_far_in_the_future_are_rejected() {
        let now = Utc::now();
        assert_eq!(
            check_personnel_event(PersonnelAction::Entry, now + Duration::minutes(1), None, now),
            Ok(())
        );
        assert_eq!(
            check_personnel_event(PersonnelAction::Entry, now + Duration::hours(3), None, now),
            Err(PersonnelLogError::InFuture)
        );
    }

    #[test]
    fn occupants_sorted_by_entry_time() {
        let now = Utc::now();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let events = vec![
            event(a, "Achieng", PersonnelAction::Entry, now - Duration::minutes(2)),
            event(b, "Baraka", PersonnelAction::Entry, now - Duration::minutes(12)),
        ];

        let occupants = current_occupants(&events, now, policy());
        assert_eq!(occupants[0].employee_id, b);
        assert_eq!(occupants[1].employee_id, a);
    }

    #[test]
    fn classification_boundaries() {
        let p = policy();
        assert_eq!(p.warning_after_minutes(), 24);
        assert_eq!(p.classify(23), DwellState::Ok);
        assert_eq!(p.classify(24), DwellState::Warning);
        assert_eq!(p.classify(30), DwellState::Warning);
        assert_eq!(p.classify(31), DwellState::Exceeded);
    }

    #[test]
    fn status_board_includes_inactive_rooms_unless_filtered() {
        use axum::{extract::Query, http::Uri};

        let uri: Uri = "/api/cold-rooms/status".parse().unwrap();
        let Query(query) = Query::<StatusBoardQuery>::try_from_uri(&uri).unwrap();
        assert_eq!(query.active, None);

        let uri: Uri = "/api/cold-rooms/status?active=true".parse().unwrap();
        let Query(query) = Query::<StatusBoardQuery>::try_from_uri(&uri).unwrap();
        assert_eq!(query.active, Some(true));
    }

    #[test]
    fn room_range_validation() {
        let req = CreateColdRoomRequest {
            name: "CR-1".to_string(),
            location: None,
            min_temp_c: 4.0,
            max_temp_c: 2.0,
            max_dwell_minutes: None,
        };
        assert!(req.validate().is_err());
    }
}
