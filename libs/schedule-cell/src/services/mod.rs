pub mod generator;
pub mod lifecycle;
pub mod schedules;
pub mod scope;

pub use generator::ScheduleGenerator;
pub use lifecycle::LifecycleManager;
pub use schedules::ScheduleService;
pub use scope::{ensure_patient_in_ward, ward_patients};
