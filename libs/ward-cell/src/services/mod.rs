pub mod administration;
pub mod reporting;

pub use administration::AdministrationRecorder;
pub use reporting::WardReports;
