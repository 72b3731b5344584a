//! Clinic event topics and their catalog entries for the log dump.

use sim_kernel::event::TopicId;
use sim_kernel::event_log::TopicCatalog;

pub const PATIENT_ARRIVED: TopicId = TopicId::new("PATIENT_ARRIVED");
pub const PATIENT_AT_DESK: TopicId = TopicId::new("PATIENT_AT_DESK");
pub const PATIENT_SERVED: TopicId = TopicId::new("PATIENT_SERVED");

/// Catalog embedded in the dumped log document.
pub fn topic_catalog() -> TopicCatalog {
    TopicCatalog::default()
        .describe(PATIENT_ARRIVED, "Patient walked in and joined the queue")
        .describe(PATIENT_AT_DESK, "Patient reached a receptionist")
        .describe(PATIENT_SERVED, "Patient done being served by reception")
}
