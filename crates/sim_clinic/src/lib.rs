pub mod patient;
pub mod reception;
pub mod scenario;
pub mod topics;
