pub mod ingest;
pub mod report;
pub mod status;
