pub mod health;
pub mod ingest;
pub mod programs;
pub mod recheck;
