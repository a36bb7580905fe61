pub mod job_info;
pub mod job_metadata;
pub mod job_status;
