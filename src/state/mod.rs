//! State module for tracking scrape job progress
//!
//! `JobState` models the lifecycle of one scrape job, from invocation through
//! pagination resolution and page fetching to the merged result.

mod job_state;

pub use job_state::JobState;
