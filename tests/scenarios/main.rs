//! Scenario-based tests for seqflow

mod helpers;

mod command_stages;
mod end_to_end;
mod failure_handling;
