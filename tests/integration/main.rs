//! Workspace-level scenario tests for the conversion pipeline.

mod helpers;

mod cache_test;
mod cancel_test;
mod lifecycle_test;
mod progress_test;
mod retention_test;
mod retry_test;
