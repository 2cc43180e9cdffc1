// Library interface for feeddiff modules
// This allows tests and the binary to share the same code

pub mod app;
pub mod compare;
pub mod diagnose;
pub mod feed;
pub mod fetcher;
pub mod report;
