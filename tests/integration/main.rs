//! Integration test target.

mod cycle;
mod fakes;
mod provider;
