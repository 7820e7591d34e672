//! End-to-end runs of the discovery pipeline against scripted capabilities.

pub mod fakes;

#[cfg(test)]
mod discovery;
