// This file declares the contents of the `adapters` module.
// Each adapter is the concrete implementation of one core port.

pub mod db;
pub mod local;
pub mod review_llm;
pub mod scripture;
