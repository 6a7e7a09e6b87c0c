//! Downstream views over a saved result document

pub mod chart;
pub mod latex;
