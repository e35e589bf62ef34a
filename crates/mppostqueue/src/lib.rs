//! mppostqueue - Postfix queue plugin for the Mackerel agent

pub mod app;
pub mod cli;
