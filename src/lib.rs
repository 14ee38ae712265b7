pub mod cli;
pub mod config;
pub mod output;
pub mod sequencer;
pub mod source;
pub mod storage;
