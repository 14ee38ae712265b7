pub mod run;
pub mod time;
