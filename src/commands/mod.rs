pub mod refresh;
pub mod serve;
pub mod status;
