pub mod refresh_worker;

pub use refresh_worker::run as run_refresh_worker;
pub use refresh_worker::run_once as run_refresh_once;
