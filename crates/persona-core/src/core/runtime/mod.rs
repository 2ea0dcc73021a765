pub mod effects;
pub mod facade;
pub mod process;

pub use facade::{format_status_message, to_json_response, CommandGroup};
