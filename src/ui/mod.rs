// UI and formatting module

pub mod formatters;

// Re-export commonly used items for cleaner imports
pub use formatters::{format_alert, format_reading, format_value, json_line, print_thresholds};
