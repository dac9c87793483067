pub mod clean_notes_use_case;
pub mod dispatch_use_case;
pub mod export_use_case;
pub mod ports;
