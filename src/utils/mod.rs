pub mod badge_cache;
pub mod db_utils;
pub mod sheet_export;
