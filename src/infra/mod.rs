pub mod db_external;
pub mod export;
pub mod settings;
pub mod utils;
pub mod workbook;
