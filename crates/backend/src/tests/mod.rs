mod helpers;

mod config_tests;
mod import_tests;
mod read_tests;
