mod common;
mod history_tests;
mod store_tests;
