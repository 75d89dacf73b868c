mod check_tests;
mod common;
mod state_tests;
