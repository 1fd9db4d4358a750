pub mod utils;

mod integration_test;
