mod helpers;

mod contention_tests;
mod refresh_tests;
