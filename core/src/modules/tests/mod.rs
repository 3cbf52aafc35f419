mod helpers;

mod cache_tests;
mod lifecycle_tests;
mod loader_tests;
