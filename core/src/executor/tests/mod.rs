mod helpers;

mod closure_tests;
mod coroutine_tests;
