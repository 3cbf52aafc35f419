mod helpers;

mod convert_tests;
