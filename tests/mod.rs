mod retry_tests;
mod support;
