mod backend_tests;
mod memory_tests;
