//! SkipList integration tests

mod list_tests;
