//! WAL integration tests


mod recovery_tests;
