//! Tests for the locks subsystem.

mod rwlock;
