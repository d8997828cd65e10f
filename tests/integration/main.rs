// Integration test suite for the swipe engine.
//
// Organized into focused modules by feature area.
// Each module tests a specific API surface.
// All modules share the common::TestClient for DB lifecycle management.

mod common;
mod fixture_provider;

mod catalog;
mod rooms;
mod system;
mod votes;
