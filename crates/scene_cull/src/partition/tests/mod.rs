//! End-to-end tests for depth partitioning through the cull visitor
