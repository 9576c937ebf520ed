//! Unit test target: compiler output shapes checked against a fixed
//! in-memory catalog, no I/O involved.

mod compile_shape_tests;
