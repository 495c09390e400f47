//! Support code for the `sm_inspect` binary.

pub mod cloud_io;
