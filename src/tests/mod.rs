//! Integration tests for the perflock daemon.
//!
//! Each case starts an in-process daemon on a temporary socket with CPU
//! frequency control rooted at a fake sysfs tree.


pub mod support;
