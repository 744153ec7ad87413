//! Remote-filesystem model: wire types, path handling, sorting, and the
//! service contracts the browsing core talks to.

pub mod node;
pub mod path;
pub mod service;
pub mod sort;
pub mod tags;
