//! Job postings and applications.

pub mod handlers;
pub mod repository;
pub mod service;
