//! Catalog site and admin panel for a used-car dealership.
//!
//! Listings, site copy, images and admin sessions live in a hosted backend
//! reached through the traits in [`backend`]. With no backend configured the
//! site serves a seeded in-memory inventory instead.

pub mod backend;
pub mod carousel;
pub mod catalog;
pub mod config;
pub mod contact;
pub mod dealership;
pub mod editor;
pub mod error;
pub mod forms;
pub mod gallery;
pub mod models;
pub mod server;
