pub mod collaborators;
pub mod model;
pub mod repository;
pub mod service;
