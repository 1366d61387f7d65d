pub mod api;
pub mod chat;
pub mod config;
pub mod domain;
pub mod jobs;
pub mod operations;
pub mod persistence;
pub mod registry;
pub mod repository;
pub mod shared;
pub mod storage;
pub mod ws;
