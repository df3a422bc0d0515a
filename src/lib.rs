// src/lib.rs

pub mod auth;
pub mod cli;
pub mod config;
pub mod events;
pub mod mailer;
pub mod middleware;
pub mod models;
pub mod object_store;
pub mod permissions;
pub mod raddb;
pub mod web;
pub mod workspace_service;
