pub mod analysis;
pub mod api_client;
pub mod app_url;
pub mod commands;
pub mod compiler;
pub mod config;
pub mod context;
pub mod indicators;
pub mod models;
pub mod orchestrator;
pub mod param_utils;
pub mod presentation;
pub mod retry;
pub mod series;
pub mod service;
pub mod workflow;
