mod animation;
mod cli;
mod config;
mod pipeline_flow;
mod stage_service;
mod trace_export;
