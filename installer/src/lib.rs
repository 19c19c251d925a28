//! GenAI Installer Library
//!
//! Manifest-driven installation of ComfyUI, Automatic1111, their extensions
//! and model files into a shared data tree.

pub mod app;
pub mod apps;
pub mod dispatch;
pub mod errors;
pub mod exec;
pub mod fetch;
pub mod filesys;
pub mod http;
pub mod installers;
pub mod logs;
pub mod platform;
pub mod storage;
pub mod supervisor;
pub mod utils;
