//! Preloader CLI - export cluster images and snapshot their volume.

pub mod commands;
