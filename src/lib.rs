pub mod commands;
pub mod config;
pub mod hyprpanel;
pub mod notifier;
