mod app_data;
mod backup_links;
mod startup;
mod storages;

// App data commands
pub use app_data::remove_data;

// Storage commands
pub use storages::{add_storage, list_storages, remove_storage};

// Backup link commands
pub use backup_links::{
    NewBackupLink, add_backup_link, list_backup_links, remove_backup_link, start_one,
};

// Startup commands
pub use startup::{run_daemon, show_startup_script, show_unstartup_script};
