mod frequency;
mod mirror;
pub(crate) mod model;
mod service;
mod store;

pub use frequency::{compute_wait_time, parse_frequency};
pub use mirror::{FsObjectUploader, ObjectUploader, UploadItem, build_upload_plan, uploader_for};
pub use model::{AddBackupLinkParams, BackupLinkRecord, BackupLinkStatus, Snapshot};
pub use service::{BackupLinkService, BackupSummary};
pub use store::BackupLinkStore;
