use crate::error::{CtcError, Result};
use crate::storage::{StorageEndpoint, StorageRecord};
use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::UNIX_EPOCH;
use tempfile::NamedTempFile;
use tracing::debug;
use walkdir::WalkDir;

/// 需要上传的单个文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadItem {
    pub local_path: PathBuf,
    /// 对象键，使用 `/` 分隔
    pub key: String,
    pub size: u64,
}

/// 对象上传边界
pub trait ObjectUploader {
    fn upload(&self, bucket: &str, item: &UploadItem) -> Result<()>;
}

/// 扫描本地目录，找出自 `since_ms` 之后修改过的文件；`since_ms` 为空时全部上传
pub fn build_upload_plan(
    local_dir: &Path,
    prefix: Option<&str>,
    since_ms: Option<i64>,
) -> Result<Vec<UploadItem>> {
    if !local_dir.is_dir() {
        return Err(CtcError::backup(format!(
            "本地目录不存在或不可访问: {}",
            local_dir.display()
        )));
    }

    let mut plan = Vec::new();

    for entry in WalkDir::new(local_dir).follow_links(false).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let metadata = entry.metadata()?;
        if let Some(since) = since_ms {
            let modified_ms = metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_millis() as i64);

            // 无法获取修改时间的文件总是上传
            if matches!(modified_ms, Some(ms) if ms <= since) {
                continue;
            }
        }

        let relative = entry.path().strip_prefix(local_dir)?;
        plan.push(UploadItem {
            local_path: entry.path().to_path_buf(),
            key: object_key(prefix, relative),
            size: metadata.len(),
        });
    }

    Ok(plan)
}

fn object_key(prefix: Option<&str>, relative: &Path) -> String {
    let relative_key = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/");

    match prefix.map(|p| p.trim_matches('/')).filter(|p| !p.is_empty()) {
        Some(prefix) => format!("{prefix}/{relative_key}"),
        None => relative_key,
    }
}

/// 把对象以文件形式写入本地目录：`<root>/<bucket>/<key>`
#[derive(Debug, Clone)]
pub struct FsObjectUploader {
    root: PathBuf,
}

impl FsObjectUploader {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

impl ObjectUploader for FsObjectUploader {
    fn upload(&self, bucket: &str, item: &UploadItem) -> Result<()> {
        let mut target = self.root.join(bucket);
        for part in item.key.split('/').filter(|p| !p.is_empty()) {
            target.push(part);
        }

        let parent = target
            .parent()
            .ok_or_else(|| CtcError::storage(format!("无效的对象路径: {}", item.key)))?;
        fs::create_dir_all(parent)?;

        let mut source = File::open(&item.local_path)?;
        let mut temp = NamedTempFile::new_in(parent)?;
        io::copy(&mut source, &mut temp)?;
        temp.persist(&target).map_err(|e| CtcError::Io(e.error))?;

        debug!(key = %item.key, bytes = item.size, "对象已写入");
        Ok(())
    }
}

/// 根据存储端点选择上传实现
pub fn uploader_for(storage: &StorageRecord) -> Result<Box<dyn ObjectUploader>> {
    match storage.endpoint() {
        StorageEndpoint::Local(root) => Ok(Box::new(FsObjectUploader::new(root))),
        StorageEndpoint::Remote(endpoint) => Err(CtcError::platform(format!(
            "不支持的存储端点: {endpoint}（仅支持 file:// 端点）"
        ))),
    }
}
