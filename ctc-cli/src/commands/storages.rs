use crate::app::CliApp;
use ctc_core::error::{CtcError, Result};
use tracing::{info, instrument, warn};

/// 列出全部存储，`status` 为真时同时检查端点状态
#[instrument(skip(app))]
pub fn list_storages(app: &CliApp, status: bool) -> Result<()> {
    let storages = app.storages.list()?;
    if storages.is_empty() {
        info!("暂无存储，使用 'ctc storages add' 添加");
        return Ok(());
    }

    info!("📦 存储列表 ({} 个):", storages.len());
    for storage in &storages {
        if !status {
            info!("   - {}", storage.name);
            continue;
        }

        let state = app.storages.check_status(storage);
        let label = match (state.endpoint_supported, state.is_online) {
            (false, _) => "⚠️  端点不受支持",
            (true, true) => "✅ 在线",
            (true, false) => "❌ 不可访问",
        };
        info!("   - {} [{}] {}", state.storage_name, storage.endpoint, label);
    }
    Ok(())
}

pub fn add_storage(app: &CliApp, name: &str, endpoint: &str) -> Result<()> {
    let storage = app.storages.add(name, endpoint)?;

    let state = app.storages.check_status(&storage);
    if !state.endpoint_supported {
        warn!("⚠️  当前版本只能向 file:// 端点传输数据");
    } else if !state.is_online {
        warn!("⚠️  存储端点当前不可访问: {}", storage.endpoint);
    }

    info!("✅ 存储已添加: {}", storage.name);
    Ok(())
}

/// 删除存储；仍被备份链接引用时需要 `force`，并一同删除这些备份链接
pub fn remove_storage(app: &CliApp, name: &str, force: bool) -> Result<()> {
    let id = app.storages.name_to_id(name)?;

    let linked: Vec<_> = app
        .backup_links
        .list()?
        .into_iter()
        .filter(|l| l.storage_id == id)
        .collect();

    if !linked.is_empty() {
        if !force {
            return Err(CtcError::config(format!(
                "存储 '{}' 仍被 {} 个备份链接引用，使用 --force 一并删除",
                name,
                linked.len()
            )));
        }
        for link in app.backup_links.remove_by_storage(&id)? {
            info!("   🗑️  已删除备份链接: {}", link.link_name);
        }
    }

    app.storages.remove(&id)?;
    info!("✅ 存储已删除: {}", name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctc_core::backup_link::AddBackupLinkParams;
    use ctc_core::config::AppConfig;
    use tempfile::tempdir;

    #[test]
    fn test_remove_storage_with_links_requires_force() {
        let temp_dir = tempdir().unwrap();
        let app = CliApp::from_parts(AppConfig::default(), temp_dir.path()).unwrap();

        add_storage(
            &app,
            "local",
            &format!("file://{}", temp_dir.path().display()),
        )
        .unwrap();
        app.backup_links
            .add(AddBackupLinkParams {
                storage_id: app.storages.name_to_id("local").unwrap(),
                bucket: "bucket".to_string(),
                local_dir_path: temp_dir.path().to_string_lossy().to_string(),
                job_frequence_ms: "1d".to_string(),
                link_name: "docs".to_string(),
                prefix: None,
            })
            .unwrap();

        assert!(remove_storage(&app, "local", false).unwrap_err().is_config());
        assert_eq!(app.backup_links.list().unwrap().len(), 1);

        remove_storage(&app, "local", true).unwrap();
        assert!(app.backup_links.list().unwrap().is_empty());
        assert!(app.storages.list().unwrap().is_empty());
    }
}
