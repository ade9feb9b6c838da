use crate::project_info::get_version_string;
use ctc_core::{config::AppConfig, constants::app, error::Result, store::JsonStore};
use std::path::Path;
use tracing::{info, warn};

/// 运行独立的初始化流程
pub fn run_init(force: bool) -> Result<()> {
    run_init_in(&app::get_data_dir(), force)
}

pub(crate) fn run_init_in(data_dir: &Path, force: bool) -> Result<()> {
    info!("☁️  {} 初始化", get_version_string());

    let config_path = data_dir.join(app::CONFIG_FILE_NAME);
    if !force && config_path.exists() {
        warn!("⚠️  检测到已存在的配置文件: {}", config_path.display());
        info!("如果您要重新初始化，请使用 --force 参数");
        info!("示例: ctc init --force");
        return Ok(());
    }

    std::fs::create_dir_all(data_dir)?;

    let mut config = AppConfig::default();
    config.logging.directory = data_dir
        .join(app::LOG_DIR_NAME)
        .to_string_lossy()
        .to_string();
    config.save_to_file(&config_path)?;
    std::fs::create_dir_all(config.get_log_dir())?;
    info!("   ✅ 创建配置文件: {}", config_path.display());

    // 已有的存储和备份链接保留
    for name in [app::BACKUP_LINKS_FILE_NAME, app::STORAGES_FILE_NAME] {
        let path = data_dir.join(name);
        if !path.exists() {
            JsonStore::new(&path)?.update(|_| Ok(()))?;
        }
    }
    info!("   ✅ 数据目录: {}", data_dir.display());

    info!("🎉 初始化完成！");
    info!("📝 接下来的步骤:");
    info!("   1️⃣  运行 'ctc storages add --name <名称> --endpoint <端点>' 添加存储");
    info!("   2️⃣  运行 'ctc backup-links add ...' 添加备份链接");
    info!("   3️⃣  运行 'ctc startup' 获取注册开机启动的命令");

    Ok(())
}
