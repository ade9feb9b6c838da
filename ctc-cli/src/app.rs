use ctc_core::{
    backup_link::{BackupLinkService, BackupLinkStore},
    config::AppConfig,
    constants::app,
    error::{CtcError, Result},
    storage::StorageService,
};
use std::path::{Path, PathBuf};

use crate::cli::{BackupLinksCommand, Commands, StartupCommand, StoragesCommand};
use crate::commands;
use tracing::info;

#[derive(Clone)]
pub struct CliApp {
    pub config: AppConfig,
    pub data_dir: PathBuf,
    pub storages: StorageService,
    pub backup_links: BackupLinkService,
}

impl CliApp {
    /// 从默认数据目录加载配置并初始化CLI应用
    pub fn new_with_auto_config() -> Result<Self> {
        let config = AppConfig::load()?;
        Self::from_parts(config, &app::get_data_dir())
    }

    pub fn from_parts(config: AppConfig, data_dir: &Path) -> Result<Self> {
        let storages = StorageService::open(data_dir.join(app::STORAGES_FILE_NAME))?;
        let links = BackupLinkStore::open(data_dir.join(app::BACKUP_LINKS_FILE_NAME))?;

        Ok(Self {
            config,
            data_dir: data_dir.to_path_buf(),
            backup_links: BackupLinkService::new(links, storages.clone()),
            storages,
        })
    }

    /// 运行应用命令
    pub async fn run_command(&mut self, command: Commands) -> Result<()> {
        match command {
            Commands::Init { .. } => unreachable!(), // 已经在 main.rs 中处理
            Commands::RemoveData { yes } => commands::remove_data(self, yes),
            Commands::Storages { status, command } => match command {
                None => commands::list_storages(self, status),
                Some(cmd) => self.run_storages_command(cmd),
            },
            Commands::BackupLinks { status, command } => match command {
                None => commands::list_backup_links(self, status),
                Some(cmd) => self.run_backup_links_command(cmd),
            },
            Commands::Startup { command } => self.run_startup_command(command).await,
        }
    }

    fn run_storages_command(&mut self, cmd: StoragesCommand) -> Result<()> {
        match cmd {
            StoragesCommand::Add { name, endpoint } => {
                info!("➕ 添加存储: {}", name);
                commands::add_storage(self, &name, &endpoint)
            }
            StoragesCommand::Remove { name, force } => {
                info!("🗑️  删除存储: {}", name);
                commands::remove_storage(self, &name, force)
            }
        }
    }

    fn run_backup_links_command(&mut self, cmd: BackupLinksCommand) -> Result<()> {
        match cmd {
            BackupLinksCommand::Add {
                storage,
                bucket,
                path,
                frequency,
                name,
                prefix,
            } => {
                info!("➕ 添加备份链接: {}", name);
                commands::add_backup_link(
                    self,
                    commands::NewBackupLink {
                        storage,
                        bucket,
                        path,
                        frequency,
                        name,
                        prefix,
                    },
                )
            }
            BackupLinksCommand::Remove { name } => {
                info!("🗑️  删除备份链接: {}", name);
                commands::remove_backup_link(self, &name)
            }
            BackupLinksCommand::StartOne { id, force } => commands::start_one(self, &id, force),
        }
    }

    async fn run_startup_command(&mut self, cmd: Option<StartupCommand>) -> Result<()> {
        match cmd {
            None => commands::show_startup_script(self),
            Some(StartupCommand::Remove) => commands::show_unstartup_script(self),
            Some(StartupCommand::DoLogic) => commands::run_daemon(self)
                .await
                .map_err(|e| CtcError::custom(format!("调度守护进程异常退出: {e:#}"))),
        }
    }
}
