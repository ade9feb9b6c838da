use crate::project_info::{metadata, version_info};
use clap::{Parser, Subcommand};

/// 存储管理相关命令
#[derive(Subcommand, Debug)]
pub enum StoragesCommand {
    /// 添加存储
    Add {
        /// 存储名称（唯一）
        #[arg(long)]
        name: String,
        /// 存储端点，例如 file:///mnt/backup
        #[arg(long)]
        endpoint: String,
    },
    /// 删除存储
    Remove {
        /// 存储名称
        #[arg(long)]
        name: String,
        /// 同时删除引用该存储的备份链接
        #[arg(long)]
        force: bool,
    },
}

/// 备份链接相关命令
#[derive(Subcommand, Debug)]
pub enum BackupLinksCommand {
    /// 添加备份链接
    Add {
        /// 目标存储名称
        #[arg(long)]
        storage: String,
        /// 目标 bucket
        #[arg(long)]
        bucket: String,
        /// 需要备份的本地目录
        #[arg(long)]
        path: String,
        /// 执行频率，例如 "1h"、"30m"、"1d"
        #[arg(long)]
        frequency: String,
        /// 备份链接名称（唯一）
        #[arg(long)]
        name: String,
        /// 对象键前缀
        #[arg(long)]
        prefix: Option<String>,
    },
    /// 删除备份链接
    Remove {
        /// 备份链接名称
        #[arg(long)]
        name: String,
    },
    /// 执行一次备份（由调度守护进程调用）
    #[command(hide = true)]
    StartOne {
        /// 备份链接ID
        #[arg(long)]
        id: String,
        /// 即使记录为 ACTIVE 也执行
        #[arg(long)]
        force: bool,
    },
}

/// 开机启动相关命令
#[derive(Subcommand, Debug)]
pub enum StartupCommand {
    /// 打印取消开机启动的命令
    Remove,
    /// 运行备份调度守护进程
    #[command(hide = true)]
    DoLogic,
}

/// CloudTenant CLI - 本地目录到对象存储的定时备份工具
#[derive(Parser)]
#[command(name = "ctc")]
#[command(about = metadata::PROJECT_DESCRIPTION)]
#[command(version = version_info::CLI_VERSION)]
#[command(long_about = metadata::display::DESCRIPTION_LONG)]
#[command(author = metadata::PROJECT_AUTHORS)]
pub struct Cli {
    /// 详细输出
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 首次使用时初始化数据目录和配置文件
    Init {
        /// 如果配置文件已存在，强制覆盖
        #[arg(long)]
        force: bool,
    },
    /// 停止正在运行的备份并删除全部应用数据
    RemoveData {
        /// 确认删除
        #[arg(long)]
        yes: bool,
    },
    /// 存储管理，不带子命令时列出全部存储
    Storages {
        /// 同时检查存储状态
        #[arg(long)]
        status: bool,
        #[command(subcommand)]
        command: Option<StoragesCommand>,
    },
    /// 备份链接管理，不带子命令时列出全部备份链接
    BackupLinks {
        /// 同时显示运行状态和下一次执行时间
        #[arg(long)]
        status: bool,
        #[command(subcommand)]
        command: Option<BackupLinksCommand>,
    },
    /// 开机启动，不带子命令时打印注册开机启动的命令
    Startup {
        #[command(subcommand)]
        command: Option<StartupCommand>,
    },
}

impl Commands {
    /// 是否为调度守护进程
    pub fn is_daemon(&self) -> bool {
        matches!(
            self,
            Commands::Startup {
                command: Some(StartupCommand::DoLogic)
            }
        )
    }
}
