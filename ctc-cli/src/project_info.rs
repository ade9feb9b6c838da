/// CloudTenant CLI 项目信息模块
///
/// ctc-cli 是面向用户的主程序，项目元数据统一在这里定义

/// 项目元数据（自动从 ctc-cli 的 Cargo.toml 同步）
pub mod metadata {
    /// 项目名称
    pub const PROJECT_NAME: &str = env!("CARGO_PKG_NAME");

    /// 项目描述
    pub const PROJECT_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

    /// 项目作者
    pub const PROJECT_AUTHORS: &str = env!("CARGO_PKG_AUTHORS");

    /// 项目许可证
    pub const PROJECT_LICENSE: &str = env!("CARGO_PKG_LICENSE");

    /// 用户友好的显示名称（手动维护，用于 UI 显示）
    pub mod display {
        /// 用户友好的项目名称
        pub const FRIENDLY_NAME: &str = "CloudTenant CLI";

        /// 项目详细描述
        pub const DESCRIPTION_LONG: &str = "把本地目录按固定频率备份到对象存储。调度守护进程在登录时启动，\
            为每个备份链接排期，到期后启动独立的备份进程，并在备份链接被删除时终止对应进程";
    }
}

/// 版本信息
pub mod version_info {
    /// CLI 版本
    pub const CLI_VERSION: &str = env!("CARGO_PKG_VERSION");
}

/// 获取版本信息字符串
pub fn get_version_string() -> String {
    format!(
        "{} v{}",
        metadata::display::FRIENDLY_NAME,
        version_info::CLI_VERSION
    )
}
