use thiserror::Error;

pub type Result<T> = std::result::Result<T, CtcError>;

#[derive(Error, Debug)]
pub enum CtcError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("配置文件解析失败: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("配置文件序列化失败: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("配置文件未找到")]
    ConfigNotFound,

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("目录遍历错误: {0}")]
    WalkDir(#[from] walkdir::Error),

    #[error("路径错误: {0}")]
    StripPrefix(#[from] std::path::StripPrefixError),

    #[error("备份进程启动失败: {0}")]
    Launch(String),

    #[error("终止进程失败: {0}")]
    Terminate(String),

    #[error("当前平台不支持: {0}")]
    Platform(String),

    #[error("存储错误: {0}")]
    Storage(String),

    #[error("备份操作失败: {0}")]
    Backup(String),

    #[error("未找到: {0}")]
    NotFound(String),

    #[error("自定义错误: {0}")]
    Custom(String),
}

#[cfg(unix)]
impl From<nix::Error> for CtcError {
    fn from(err: nix::Error) -> Self {
        CtcError::Terminate(err.to_string())
    }
}

impl CtcError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn launch(msg: impl Into<String>) -> Self {
        Self::Launch(msg.into())
    }

    pub fn terminate(msg: impl Into<String>) -> Self {
        Self::Terminate(msg.into())
    }

    pub fn platform(msg: impl Into<String>) -> Self {
        Self::Platform(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn backup(msg: impl Into<String>) -> Self {
        Self::Backup(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }

    /// 配置类错误：出错的记录在本轮被跳过，下次通知时重试
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_) | Self::TomlDe(_) | Self::Serde(_))
    }
}
