use crate::error::{CtcError, Result};
use serde_json::{Map, Value};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// 以 JSON 对象形式保存在单个文件中的键值存储
///
/// 每次读取都直接读文件，其他进程（工作进程、命令行）写入的内容立即可见。
/// 写入先落到同目录的临时文件再整体替换，读者不会看到写了一半的文件。
#[derive(Debug, Clone)]
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(CtcError::config("存储文件路径不能为空"));
        }

        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读取全部内容，文件不存在时返回空对象
    pub fn load(&self) -> Result<Map<String, Value>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };

        if content.trim().is_empty() {
            return Ok(Map::new());
        }

        match serde_json::from_str::<Value>(&content)? {
            Value::Object(map) => Ok(map),
            other => Err(CtcError::config(format!(
                "存储文件 {} 的顶层不是对象: {}",
                self.path.display(),
                other
            ))),
        }
    }

    pub fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.load()?.remove(key))
    }

    pub fn set(&self, key: &str, value: Value) -> Result<()> {
        self.update(|map| {
            map.insert(key.to_string(), value);
            Ok(())
        })
    }

    /// 删除键，返回被删除的值
    pub fn delete(&self, key: &str) -> Result<Option<Value>> {
        self.update(|map| Ok(map.remove(key)))
    }

    /// 读取-修改-写回
    pub fn update<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Map<String, Value>) -> Result<T>,
    {
        let mut map = self.load()?;
        let result = f(&mut map)?;
        self.write(&map)?;
        Ok(result)
    }

    fn write(&self, map: &Map<String, Value>) -> Result<()> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)?;

        let content = serde_json::to_string_pretty(map)?;
        let mut temp = NamedTempFile::new_in(&parent)?;
        temp.write_all(content.as_bytes())?;
        temp.flush()?;
        temp.persist(&self.path).map_err(|e| CtcError::Io(e.error))?;

        debug!(path = %self.path.display(), keys = map.len(), "存储文件已写入");
        Ok(())
    }
}
