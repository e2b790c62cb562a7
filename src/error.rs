use std::path::PathBuf;

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the application
///
/// Only `Enumeration`, `Manifest` and `Emission` abort a generation run. Locator and
/// source errors drop the affected route; resolution misses are not errors at all.
#[derive(Debug)]
pub enum Error {
    /// The route table could not be walked
    Enumeration(String),
    /// A route manifest could not be read or decoded
    Manifest { path: PathBuf, message: String },
    /// A handler symbol could not be mapped back to its source
    Locator { symbol: String, message: String },
    /// A referenced source file could not be opened or read
    SourceIo { path: PathBuf, source: std::io::Error },
    /// The document could not be serialized or written
    Emission(String),
    InvalidArgument(String),
    IoError(std::io::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::Enumeration(msg) => write!(f, "路由表遍历失败: {}", msg),
            Error::Manifest { path, message } => {
                write!(f, "路由清单错误 {}: {}", path.display(), message)
            }
            Error::Locator { symbol, message } => {
                write!(f, "无法定位处理函数 {}: {}", symbol, message)
            }
            Error::SourceIo { path, source } => {
                write!(f, "源文件读取错误 {}: {}", path.display(), source)
            }
            Error::Emission(msg) => write!(f, "文档输出错误: {}", msg),
            Error::InvalidArgument(msg) => write!(f, "无效参数: {}", msg),
            Error::IoError(e) => write!(f, "IO 错误: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(e) => Some(e),
            Error::SourceIo { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoError(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Emission(format!("JSON 序列化错误: {}", err))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Emission(format!("YAML 序列化错误: {}", err))
    }
}

impl Error {
    /// Whether this error must abort the whole generation step.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Enumeration(_) | Error::Manifest { .. } | Error::Emission(_)
        )
    }
}
