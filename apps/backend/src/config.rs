//! # Backend 設定
//!
//! YAML 設定ファイルと環境変数 `VERSION` から設定を読み込む。
//!
//! 起動時に一度だけ呼ばれるゲートであり、リトライはしない。
//! いずれかの検証に失敗した場合は [`ConfigError`] を返し、呼び出し側でプロセスを終了する。
//!
//! ## 設定ファイル例
//!
//! ```yaml
//! environment: production
//! log_config:
//!   level: info
//!   format: json
//!   add_source: false
//! ```
//!
//! `version` は設定ファイルからは読まない。イメージに同梱された古い値を防ぐため、
//! 必ず環境変数 `VERSION` で渡す。

use std::{
    env,
    fs::File,
    io::BufReader,
    path::{Component, Path, PathBuf},
};

use phasor_shared::observability::{ObservabilityError, TracingConfig};
use serde::Deserialize;
use thiserror::Error;

/// バージョンを渡す環境変数名
pub const VERSION_ENV: &str = "VERSION";

/// 設定読み込みのエラー
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 設定ファイルのパスが絶対パスでない
    #[error("config file path must be absolute: {0}")]
    PathNotAbsolute(String),

    /// 設定ファイルを開けない
    #[error("failed to open config file {}: {source}", .path.display())]
    Io {
        path:   PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML のデコードに失敗
    #[error("failed to decode config: {0}")]
    Decode(#[from] serde_yaml_ng::Error),

    /// 環境変数 `VERSION` が未設定または空
    #[error("VERSION environment variable is required")]
    VersionRequired,

    /// 設定ファイルに `environment` がない
    #[error("environment must be configured in the config file")]
    EnvironmentRequired,
}

/// Backend の設定
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    /// アプリケーションバージョン（環境変数 `VERSION` のみから設定）
    #[serde(skip)]
    pub version:     String,
    /// 実行環境名（production, development, local 等）
    #[serde(default)]
    pub environment: String,
    /// ログ設定
    #[serde(default)]
    pub log_config:  LogConfig,
}

/// ログ設定
///
/// 値の検証はロガー構築時（[`LogConfig::tracing_config`]）に行う。
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LogConfig {
    /// ログレベル（debug, info, warn, error）
    #[serde(default)]
    pub level:      String,
    /// ログ形式（json, text）
    #[serde(default)]
    pub format:     String,
    /// ソースファイル名と行番号を出力するか
    #[serde(default)]
    pub add_source: bool,
}

impl LogConfig {
    /// トレーシング初期化設定に変換する
    pub fn tracing_config(
        &self,
        service_name: impl Into<String>,
    ) -> Result<TracingConfig, ObservabilityError> {
        TracingConfig::parse(service_name, &self.level, &self.format, self.add_source)
    }
}

impl Config {
    /// 設定ファイルと環境変数 `VERSION` から設定を読み込む
    ///
    /// `path` は絶対パスでなければならない。
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::load_with_version_source(path, || env::var(VERSION_ENV).ok())
    }

    /// バージョンの取得元を指定して設定を読み込む
    ///
    /// `version_source` はファイルのデコードに成功した後に一度だけ呼ばれる。
    pub fn load_with_version_source(
        path: impl AsRef<Path>,
        version_source: impl FnOnce() -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let clean_path = clean(path);
        if !clean_path.is_absolute() {
            return Err(ConfigError::PathNotAbsolute(path.display().to_string()));
        }

        let mut config = decode_file(&clean_path)?;

        config.version = version_source().unwrap_or_default();
        if config.version.is_empty() {
            return Err(ConfigError::VersionRequired);
        }

        if config.environment.is_empty() {
            return Err(ConfigError::EnvironmentRequired);
        }

        Ok(config)
    }
}

/// ファイルを開いて YAML をデコードする
///
/// ファイルハンドルはこの関数のスコープで閉じられる。
/// ドキュメントを含まないファイル（空、コメントのみ）はデコードエラーとする。
fn decode_file(path: &Path) -> Result<Config, ConfigError> {
    let file = File::open(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let document: serde_yaml_ng::Value = serde_yaml_ng::from_reader(BufReader::new(file))?;
    if document.is_null() {
        return Err(ConfigError::Decode(serde::de::Error::custom(
            "config file contains no YAML document",
        )));
    }

    Ok(serde_yaml_ng::from_value(document)?)
}

/// パスを字句的に正規化する（`.` を除き、`..` を解決する）
///
/// ファイルシステムにはアクセスしない。ルートより上への `..` はルートに留まる。
fn clean(path: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match cleaned.components().next_back() {
                Some(Component::Normal(_)) => {
                    cleaned.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => cleaned.push(component),
            },
            other => cleaned.push(other),
        }
    }
    cleaned
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use tempfile::NamedTempFile;

    use super::*;

    const VALID_YAML: &str = r#"
environment: production
log_config:
  level: info
  format: json
  add_source: true
"#;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn version(v: &str) -> impl FnOnce() -> Option<String> {
        let v = v.to_string();
        move || Some(v)
    }

    #[test]
    fn test_正常な設定を読み込める() {
        let file = write_config(VALID_YAML);

        let config = Config::load_with_version_source(file.path(), version("1.2.3")).unwrap();

        assert_eq!(
            config,
            Config {
                version:     "1.2.3".to_string(),
                environment: "production".to_string(),
                log_config:  LogConfig {
                    level:      "info".to_string(),
                    format:     "json".to_string(),
                    add_source: true,
                },
            }
        );
    }

    #[test]
    fn test_同じ入力で二回読み込むと等しい設定になる() {
        let file = write_config(VALID_YAML);

        let first = Config::load_with_version_source(file.path(), version("1.2.3")).unwrap();
        let second = Config::load_with_version_source(file.path(), version("1.2.3")).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_設定ファイルのversionは無視され環境変数の値が使われる() {
        let file = write_config("version: \"9.9.9\"\nenvironment: staging\n");

        let config = Config::load_with_version_source(file.path(), version("1.2.3")).unwrap();

        assert_eq!(config.version, "1.2.3");
        assert_eq!(config.environment, "staging");
    }

    #[test]
    fn test_log_config省略時はデフォルト値になる() {
        let file = write_config("environment: local\n");

        let config = Config::load_with_version_source(file.path(), version("1.0.0")).unwrap();

        assert_eq!(config.log_config, LogConfig::default());
    }

    #[rstest]
    #[case("relative/path.yaml")]
    #[case("config.yaml")]
    #[case("./config/config.yaml")]
    fn test_相対パスはpath_not_absoluteエラーになる(#[case] path: &str) {
        let mut version_read = false;

        let result = Config::load_with_version_source(path, || {
            version_read = true;
            Some("1.0.0".to_string())
        });

        assert!(matches!(result, Err(ConfigError::PathNotAbsolute(p)) if p == path));
        assert!(!version_read, "バージョンの取得前に失敗すること");
    }

    #[test]
    fn test_loadは相対パスを環境変数に関係なく拒否する() {
        let result = Config::load("relative/path.yaml");

        assert!(matches!(result, Err(ConfigError::PathNotAbsolute(_))));
    }

    #[test]
    fn test_存在しないファイルはioエラーになる() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.yaml");

        let result = Config::load_with_version_source(&missing, version("1.0.0"));

        assert!(matches!(result, Err(ConfigError::Io { path, .. }) if path == missing));
    }

    #[test]
    fn test_不正なyamlはdecodeエラーになる() {
        let file = write_config("environment: [unclosed\n");

        let result = Config::load_with_version_source(file.path(), version("1.0.0"));

        assert!(matches!(result, Err(ConfigError::Decode(_))));
    }

    #[rstest]
    #[case("")]
    #[case("\n\n")]
    #[case("# environment: production\n")]
    fn test_ドキュメントのないファイルはdecodeエラーになる(#[case] content: &str) {
        let file = write_config(content);
        let mut version_read = false;

        let result = Config::load_with_version_source(file.path(), || {
            version_read = true;
            Some("1.0.0".to_string())
        });

        assert!(matches!(result, Err(ConfigError::Decode(_))));
        assert!(!version_read);
    }

    #[test]
    fn test_型が合わないyamlはdecodeエラーになる() {
        let file = write_config("environment: test\nlog_config:\n  add_source: maybe\n");

        let result = Config::load_with_version_source(file.path(), version("1.0.0"));

        assert!(matches!(result, Err(ConfigError::Decode(_))));
    }

    #[test]
    fn test_versionが空ならversion_requiredエラーになる() {
        let file = write_config(
            "{environment: \"production\", log_config: {level: \"info\", format: \"json\"}}",
        );

        let result = Config::load_with_version_source(file.path(), version(""));

        assert!(matches!(result, Err(ConfigError::VersionRequired)));
    }

    #[test]
    fn test_versionが未設定ならversion_requiredエラーになる() {
        let file = write_config(VALID_YAML);

        let result = Config::load_with_version_source(file.path(), || None);

        assert!(matches!(result, Err(ConfigError::VersionRequired)));
    }

    #[rstest]
    #[case("log_config:\n  level: info\n")]
    #[case("environment: \"\"\n")]
    fn test_environmentが空ならenvironment_requiredエラーになる(#[case] content: &str) {
        let file = write_config(content);

        let result = Config::load_with_version_source(file.path(), version("1.0.0"));

        assert!(matches!(result, Err(ConfigError::EnvironmentRequired)));
    }

    #[test]
    fn test_decode失敗時はバージョンを読まない() {
        let file = write_config("environment: [unclosed\n");
        let mut version_read = false;

        let result = Config::load_with_version_source(file.path(), || {
            version_read = true;
            Some("1.0.0".to_string())
        });

        assert!(result.is_err());
        assert!(!version_read);
    }

    #[rstest]
    #[case("/config/config.yaml", "/config/config.yaml")]
    #[case("/config/./config.yaml", "/config/config.yaml")]
    #[case("/config/../etc/config.yaml", "/etc/config.yaml")]
    #[case("/../config.yaml", "/config.yaml")]
    #[case("config/../../x.yaml", "../x.yaml")]
    fn test_cleanでパスを字句的に正規化する(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(clean(Path::new(input)), PathBuf::from(expected));
    }

    #[test]
    fn test_log_configからtracing_configに変換する() {
        let log_config = LogConfig {
            level:      "debug".to_string(),
            format:     "text".to_string(),
            add_source: false,
        };

        let tracing_config = log_config.tracing_config("backend").unwrap();

        assert_eq!(tracing_config.service_name, "backend");
        assert!(!tracing_config.add_source);
    }

    #[test]
    fn test_不正なログ形式はtracing_config変換でエラーになる() {
        let log_config = LogConfig {
            level:      "info".to_string(),
            format:     "xml".to_string(),
            add_source: false,
        };

        assert!(log_config.tracing_config("backend").is_err());
    }
}
