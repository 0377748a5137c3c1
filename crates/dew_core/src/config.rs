//! Configuração persistida do usuário (`config.json`).
//!
//! Formato compatível com os arquivos da versão anterior
//! (`mode` / `dewspread_threshold` / `com_port`), unificado pela tag
//! `threshold_mode`:
//!
//! ```json
//! { "mode": "AUTO", "threshold_mode": "DEWSPREAD",
//!   "dewspread_threshold": 3.0, "hysteresis": 1.0, "com_port": "COM3" }
//! ```
//!
//! Só a chave de limiar da estratégia ativa é escrita. A escrita é atômica:
//! arquivo temporário no mesmo diretório, fsync e rename.

use crate::types::{
    DEFAULT_DEWSPREAD_THRESHOLD, DEFAULT_HYSTERESIS, DEFAULT_RH_THRESHOLD, OperatingMode,
    Threshold, ThresholdMode,
};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Estado do usuário que sobrevive a reinícios.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub operating_mode: OperatingMode,
    pub threshold: Threshold,
    /// Identificador da última porta serial usada (ex: "COM3", "/dev/ttyUSB0").
    /// Gravado sem espaços nas pontas; vazio é gravado como `null`.
    pub transport_identifier: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            operating_mode: OperatingMode::Auto,
            threshold: Threshold::default(),
            transport_identifier: None,
        }
    }
}

/// Motivo pelo qual os padrões foram usados no carregamento.
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("{} não existe", .0.display())]
    Missing(PathBuf),

    #[error("Erro ao ler {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("Erro ao parsear {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Valores inválidos em {}: {}", .path.display(), .problems.join("; "))]
    Invalid { path: PathBuf, problems: Vec<String> },
}

/// Falha ao gravar a configuração. A cópia em memória continua valendo.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("Erro de serialização: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Erro de escrita em {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },
}

// ──────────────────────────────────────────────
// Formato em disco
// ──────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    mode: OperatingMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    threshold_mode: Option<ThresholdMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dewspread_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rh_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    hysteresis: Option<f64>,
    #[serde(default)]
    com_port: Option<String>,
}

impl From<&Config> for ConfigFile {
    fn from(config: &Config) -> Self {
        let t = &config.threshold;
        let (dewspread_threshold, rh_threshold) = match t.mode {
            ThresholdMode::DewSpread => (Some(t.trigger_value), None),
            ThresholdMode::RelativeHumidity => (None, Some(t.trigger_value)),
        };
        Self {
            mode: config.operating_mode,
            threshold_mode: Some(t.mode),
            dewspread_threshold,
            rh_threshold,
            hysteresis: Some(t.hysteresis_margin),
            com_port: normalize_port(config.transport_identifier.as_deref()),
        }
    }
}

/// Porta sem espaços nas pontas; vazia vira `None`.
pub fn normalize_port(port: Option<&str>) -> Option<String> {
    port.map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
}

impl ConfigFile {
    fn into_config(self) -> Config {
        // Arquivos antigos não têm a tag: deduz pela chave presente
        let mode = self.threshold_mode.unwrap_or(
            if self.rh_threshold.is_some() && self.dewspread_threshold.is_none() {
                ThresholdMode::RelativeHumidity
            } else {
                ThresholdMode::DewSpread
            },
        );
        let trigger_value = match mode {
            ThresholdMode::DewSpread => self.dewspread_threshold.unwrap_or(DEFAULT_DEWSPREAD_THRESHOLD),
            ThresholdMode::RelativeHumidity => self.rh_threshold.unwrap_or(DEFAULT_RH_THRESHOLD),
        };

        Config {
            operating_mode: self.mode,
            threshold: Threshold {
                mode,
                trigger_value,
                hysteresis_margin: self.hysteresis.unwrap_or(DEFAULT_HYSTERESIS),
            },
            transport_identifier: normalize_port(self.com_port.as_deref()),
        }
    }
}

impl Config {
    /// Serializa para o JSON persistido.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&ConfigFile::from(self))
    }

    /// Interpreta o JSON persistido, completando chaves ausentes.
    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<ConfigFile>(content).map(ConfigFile::into_config)
    }

    /// Tenta carregar de `path`, sem substituir por padrões.
    pub fn try_load(path: &Path) -> Result<Self, ConfigLoadError> {
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ConfigLoadError::Missing(path.to_path_buf()));
            }
            Err(source) => {
                return Err(ConfigLoadError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let config = Self::from_json(&content).map_err(|source| ConfigLoadError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        let problems = config.threshold.validate();
        if !problems.is_empty() {
            return Err(ConfigLoadError::Invalid {
                path: path.to_path_buf(),
                problems,
            });
        }
        Ok(config)
    }

    /// Carrega de `path`. Nunca falha: arquivo ausente ou corrompido vira
    /// [`Config::default`], e o motivo volta para quem chamou registrar.
    pub fn load(path: &Path) -> (Self, Option<ConfigLoadError>) {
        match Self::try_load(path) {
            Ok(config) => (config, None),
            Err(e) => (Config::default(), Some(e)),
        }
    }

    /// Grava a configuração completa de forma atômica.
    pub fn save(&self, path: &Path) -> Result<(), PersistError> {
        let content = self.to_json()?;
        write_atomic(path, content.as_bytes()).map_err(|source| PersistError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Escreve num temporário ao lado de `path` e renomeia por cima.
fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "config.json".into());
    let tmp_path = path.with_file_name(format!(".{file_name}.{}.tmp", std::process::id()));

    let result = (|| {
        let mut file = File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        drop(file); // Fecha antes do rename (Windows)
        fs::rename(&tmp_path, path)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn temp_path(tag: &str) -> PathBuf {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        let n = COUNTER.fetch_add(1, Ordering::SeqCst);
        std::env::temp_dir().join(format!(
            "dew_core_{tag}_{}_{n}.json",
            std::process::id()
        ))
    }

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(config.threshold.validate().is_empty());
        assert_eq!(config.operating_mode, OperatingMode::Auto);
    }

    #[test]
    fn save_and_load_roundtrip() {
        let path = temp_path("roundtrip");
        let config = Config {
            operating_mode: OperatingMode::Manual,
            threshold: Threshold::dewspread(2.5, 0.5),
            transport_identifier: Some("/dev/ttyUSB0".into()),
        };
        config.save(&path).unwrap();
        let (loaded, issue) = Config::load(&path);
        assert!(issue.is_none());
        assert_eq!(loaded, config);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let path = temp_path("missing");
        let (config, issue) = Config::load(&path);
        assert_eq!(config, Config::default());
        assert!(matches!(issue, Some(ConfigLoadError::Missing(_))));
    }

    #[test]
    fn corrupted_file_yields_defaults() {
        let path = temp_path("corrupt");
        fs::write(&path, "{ \"mode\": \"AUTO\", ").unwrap();
        let (config, issue) = Config::load(&path);
        assert_eq!(config, Config::default());
        assert!(matches!(issue, Some(ConfigLoadError::Parse { .. })));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn invalid_values_yield_defaults() {
        let path = temp_path("invalid");
        fs::write(&path, r#"{"mode":"AUTO","dewspread_threshold":3.0,"hysteresis":-2.0}"#)
            .unwrap();
        let (config, issue) = Config::load(&path);
        assert_eq!(config, Config::default());
        assert!(matches!(issue, Some(ConfigLoadError::Invalid { .. })));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn legacy_file_is_understood() {
        let legacy = r#"{"mode": "MANUAL", "dewspread_threshold": 4.5, "com_port": ""}"#;
        let config = Config::from_json(legacy).unwrap();
        assert_eq!(config.operating_mode, OperatingMode::Manual);
        assert_eq!(config.threshold, Threshold::dewspread(4.5, DEFAULT_HYSTERESIS));
        assert_eq!(config.transport_identifier, None);
    }

    #[test]
    fn rh_key_selects_rh_mode() {
        let config = Config::from_json(r#"{"rh_threshold": 85}"#).unwrap();
        assert_eq!(config.threshold.mode, ThresholdMode::RelativeHumidity);
        assert_eq!(config.threshold.trigger_value, 85.0);
    }

    #[test]
    fn only_active_threshold_key_is_written() {
        let config = Config {
            threshold: Threshold::relative_humidity(75.0),
            ..Config::default()
        };
        let json = config.to_json().unwrap();
        assert!(json.contains("\"rh_threshold\""));
        assert!(!json.contains("dewspread_threshold"));
        assert!(json.contains("\"threshold_mode\": \"RH\""));
    }

    #[test]
    fn save_leaves_no_temp_files() {
        let path = temp_path("tmpfiles");
        Config::default().save(&path).unwrap();
        Config::default().save(&path).unwrap();
        let dir = path.parent().unwrap();
        let stem = path.file_name().unwrap().to_string_lossy().into_owned();
        let leftovers = fs::read_dir(dir)
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| {
                let name = e.file_name().to_string_lossy().into_owned();
                name.starts_with(&format!(".{stem}")) && name.ends_with(".tmp")
            })
            .count();
        assert_eq!(leftovers, 0);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn floats_survive_repeated_save_cycles() {
        let config = Config {
            threshold: Threshold::dewspread(3.0, 1.0812319939944959),
            ..Config::default()
        };
        let first = config.to_json().unwrap();
        let second = Config::from_json(&first).unwrap().to_json().unwrap();
        assert_eq!(second, first);
        assert!(first.contains("1.0812319939944959"));
    }

    #[test]
    fn port_identifier_is_normalized_on_save() {
        let padded = Config {
            transport_identifier: Some("  COM3 ".into()),
            ..Config::default()
        };
        let json = padded.to_json().unwrap();
        assert!(json.contains("\"com_port\": \"COM3\""));
        assert_eq!(Config::from_json(&json).unwrap().to_json().unwrap(), json);

        let blank = Config {
            transport_identifier: Some("   ".into()),
            ..Config::default()
        };
        let json = blank.to_json().unwrap();
        assert!(json.contains("\"com_port\": null"));
        assert_eq!(Config::from_json(&json).unwrap().transport_identifier, None);
    }

    fn arb_config() -> impl Strategy<Value = Config> {
        (
            prop_oneof![Just(OperatingMode::Auto), Just(OperatingMode::Manual)],
            prop_oneof![
                (-10.0f64..20.0, 0.0f64..5.0).prop_map(|(t, m)| Threshold::dewspread(t, m)),
                (0.0f64..100.0, 0.0f64..5.0).prop_map(|(t, m)| Threshold {
                    mode: ThresholdMode::RelativeHumidity,
                    trigger_value: t,
                    hysteresis_margin: m,
                }),
            ],
            proptest::option::of("[A-Za-z0-9/_]{1,16}"),
        )
            .prop_map(|(operating_mode, threshold, transport_identifier)| Config {
                operating_mode,
                threshold,
                transport_identifier,
            })
    }

    proptest! {
        #[test]
        fn serialization_is_idempotent(config in arb_config()) {
            let first = config.to_json().unwrap();
            let reloaded = Config::from_json(&first).unwrap();
            prop_assert_eq!(reloaded.to_json().unwrap(), first);
            prop_assert_eq!(reloaded, config);
        }
    }
}
