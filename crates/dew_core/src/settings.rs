//! Parâmetros de execução via TOML (`settings.toml`).
//!
//! Separado do `config.json`: aqui ficam URL da API, intervalos e porta
//! serial, editados à mão; o JSON guarda só o estado do usuário.

use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Faixa aceita para `control.tick_interval_secs`.
pub const TICK_RANGE: RangeInclusive<f64> = 0.1..=600.0;
/// Faixa aceita para `weather.poll_interval_secs`.
pub const POLL_RANGE: RangeInclusive<f64> = 5.0..=3600.0;
/// Faixa aceita para `weather.timeout_secs`.
pub const TIMEOUT_RANGE: RangeInclusive<f64> = 1.0..=60.0;

/// `secs` como [`Duration`], ou `default` se NaN ou fora de `range`.
fn secs_or_default(secs: f64, range: RangeInclusive<f64>, default: f64) -> Duration {
    if range.contains(&secs) {
        Duration::from_secs_f64(secs)
    } else {
        Duration::from_secs_f64(default)
    }
}

/// Fonte de clima.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherSettings {
    /// Endpoint JSON com `observations[0]` (unidades métricas)
    pub url: String,
    /// Timeout total da requisição (segundos)
    pub timeout_secs: f64,
    /// Intervalo entre coletas (segundos)
    pub poll_interval_secs: f64,
    /// Idade máxima da leitura para o controle agir (0 = sem limite)
    pub max_reading_age_secs: u64,
}

impl Default for WeatherSettings {
    fn default() -> Self {
        Self {
            url: "https://api.weather.com/v2/pws/observations/current?stationId=ISYDNEY478&format=json&units=m&apiKey=CHANGE_ME".into(),
            timeout_secs: 10.0,
            poll_interval_secs: 60.0,
            max_reading_age_secs: 0,
        }
    }
}

/// Loop de controle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlSettings {
    /// Intervalo entre avaliações da histerese (segundos)
    pub tick_interval_secs: f64,
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self {
            tick_interval_secs: 5.0,
        }
    }
}

/// Porta serial do relé.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSettings {
    pub baud_rate: u32,
    pub write_timeout_ms: u64,
    /// Reconecta na última porta usada ao iniciar
    pub auto_connect: bool,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            write_timeout_ms: 1000,
            auto_connect: true,
        }
    }
}

/// Onde fica o `config.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Relativo ao diretório do executável, se não for absoluto
    pub config_path: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            config_path: "config.json".into(),
        }
    }
}

/// Configuração raiz de execução.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub weather: WeatherSettings,
    pub control: ControlSettings,
    pub serial: SerialSettings,
    pub storage: StorageSettings,
}

impl Settings {
    /// Carrega de um arquivo TOML; padrões se ausente ou inválido.
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(content) => match toml::from_str::<Settings>(&content) {
                    Ok(settings) => {
                        info!("Settings carregados de {}", path.display());
                        return settings;
                    }
                    Err(e) => {
                        warn!("Erro ao parsear {}: {}", path.display(), e);
                    }
                },
                Err(e) => {
                    warn!("Erro ao ler {}: {}", path.display(), e);
                }
            }
        }

        info!("Usando settings padrão");
        Settings::default()
    }

    /// Salva em arquivo TOML.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let content = toml::to_string_pretty(self).map_err(|e| e.to_string())?;
        std::fs::write(path, content).map_err(|e| e.to_string())?;
        info!("Settings salvos em {}", path.display());
        Ok(())
    }

    /// Diretório do executável (fallback: diretório atual).
    pub fn exe_dir() -> PathBuf {
        std::env::current_exe()
            .map(|p| p.parent().unwrap_or(Path::new(".")).to_path_buf())
            .unwrap_or_else(|_| PathBuf::from("."))
    }

    /// Caminho padrão do settings.toml.
    pub fn default_path() -> PathBuf {
        Self::exe_dir().join("settings.toml")
    }

    /// Caminho efetivo do config.json.
    pub fn config_path(&self) -> PathBuf {
        let p = PathBuf::from(&self.storage.config_path);
        if p.is_absolute() {
            p
        } else {
            Self::exe_dir().join(p)
        }
    }

    /// Intervalo do tick; fora de [`TICK_RANGE`] usa o padrão.
    pub fn tick_interval(&self) -> Duration {
        secs_or_default(
            self.control.tick_interval_secs,
            TICK_RANGE,
            ControlSettings::default().tick_interval_secs,
        )
    }

    /// Intervalo de coleta; fora de [`POLL_RANGE`] usa o padrão.
    pub fn poll_interval(&self) -> Duration {
        secs_or_default(
            self.weather.poll_interval_secs,
            POLL_RANGE,
            WeatherSettings::default().poll_interval_secs,
        )
    }

    /// Timeout da API; fora de [`TIMEOUT_RANGE`] usa o padrão.
    pub fn fetch_timeout(&self) -> Duration {
        secs_or_default(
            self.weather.timeout_secs,
            TIMEOUT_RANGE,
            WeatherSettings::default().timeout_secs,
        )
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.serial.write_timeout_ms)
    }

    pub fn max_reading_age(&self) -> Option<chrono::Duration> {
        match self.weather.max_reading_age_secs {
            0 => None,
            secs => i64::try_from(secs).ok().map(chrono::Duration::seconds),
        }
    }

    /// Valida os settings e retorna lista de erros.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.weather.url.trim().is_empty() {
            errors.push("URL da API de clima vazia".into());
        }
        if !TIMEOUT_RANGE.contains(&self.weather.timeout_secs) {
            errors.push(format!(
                "Timeout da API inválido: {} (1–60, usando padrão)",
                self.weather.timeout_secs
            ));
        }
        if !POLL_RANGE.contains(&self.weather.poll_interval_secs) {
            errors.push(format!(
                "Intervalo de coleta inválido: {} (5–3600, usando padrão)",
                self.weather.poll_interval_secs
            ));
        }
        if !TICK_RANGE.contains(&self.control.tick_interval_secs) {
            errors.push(format!(
                "Intervalo de controle inválido: {} (0.1–600, usando padrão)",
                self.control.tick_interval_secs
            ));
        }
        if self.serial.baud_rate == 0 {
            errors.push("Baud rate não pode ser 0".into());
        }

        errors
    }
}
