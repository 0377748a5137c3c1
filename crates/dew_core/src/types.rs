//! Modelo de dados do controlador de orvalho.
//!
//! Leituras ambientais, limiares de disparo, modo de operação e o estado
//! do aquecedor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ──────────────────────────────────────────────
// Leitura ambiental
// ──────────────────────────────────────────────

/// Uma amostra normalizada da fonte de clima.
///
/// Qualquer campo pode estar ausente; o que é exigido depende da
/// estratégia de controle ([`ThresholdMode`]). O dew spread é sempre
/// derivado de `temperature_c` e `dewpoint_c`, nunca armazenado.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    /// Temperatura ambiente (°C)
    pub temperature_c: Option<f64>,
    /// Ponto de orvalho (°C)
    pub dewpoint_c: Option<f64>,
    /// Umidade relativa (0–100%)
    pub relative_humidity_pct: Option<f64>,
    /// Momento da amostragem
    pub sampled_at: DateTime<Utc>,
}

impl Reading {
    /// Temperatura menos ponto de orvalho, se ambos estiverem presentes.
    pub fn dewspread_c(&self) -> Option<f64> {
        match (self.temperature_c, self.dewpoint_c) {
            (Some(t), Some(d)) => Some(t - d),
            _ => None,
        }
    }

    /// Valor que a estratégia `mode` compara contra o limiar.
    pub fn value_for(&self, mode: ThresholdMode) -> Option<f64> {
        match mode {
            ThresholdMode::DewSpread => self.dewspread_c(),
            ThresholdMode::RelativeHumidity => self.relative_humidity_pct,
        }
    }

    /// A leitura serve para pelo menos uma das estratégias?
    pub fn is_usable_for_any(&self) -> bool {
        self.dewspread_c().is_some() || self.relative_humidity_pct.is_some()
    }
}

// ──────────────────────────────────────────────
// Limiar
// ──────────────────────────────────────────────

/// Estratégia de disparo do aquecedor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThresholdMode {
    /// Liga quando `temperatura - ponto de orvalho` cai até o gatilho.
    #[serde(rename = "DEWSPREAD")]
    DewSpread,
    /// Liga quando a umidade relativa atinge o gatilho.
    #[serde(rename = "RH")]
    RelativeHumidity,
}

impl ThresholdMode {
    pub fn unit(self) -> &'static str {
        match self {
            ThresholdMode::DewSpread => "°C",
            ThresholdMode::RelativeHumidity => "%",
        }
    }
}

impl fmt::Display for ThresholdMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ThresholdMode::DewSpread => "Dew Spread",
            ThresholdMode::RelativeHumidity => "RH",
        })
    }
}

/// Gatilho configurado pelo usuário.
///
/// `hysteresis_margin` só vale no modo DewSpread e só é somada no lado de
/// desligar; o modo RH não tem histerese.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub mode: ThresholdMode,
    pub trigger_value: f64,
    pub hysteresis_margin: f64,
}

/// Gatilho padrão de dew spread (°C).
pub const DEFAULT_DEWSPREAD_THRESHOLD: f64 = 3.0;
/// Gatilho padrão de umidade relativa (%).
pub const DEFAULT_RH_THRESHOLD: f64 = 80.0;
/// Margem padrão para desligar no modo DewSpread (°C).
pub const DEFAULT_HYSTERESIS: f64 = 1.0;

impl Threshold {
    pub fn dewspread(trigger_value: f64, hysteresis_margin: f64) -> Self {
        Self {
            mode: ThresholdMode::DewSpread,
            trigger_value,
            hysteresis_margin,
        }
    }

    pub fn relative_humidity(trigger_value: f64) -> Self {
        Self {
            mode: ThresholdMode::RelativeHumidity,
            trigger_value,
            hysteresis_margin: DEFAULT_HYSTERESIS,
        }
    }

    /// Gatilho padrão para a estratégia dada.
    pub fn default_for(mode: ThresholdMode) -> Self {
        match mode {
            ThresholdMode::DewSpread => {
                Self::dewspread(DEFAULT_DEWSPREAD_THRESHOLD, DEFAULT_HYSTERESIS)
            }
            ThresholdMode::RelativeHumidity => Self::relative_humidity(DEFAULT_RH_THRESHOLD),
        }
    }

    /// Retorna a lista de problemas (vazia = válido).
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if !self.trigger_value.is_finite() {
            errors.push(format!("Gatilho não numérico: {}", self.trigger_value));
        } else if self.mode == ThresholdMode::RelativeHumidity
            && !(0.0..=100.0).contains(&self.trigger_value)
        {
            errors.push(format!(
                "Gatilho de RH fora da faixa: {} (0–100)",
                self.trigger_value
            ));
        }
        if !self.hysteresis_margin.is_finite() || self.hysteresis_margin < 0.0 {
            errors.push(format!(
                "Histerese inválida: {} (deve ser >= 0)",
                self.hysteresis_margin
            ));
        }

        errors
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self::default_for(ThresholdMode::DewSpread)
    }
}

// ──────────────────────────────────────────────
// Modo de operação / estado do aquecedor
// ──────────────────────────────────────────────

/// Quem decide o estado do relé.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperatingMode {
    /// O loop de controle avalia a histerese a cada tick.
    #[default]
    #[serde(rename = "AUTO")]
    Auto,
    /// Só comandos explícitos do usuário acionam o relé.
    #[serde(rename = "MANUAL")]
    Manual,
}

impl OperatingMode {
    pub fn toggled(self) -> Self {
        match self {
            OperatingMode::Auto => OperatingMode::Manual,
            OperatingMode::Manual => OperatingMode::Auto,
        }
    }
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OperatingMode::Auto => "AUTO",
            OperatingMode::Manual => "MANUAL",
        })
    }
}

/// Último estado comandado com sucesso ao relé.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum HeaterState {
    #[default]
    Off,
    On,
}

impl HeaterState {
    pub fn is_on(self) -> bool {
        self == HeaterState::On
    }

    pub fn from_on(on: bool) -> Self {
        if on { HeaterState::On } else { HeaterState::Off }
    }
}

impl fmt::Display for HeaterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HeaterState::Off => "OFF",
            HeaterState::On => "ON",
        })
    }
}

/// Severidade de um evento de log entregue ao colaborador de apresentação.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
