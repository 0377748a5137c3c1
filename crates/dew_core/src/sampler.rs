//! Amostragem ambiental.
//!
//! A fonte de clima é consultada num intervalo próprio (mais lento que o
//! tick de controle). Cada amostra bem-sucedida substitui a anterior num
//! único slot compartilhado ([`ReadingSlot`]); falhas mantêm a última
//! leitura boa e são reportadas ao sink de eventos.
//!
//! Política de leitura antiga: por padrão o controle continua agindo sobre
//! a última leitura boa indefinidamente. Um limite opcional de idade pode
//! ser aplicado pelo loop de controle (ver [`is_stale`]).

use crate::events::EventSink;
use crate::types::Reading;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::sync::{Arc, PoisonError, RwLock};

/// Erros de coleta da fonte de clima.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Falha de rede: {0}")]
    Network(String),

    #[error("Resposta HTTP {0}")]
    Status(u16),

    #[error("JSON inválido: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Resposta sem observações")]
    NoObservation,

    #[error("Observação sem temperatura/ponto de orvalho nem umidade")]
    MissingFields,
}

/// Fonte de leituras ambientais.
pub trait WeatherSource {
    fn fetch(&self) -> Result<Reading, FetchError>;
}

// ──────────────────────────────────────────────
// Normalização do JSON
// ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ObservationsDoc {
    #[serde(default)]
    observations: Vec<Observation>,
}

#[derive(Debug, Deserialize)]
struct Observation {
    #[serde(default)]
    humidity: Option<f64>,
    #[serde(default)]
    metric: Option<MetricBlock>,
    // Algumas fontes trazem os valores métricos no próprio registro
    #[serde(default, alias = "temp")]
    temperature: Option<f64>,
    #[serde(default, alias = "dewpt")]
    dewpoint: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct MetricBlock {
    #[serde(default, alias = "temperature")]
    temp: Option<f64>,
    #[serde(default, alias = "dewpoint")]
    dewpt: Option<f64>,
}

/// Converte o documento de observações (unidades métricas) em [`Reading`].
///
/// Usa o primeiro registro de `observations`. Umidade fora de 0–100 é
/// descartada como ausente.
pub fn parse_observation(body: &str, sampled_at: DateTime<Utc>) -> Result<Reading, FetchError> {
    let doc: ObservationsDoc = serde_json::from_str(body)?;
    let obs = doc
        .observations
        .into_iter()
        .next()
        .ok_or(FetchError::NoObservation)?;

    let (metric_temp, metric_dew) = obs
        .metric
        .map(|m| (m.temp, m.dewpt))
        .unwrap_or((None, None));

    let reading = Reading {
        temperature_c: metric_temp.or(obs.temperature).filter(|v| v.is_finite()),
        dewpoint_c: metric_dew.or(obs.dewpoint).filter(|v| v.is_finite()),
        relative_humidity_pct: obs
            .humidity
            .filter(|v| v.is_finite() && (0.0..=100.0).contains(v)),
        sampled_at,
    };

    if reading.is_usable_for_any() {
        Ok(reading)
    } else {
        Err(FetchError::MissingFields)
    }
}

/// A leitura passou de `max_age` em relação a `now`?
pub fn is_stale(reading: &Reading, max_age: Option<Duration>, now: DateTime<Utc>) -> bool {
    match max_age {
        Some(age) => now - reading.sampled_at > age,
        None => false,
    }
}

/// Texto da linha de log de atualização de clima.
pub fn describe(reading: &Reading) -> String {
    fn fmt(v: Option<f64>, unit: &str) -> String {
        v.map(|v| format!("{v:.1}{unit}")).unwrap_or_else(|| "--".into())
    }
    format!(
        "Clima: Temp={}, Orvalho={}, DewSpread={}, RH={}",
        fmt(reading.temperature_c, "°C"),
        fmt(reading.dewpoint_c, "°C"),
        fmt(reading.dewspread_c(), "°C"),
        fmt(reading.relative_humidity_pct, "%"),
    )
}

// ──────────────────────────────────────────────
// Slot compartilhado (last-writer-wins)
// ──────────────────────────────────────────────

/// Slot com a leitura mais recente. Escritas substituem o valor inteiro;
/// leitores recebem uma cópia e nunca seguram o lock.
#[derive(Debug, Clone, Default)]
pub struct ReadingSlot {
    inner: Arc<RwLock<Option<Reading>>>,
}

impl ReadingSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, reading: Reading) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = Some(reading);
    }

    pub fn latest(&self) -> Option<Reading> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Executa uma coleta: publica no slot em caso de sucesso, reporta a falha
/// caso contrário. Nunca aciona o aquecedor.
pub fn poll_once<W, S>(source: &W, slot: &ReadingSlot, sink: &S) -> bool
where
    W: WeatherSource + ?Sized,
    S: EventSink,
{
    match source.fetch() {
        Ok(reading) => {
            sink.info(describe(&reading));
            slot.publish(reading);
            true
        }
        Err(e) => {
            let kept = if slot.latest().is_some() {
                "mantendo última leitura"
            } else {
                "sem leitura disponível"
            };
            sink.warn(format!("Falha ao buscar clima: {e} ({kept})"));
            false
        }
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
