//! Store do limiar e do modo de operação.
//!
//! Substitui a leitura direta do campo de texto a cada tick: a entrada do
//! usuário passa por um setter validado. Uma entrada rejeitada fica
//! registrada e faz os ticks seguintes pularem com erro, até ser corrigida;
//! o loop nunca volta em silêncio para o último valor numérico.

use crate::config::{Config, PersistError, normalize_port};
use crate::control::ControlInputs;
use crate::types::{OperatingMode, Threshold, ThresholdMode};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

/// Entrada de limiar recusada.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ThresholdError {
    #[error("Limiar não numérico: {0:?}")]
    NotNumeric(String),

    #[error("Limiar inválido: {}", .0.join("; "))]
    OutOfRange(Vec<String>),
}

#[derive(Debug)]
struct StoreState {
    config: Config,
    rejected_input: Option<ThresholdError>,
}

/// Configuração em memória compartilhada entre a apresentação e o loop.
///
/// Leitores recebem cópias; `save` grava a partir de um snapshot e nunca
/// segura o lock durante o I/O.
#[derive(Debug, Clone)]
pub struct ThresholdStore {
    inner: Arc<RwLock<StoreState>>,
}

impl ThresholdStore {
    pub fn new(config: Config) -> Self {
        Self {
            inner: Arc::new(RwLock::new(StoreState {
                config,
                rejected_input: None,
            })),
        }
    }

    fn read<R>(&self, f: impl FnOnce(&StoreState) -> R) -> R {
        f(&self.inner.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn write<R>(&self, f: impl FnOnce(&mut StoreState) -> R) -> R {
        f(&mut self.inner.write().unwrap_or_else(PoisonError::into_inner))
    }

    /// Cópia da configuração atual.
    pub fn snapshot(&self) -> Config {
        self.read(|s| s.config.clone())
    }

    pub fn operating_mode(&self) -> OperatingMode {
        self.read(|s| s.config.operating_mode)
    }

    pub fn set_operating_mode(&self, mode: OperatingMode) {
        self.write(|s| s.config.operating_mode = mode);
    }

    /// Alterna AUTO ↔ MANUAL e retorna o novo modo.
    pub fn toggle_operating_mode(&self) -> OperatingMode {
        self.write(|s| {
            s.config.operating_mode = s.config.operating_mode.toggled();
            s.config.operating_mode
        })
    }

    /// Limiar vigente, ou o erro da última entrada recusada.
    pub fn current_threshold(&self) -> Result<Threshold, ThresholdError> {
        self.read(|s| match &s.rejected_input {
            Some(e) => Err(e.clone()),
            None => Ok(s.config.threshold),
        })
    }

    /// Interpreta o texto digitado pelo usuário como novo gatilho.
    pub fn set_trigger_input(&self, raw: &str) -> Result<Threshold, ThresholdError> {
        let parsed = raw
            .trim()
            .replace(',', ".")
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite());

        self.write(|s| {
            let Some(value) = parsed else {
                let err = ThresholdError::NotNumeric(raw.to_string());
                s.rejected_input = Some(err.clone());
                return Err(err);
            };

            let candidate = Threshold {
                trigger_value: value,
                ..s.config.threshold
            };
            let problems = candidate.validate();
            if !problems.is_empty() {
                let err = ThresholdError::OutOfRange(problems);
                s.rejected_input = Some(err.clone());
                return Err(err);
            }

            s.config.threshold = candidate;
            s.rejected_input = None;
            Ok(candidate)
        })
    }

    /// Altera a margem de histerese. Entrada inválida não altera nada.
    pub fn set_hysteresis(&self, margin: f64) -> Result<Threshold, ThresholdError> {
        self.write(|s| {
            let candidate = Threshold {
                hysteresis_margin: margin,
                ..s.config.threshold
            };
            let problems = candidate.validate();
            if !problems.is_empty() {
                return Err(ThresholdError::OutOfRange(problems));
            }
            s.config.threshold = candidate;
            Ok(candidate)
        })
    }

    /// Troca a estratégia; o gatilho volta ao padrão da nova estratégia.
    pub fn set_threshold_mode(&self, mode: ThresholdMode) -> Threshold {
        self.write(|s| {
            if s.config.threshold.mode != mode {
                let margin = s.config.threshold.hysteresis_margin;
                s.config.threshold = Threshold {
                    hysteresis_margin: margin,
                    ..Threshold::default_for(mode)
                };
                s.rejected_input = None;
            }
            s.config.threshold
        })
    }

    pub fn transport_identifier(&self) -> Option<String> {
        self.read(|s| s.config.transport_identifier.clone())
    }

    pub fn set_transport_identifier(&self, id: Option<String>) {
        let id = normalize_port(id.as_deref());
        self.write(|s| s.config.transport_identifier = id);
    }

    /// Persiste um snapshot da configuração.
    pub fn save(&self, path: &Path) -> Result<(), PersistError> {
        let snapshot = self.snapshot();
        snapshot.save(path)
    }
}

impl ControlInputs for ThresholdStore {
    fn get_current_threshold(&self) -> Result<Threshold, ThresholdError> {
        self.current_threshold()
    }

    fn get_operating_mode(&self) -> OperatingMode {
        self.operating_mode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_input_updates_threshold() {
        let store = ThresholdStore::new(Config::default());
        let t = store.set_trigger_input(" 2,5 ").unwrap();
        assert_eq!(t.trigger_value, 2.5);
        assert_eq!(store.current_threshold().unwrap().trigger_value, 2.5);
        assert_eq!(store.snapshot().threshold.trigger_value, 2.5);
    }

    #[test]
    fn non_numeric_input_blocks_until_fixed() {
        let store = ThresholdStore::new(Config::default());
        assert_eq!(
            store.set_trigger_input("abc"),
            Err(ThresholdError::NotNumeric("abc".into()))
        );
        assert!(store.current_threshold().is_err());
        // O último valor válido continua no config para persistência
        assert_eq!(store.snapshot().threshold.trigger_value, 3.0);

        store.set_trigger_input("4").unwrap();
        assert_eq!(store.current_threshold().unwrap().trigger_value, 4.0);
    }

    #[test]
    fn out_of_range_rh_is_rejected() {
        let store = ThresholdStore::new(Config::default());
        store.set_threshold_mode(ThresholdMode::RelativeHumidity);
        assert!(matches!(
            store.set_trigger_input("150"),
            Err(ThresholdError::OutOfRange(_))
        ));
        assert!(store.current_threshold().is_err());
    }

    #[test]
    fn negative_hysteresis_is_rejected() {
        let store = ThresholdStore::new(Config::default());
        assert!(store.set_hysteresis(-1.0).is_err());
        assert_eq!(store.current_threshold().unwrap().hysteresis_margin, 1.0);
        assert_eq!(store.set_hysteresis(0.5).unwrap().hysteresis_margin, 0.5);
    }

    #[test]
    fn switching_strategy_resets_trigger() {
        let store = ThresholdStore::new(Config::default());
        store.set_trigger_input("xyz").unwrap_err();
        let t = store.set_threshold_mode(ThresholdMode::RelativeHumidity);
        assert_eq!(t, Threshold::relative_humidity(80.0));
        assert_eq!(store.current_threshold(), Ok(t));
    }

    #[test]
    fn mode_toggle() {
        let store = ThresholdStore::new(Config::default());
        assert_eq!(store.toggle_operating_mode(), OperatingMode::Manual);
        assert_eq!(store.get_operating_mode(), OperatingMode::Manual);
    }

    #[test]
    fn clones_share_state() {
        let store = ThresholdStore::new(Config::default());
        let other = store.clone();
        other.set_transport_identifier(Some("COM4".into()));
        assert_eq!(store.transport_identifier().as_deref(), Some("COM4"));
    }

    #[test]
    fn port_identifier_is_trimmed() {
        let store = ThresholdStore::new(Config::default());
        store.set_transport_identifier(Some(" /dev/ttyUSB0\n".into()));
        assert_eq!(store.transport_identifier().as_deref(), Some("/dev/ttyUSB0"));
        store.set_transport_identifier(Some("  ".into()));
        assert_eq!(store.transport_identifier(), None);
    }
}
