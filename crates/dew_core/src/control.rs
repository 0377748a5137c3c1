//! Loop de controle – máquina de estados do aquecedor.
//!
//! Dono exclusivo do [`HeaterState`]. A cada tick lê o limiar, o modo e a
//! leitura mais recente, decide pela histerese ([`crate::hysteresis`]) e,
//! havendo transição, envia o frame pelo transporte. O estado só avança
//! depois de uma escrita bem-sucedida: se a escrita falhar, o próximo tick
//! tenta a mesma transição de novo.

use crate::events::EventSink;
use crate::hysteresis::next_state;
use crate::protocol::{self, frame_hex};
use crate::sampler::is_stale;
use crate::shutdown::CancelToken;
use crate::threshold::ThresholdError;
use crate::types::{HeaterState, OperatingMode, Reading, Threshold, ThresholdMode};
use chrono::{DateTime, Duration, Utc};
use std::io;
use std::sync::Arc;
use tracing::debug;

// ──────────────────────────────────────────────
// Colaboradores
// ──────────────────────────────────────────────

/// Erros do transporte serial.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Porta serial não conectada")]
    NotConnected,

    #[error("Falha de escrita serial: {0}")]
    Io(#[from] io::Error),

    #[error("Falha ao abrir {port}: {reason}")]
    Open { port: String, reason: String },
}

/// Conexão byte-stream com o relé. Implementações serializam as escritas.
pub trait Transport {
    fn write_frame(&self, frame: &[u8]) -> Result<(), TransportError>;
    fn is_connected(&self) -> bool;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn write_frame(&self, frame: &[u8]) -> Result<(), TransportError> {
        (**self).write_frame(frame)
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }
}

/// Valores definidos pelo usuário e lidos (nunca alterados) pelo loop.
pub trait ControlInputs {
    fn get_current_threshold(&self) -> Result<Threshold, ThresholdError>;
    fn get_operating_mode(&self) -> OperatingMode;
}

// ──────────────────────────────────────────────
// Resultado de um tick
// ──────────────────────────────────────────────

/// Por que um tick (ou comando manual) não avaliou.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Tick automático com o modo em MANUAL.
    ManualMode,
    /// Comando manual com o modo em AUTO.
    AutoMode,
    InvalidThreshold,
    NoReading,
    StaleReading,
    /// A leitura não tem o campo exigido pela estratégia.
    MissingField(ThresholdMode),
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Avaliou e nenhuma transição era necessária.
    Holding(HeaterState),
    /// Frame escrito; estado atualizado.
    Commanded(HeaterState),
    /// Escrita falhou; o estado não mudou.
    WriteFailed { wanted: HeaterState },
    Skipped(SkipReason),
}

// ──────────────────────────────────────────────
// Loop
// ──────────────────────────────────────────────

pub struct ControlLoop<T, S> {
    state: HeaterState,
    transport: T,
    sink: S,
    max_reading_age: Option<Duration>,
}

impl<T: Transport, S: EventSink> ControlLoop<T, S> {
    /// Começa em `Off`: nada foi comandado ainda.
    pub fn new(transport: T, sink: S) -> Self {
        Self {
            state: HeaterState::Off,
            transport,
            sink,
            max_reading_age: None,
        }
    }

    /// Idade máxima da leitura; `None` age sobre a última leitura boa
    /// indefinidamente.
    pub fn with_max_reading_age(mut self, max_age: Option<Duration>) -> Self {
        self.max_reading_age = max_age;
        self
    }

    pub fn state(&self) -> HeaterState {
        self.state
    }

    /// Uma avaliação periódica. No máximo uma atuação por chamada.
    pub fn tick<I: ControlInputs + ?Sized>(
        &mut self,
        inputs: &I,
        reading: Option<&Reading>,
        now: DateTime<Utc>,
        cancel: &CancelToken,
    ) -> TickOutcome {
        if inputs.get_operating_mode() != OperatingMode::Auto {
            return TickOutcome::Skipped(SkipReason::ManualMode);
        }

        let threshold = match inputs.get_current_threshold() {
            Ok(t) => t,
            Err(e) => {
                self.sink.error(format!("{e} – avaliação ignorada"));
                return TickOutcome::Skipped(SkipReason::InvalidThreshold);
            }
        };

        let Some(reading) = reading else {
            debug!("Sem leitura ambiental ainda, tick ignorado");
            return TickOutcome::Skipped(SkipReason::NoReading);
        };

        if is_stale(reading, self.max_reading_age, now) {
            self.sink.warn(format!(
                "Leitura de {} está velha demais, aquecedor mantido {}",
                reading.sampled_at.format("%H:%M:%S"),
                self.state
            ));
            return TickOutcome::Skipped(SkipReason::StaleReading);
        }

        let Some(value) = reading.value_for(threshold.mode) else {
            self.sink.warn(format!(
                "Leitura sem dados para o modo {}, tick ignorado",
                threshold.mode
            ));
            return TickOutcome::Skipped(SkipReason::MissingField(threshold.mode));
        };

        let target = next_state(self.state, value, &threshold);
        debug!(
            "{} = {:.2}{} (gatilho {:.2}) → {}",
            threshold.mode,
            value,
            threshold.mode.unit(),
            threshold.trigger_value,
            target
        );

        if target == self.state {
            return TickOutcome::Holding(self.state);
        }
        self.actuate(target, cancel)
    }

    /// Comando explícito do usuário em modo MANUAL. Sem lógica de limiar.
    pub fn set_manual<I: ControlInputs + ?Sized>(
        &mut self,
        inputs: &I,
        turn_on: bool,
        cancel: &CancelToken,
    ) -> TickOutcome {
        if inputs.get_operating_mode() != OperatingMode::Manual {
            self.sink
                .warn("Comando manual ignorado: modo AUTO ativo");
            return TickOutcome::Skipped(SkipReason::AutoMode);
        }
        self.actuate(HeaterState::from_on(turn_on), cancel)
    }

    /// Codifica, escreve e só então atualiza o estado.
    fn actuate(&mut self, target: HeaterState, cancel: &CancelToken) -> TickOutcome {
        if cancel.is_cancelled() {
            return TickOutcome::Skipped(SkipReason::Cancelled);
        }

        if !self.transport.is_connected() {
            self.sink.warn(format!(
                "{} – aquecedor não foi para {target}",
                TransportError::NotConnected
            ));
            return TickOutcome::WriteFailed { wanted: target };
        }

        let frame = protocol::encode(target.is_on());
        match self.transport.write_frame(&frame) {
            Ok(()) => {
                debug!("Frame enviado: {}", frame_hex(&frame));
                self.state = target;
                self.sink.on_state_change(target);
                self.sink.info(format!("Aquecedor {target}"));
                TickOutcome::Commanded(target)
            }
            Err(e) => {
                self.sink
                    .error(format!("{e} – aquecedor continua {}", self.state));
                TickOutcome::WriteFailed { wanted: target }
            }
        }
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
