//! # Dew Core
//!
//! Crate compartilhada do controlador de aquecedor anti-orvalho: modelo de
//! dados, protocolo do relé USB, histerese, loop de controle, amostragem e
//! configuração.
//!
//! ## Módulos
//! - [`types`] – Leitura, limiar, modo de operação, estado do aquecedor
//! - [`protocol`] – Frame de 4 bytes do relé (encode/validate)
//! - [`hysteresis`] – Decisão ON/OFF pura
//! - [`control`] – Loop de controle dono do estado do aquecedor
//! - [`sampler`] – Normalização do JSON de clima e slot da última leitura
//! - [`threshold`] – Store do limiar/modo com setter validado
//! - [`config`] – `config.json` persistido atomicamente
//! - [`settings`] – `settings.toml` de execução
//! - [`events`] – Eventos para a apresentação
//! - [`shutdown`] – Cancelamento cooperativo

pub mod types;
pub mod protocol;
pub mod hysteresis;
pub mod control;
pub mod sampler;
pub mod threshold;
pub mod config;
pub mod settings;
pub mod events;
pub mod shutdown;

// Re-exports convenientes
pub use types::{HeaterState, OperatingMode, Reading, Severity, Threshold, ThresholdMode};
pub use protocol::{encode, validate, ProtocolError};
pub use control::{ControlInputs, ControlLoop, TickOutcome, Transport, TransportError};
pub use config::{Config, ConfigLoadError, PersistError};
pub use settings::Settings;
pub use events::{ControllerEvent, EventSink};
pub use shutdown::CancelToken;
