//! Console de linha de comando – faz o papel da janela de controle.
//!
//! Uma thread lê o stdin e envia as linhas por channel (como a thread de
//! rede do receiver); o main consome as linhas junto com o sinal de
//! cancelamento. Toda alteração confirmada é persistida na hora.

use crate::serial::PortControl;
use crate::tasks::ControlCommand;
use crossbeam_channel::{Receiver, Sender, bounded};
use dew_core::threshold::ThresholdStore;
use dew_core::{HeaterState, OperatingMode, ThresholdMode};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{info, warn};

pub const HELP: &str = "\
Comandos:
  auto | manual | mode        modo de operação (mode alterna)
  on | off | toggle           aciona o relé (só em MANUAL)
  threshold <valor>           gatilho (°C de dew spread ou % de RH)
  hysteresis <valor>          margem para desligar (°C, só dew spread)
  strategy dewspread|rh       estratégia de disparo
  connect <porta>             abre a porta serial (ex: COM3, /dev/ttyUSB0)
  disconnect                  fecha a porta serial
  status | help | quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetMode(OperatingMode),
    ToggleMode,
    Heater(Option<bool>),
    Threshold(String),
    Hysteresis(f64),
    Strategy(ThresholdMode),
    Connect(String),
    Disconnect,
    Status,
    Help,
    Quit,
}

/// Interpreta uma linha. `Ok(None)` para linha vazia.
pub fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let mut parts = line.split_whitespace();
    let Some(word) = parts.next() else {
        return Ok(None);
    };
    let rest: Vec<&str> = parts.collect();
    let arg = rest.join(" ");

    let cmd = match word.to_lowercase().as_str() {
        "auto" => Command::SetMode(OperatingMode::Auto),
        "manual" => Command::SetMode(OperatingMode::Manual),
        "mode" => Command::ToggleMode,
        "on" => Command::Heater(Some(true)),
        "off" => Command::Heater(Some(false)),
        "toggle" => Command::Heater(None),
        // O texto vai cru para o store, que registra a entrada inválida
        "threshold" | "t" if !arg.is_empty() => Command::Threshold(arg),
        "hysteresis" | "h" => match arg.replace(',', ".").parse::<f64>() {
            Ok(v) => Command::Hysteresis(v),
            Err(_) => return Err(format!("Histerese inválida: {arg:?}")),
        },
        "strategy" => match arg.to_lowercase().as_str() {
            "dewspread" | "dew" => Command::Strategy(ThresholdMode::DewSpread),
            "rh" | "humidity" => Command::Strategy(ThresholdMode::RelativeHumidity),
            _ => return Err(format!("Estratégia desconhecida: {arg:?} (dewspread|rh)")),
        },
        "connect" if !arg.is_empty() => Command::Connect(arg),
        "disconnect" => Command::Disconnect,
        "status" | "s" => Command::Status,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => return Err(format!("Comando desconhecido: {other:?} (digite help)")),
    };
    Ok(Some(cmd))
}

/// Inicia a thread de leitura do stdin. O channel fecha no EOF.
///
/// A thread fica bloqueada em `read_line` e não é aguardada no shutdown;
/// ela só encaminha texto e nunca toca no transporte.
pub fn spawn_stdin_reader() -> std::io::Result<Receiver<String>> {
    let (tx, rx) = bounded::<String>(16);
    std::thread::Builder::new()
        .name("stdin-reader".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })?;
    Ok(rx)
}

/// Aplica comandos do usuário ao store, ao transporte e ao loop.
pub struct Console<P> {
    pub store: ThresholdStore,
    pub port: Arc<P>,
    pub control_tx: Sender<ControlCommand>,
    pub heater_display: Arc<RwLock<HeaterState>>,
    pub config_path: PathBuf,
}

impl<P: PortControl> Console<P> {
    /// Processa um comando. Retorna `false` quando o usuário pede para sair.
    pub fn handle(&self, cmd: Command) -> bool {
        match cmd {
            Command::SetMode(mode) => {
                self.store.set_operating_mode(mode);
                info!("Modo alterado para {mode}");
                self.persist();
            }
            Command::ToggleMode => {
                let mode = self.store.toggle_operating_mode();
                info!("Modo alterado para {mode}");
                self.persist();
            }
            Command::Heater(intent) => {
                if self.store.operating_mode() != OperatingMode::Manual {
                    warn!("Acionamento manual disponível só no modo MANUAL");
                } else {
                    let cmd = match intent {
                        Some(on) => ControlCommand::SetManual(on),
                        None => ControlCommand::ToggleManual,
                    };
                    if self.control_tx.send(cmd).is_err() {
                        warn!("Loop de controle não está ativo");
                    }
                }
            }
            Command::Threshold(raw) => match self.store.set_trigger_input(&raw) {
                Ok(t) => {
                    info!("Gatilho {} = {}{}", t.mode, t.trigger_value, t.mode.unit());
                    self.persist();
                }
                Err(e) => warn!("{e}"),
            },
            Command::Hysteresis(margin) => match self.store.set_hysteresis(margin) {
                Ok(t) => {
                    if t.mode == ThresholdMode::RelativeHumidity {
                        info!("Histerese = {margin}°C (sem efeito no modo RH)");
                    } else {
                        info!("Histerese = {margin}°C");
                    }
                    self.persist();
                }
                Err(e) => warn!("{e}"),
            },
            Command::Strategy(mode) => {
                let t = self.store.set_threshold_mode(mode);
                info!("Estratégia {mode}, gatilho {}{}", t.trigger_value, mode.unit());
                self.persist();
            }
            Command::Connect(port) => self.connect(&port),
            Command::Disconnect => {
                if self.port.close().is_none() {
                    info!("Nenhuma porta conectada");
                }
            }
            Command::Status => println!("{}", self.status_line()),
            Command::Help => println!("{HELP}"),
            Command::Quit => return false,
        }
        true
    }

    /// Abre a porta e registra como última usada.
    pub fn connect(&self, port: &str) {
        match self.port.open(port) {
            Ok(()) => {
                self.store.set_transport_identifier(Some(port.to_string()));
                self.persist();
            }
            Err(e) => warn!("Conexão falhou: {e}"),
        }
    }

    pub fn status_line(&self) -> String {
        let config = self.store.snapshot();
        let heater = *self
            .heater_display
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let threshold = match self.store.current_threshold() {
            Ok(t) => format!("{} ≤ {}{}", t.mode, t.trigger_value, t.mode.unit()),
            Err(e) => e.to_string(),
        };
        format!(
            "Modo: {} | Aquecedor: {} | Gatilho: {} | Histerese: {}°C | Porta: {}",
            config.operating_mode,
            heater,
            threshold,
            config.threshold.hysteresis_margin,
            self.port.port_name().unwrap_or_else(|| "desconectada".into()),
        )
    }

    /// Falha de gravação é registrada; a cópia em memória segue valendo.
    pub fn persist(&self) {
        if let Err(e) = self.store.save(&self.config_path) {
            warn!("Falha ao salvar config: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dew_core::config::Config;
    use dew_core::control::TransportError;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakePort {
        open: Mutex<Option<String>>,
    }

    impl PortControl for FakePort {
        fn open(&self, port: &str) -> Result<(), TransportError> {
            if port.starts_with("bad") {
                return Err(TransportError::Open {
                    port: port.into(),
                    reason: "acesso negado".into(),
                });
            }
            *self.open.lock().unwrap() = Some(port.into());
            Ok(())
        }

        fn close(&self) -> Option<String> {
            self.open.lock().unwrap().take()
        }

        fn port_name(&self) -> Option<String> {
            self.open.lock().unwrap().clone()
        }
    }

    fn console() -> (Console<FakePort>, Receiver<ControlCommand>) {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        let n = COUNTER.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = bounded(8);
        let console = Console {
            store: ThresholdStore::new(Config::default()),
            port: Arc::new(FakePort::default()),
            control_tx: tx,
            heater_display: Arc::new(RwLock::new(HeaterState::Off)),
            config_path: std::env::temp_dir()
                .join(format!("dew_console_{}_{n}.json", std::process::id())),
        };
        (console, rx)
    }

    #[test]
    fn parses_commands() {
        assert_eq!(parse_command("   "), Ok(None));
        assert_eq!(parse_command("AUTO"), Ok(Some(Command::SetMode(OperatingMode::Auto))));
        assert_eq!(parse_command("toggle"), Ok(Some(Command::Heater(None))));
        assert_eq!(
            parse_command("threshold 2.5"),
            Ok(Some(Command::Threshold("2.5".into())))
        );
        assert_eq!(parse_command("h 0,5"), Ok(Some(Command::Hysteresis(0.5))));
        assert_eq!(
            parse_command("strategy rh"),
            Ok(Some(Command::Strategy(ThresholdMode::RelativeHumidity)))
        );
        assert_eq!(
            parse_command("connect /dev/ttyUSB0"),
            Ok(Some(Command::Connect("/dev/ttyUSB0".into())))
        );
        assert!(parse_command("connect").is_err());
        assert!(parse_command("strategy sol").is_err());
        assert!(parse_command("dance").is_err());
    }

    #[test]
    fn manual_commands_need_manual_mode() {
        let (console, rx) = console();
        assert!(console.handle(Command::Heater(Some(true))));
        assert!(rx.try_recv().is_err());

        console.handle(Command::SetMode(OperatingMode::Manual));
        console.handle(Command::Heater(Some(true)));
        console.handle(Command::Heater(None));
        assert_eq!(rx.try_recv(), Ok(ControlCommand::SetManual(true)));
        assert_eq!(rx.try_recv(), Ok(ControlCommand::ToggleManual));
        let _ = std::fs::remove_file(&console.config_path);
    }

    #[test]
    fn confirmed_changes_are_persisted() {
        let (console, _rx) = console();
        console.handle(Command::Threshold("4.25".into()));
        console.handle(Command::Connect("COM7".into()));
        console.handle(Command::ToggleMode);

        let (saved, issue) = Config::load(&console.config_path);
        assert!(issue.is_none());
        assert_eq!(saved.threshold.trigger_value, 4.25);
        assert_eq!(saved.transport_identifier.as_deref(), Some("COM7"));
        assert_eq!(saved.operating_mode, OperatingMode::Manual);
        let _ = std::fs::remove_file(&console.config_path);
    }

    #[test]
    fn rejected_input_is_not_persisted() {
        let (console, _rx) = console();
        console.handle(Command::Threshold("abc".into()));
        console.handle(Command::Connect("bad-port".into()));
        assert!(!console.config_path.exists());
        assert!(console.status_line().contains("não numérico"));
        assert!(console.status_line().contains("desconectada"));
    }

    #[test]
    fn quit_stops_the_console() {
        let (console, _rx) = console();
        assert!(!console.handle(Command::Quit));
        assert!(console.handle(Command::Status));
    }
}
