//! Transporte serial do relé USB via `serialport`.
//!
//! Um único handle compartilhado; o mutex interno serializa as escritas
//! para que frames de tarefas diferentes nunca se intercalem.

use dew_core::control::{Transport, TransportError};
use serialport::SerialPort;
use std::io::Write;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info};

/// Abrir/fechar a porta, usado pelo console.
pub trait PortControl {
    fn open(&self, port: &str) -> Result<(), TransportError>;
    /// Fecha a porta atual e retorna o nome dela.
    fn close(&self) -> Option<String>;
    fn port_name(&self) -> Option<String>;
}

struct OpenPort {
    name: String,
    handle: Box<dyn SerialPort>,
}

pub struct SerialTransport {
    port: Mutex<Option<OpenPort>>,
    baud_rate: u32,
    timeout: Duration,
}

impl SerialTransport {
    pub fn new(baud_rate: u32, timeout: Duration) -> Self {
        Self {
            port: Mutex::new(None),
            baud_rate,
            timeout,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<OpenPort>> {
        self.port.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PortControl for SerialTransport {
    fn open(&self, port: &str) -> Result<(), TransportError> {
        // Abre fora do lock; só a troca do handle é feita com ele
        let handle = serialport::new(port, self.baud_rate)
            .timeout(self.timeout)
            .open()
            .map_err(|e| TransportError::Open {
                port: port.to_string(),
                reason: e.to_string(),
            })?;

        let previous = self.lock().replace(OpenPort {
            name: port.to_string(),
            handle,
        });
        if let Some(old) = previous {
            debug!("Porta {} substituída por {port}", old.name);
        }
        info!("Conectado a {port} ({} baud)", self.baud_rate);
        Ok(())
    }

    fn close(&self) -> Option<String> {
        let closed = self.lock().take().map(|p| p.name);
        if let Some(name) = &closed {
            info!("Porta {name} fechada");
        }
        closed
    }

    fn port_name(&self) -> Option<String> {
        self.lock().as_ref().map(|p| p.name.clone())
    }
}

impl Transport for SerialTransport {
    fn write_frame(&self, frame: &[u8]) -> Result<(), TransportError> {
        let mut guard = self.lock();
        let port = guard.as_mut().ok_or(TransportError::NotConnected)?;
        port.handle.write_all(frame)?;
        port.handle.flush()?;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.lock().is_some()
    }
}
