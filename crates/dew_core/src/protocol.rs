//! Protocolo do relé USB (placas LCUS / CH340).
//!
//! Formato do frame (4 bytes, sem resposta do dispositivo):
//!
//! ```text
//! ┌──────────┬────────────┬─────────┬─────────────┐
//! │ Start(1) │ Address(1) │ Op. (1) │ Checksum(1) │
//! └──────────┴────────────┴─────────┴─────────────┘
//! ```
//!
//! - Start marker fixo `0xA0`
//! - Endereço do relé `0x01` (placa de um canal)
//! - Operação: `0x01` liga, `0x00` desliga
//! - Checksum: soma simples dos três bytes anteriores mod 256 (não é CRC).
//!   ON → `0xA0 + 0x01 + 0x01 = 0xA2`, OFF → `0xA0 + 0x01 + 0x00 = 0xA1`.

/// Marcador de início de frame.
pub const START_MARKER: u8 = 0xA0;

/// Endereço do canal do relé.
pub const RELAY_ADDRESS: u8 = 0x01;

/// Byte de operação: ligar.
pub const OP_ON: u8 = 0x01;

/// Byte de operação: desligar.
pub const OP_OFF: u8 = 0x00;

/// Tamanho fixo do frame.
pub const FRAME_LEN: usize = 4;

/// Um comando pronto para o transporte serial.
pub type Frame = [u8; FRAME_LEN];

/// Erros de validação de frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("Frame com tamanho inválido ({0} bytes, esperado {FRAME_LEN})")]
    BadLength(usize),

    #[error("Start marker inválido: 0x{0:02X} (esperado 0x{START_MARKER:02X})")]
    BadMarker(u8),

    #[error("Endereço de relé inválido: 0x{0:02X} (esperado 0x{RELAY_ADDRESS:02X})")]
    BadAddress(u8),

    #[error("Operação desconhecida: 0x{0:02X}")]
    BadOperation(u8),

    #[error("Checksum inválido: 0x{found:02X} (esperado 0x{expected:02X})")]
    BadChecksum { expected: u8, found: u8 },
}

fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// Monta o comando ON/OFF. Função pura e total.
pub fn encode(turn_on: bool) -> Frame {
    let op = if turn_on { OP_ON } else { OP_OFF };
    let head = [START_MARKER, RELAY_ADDRESS, op];
    [head[0], head[1], head[2], checksum(&head)]
}

/// Valida um frame e retorna a intenção codificada (`true` = ligar).
///
/// A ordem das verificações é tamanho, marker, endereço, checksum e por
/// fim o byte de operação.
pub fn validate(frame: &[u8]) -> Result<bool, ProtocolError> {
    if frame.len() != FRAME_LEN {
        return Err(ProtocolError::BadLength(frame.len()));
    }

    let marker = frame[0];
    if marker != START_MARKER {
        return Err(ProtocolError::BadMarker(marker));
    }

    let address = frame[1];
    if address != RELAY_ADDRESS {
        return Err(ProtocolError::BadAddress(address));
    }

    let expected = checksum(&frame[..3]);
    let found = frame[3];
    if expected != found {
        return Err(ProtocolError::BadChecksum { expected, found });
    }

    match frame[2] {
        OP_ON => Ok(true),
        OP_OFF => Ok(false),
        other => Err(ProtocolError::BadOperation(other)),
    }
}

/// Formata um frame como `A0 01 01 A2` para logs.
pub fn frame_hex(frame: &[u8]) -> String {
    frame
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
