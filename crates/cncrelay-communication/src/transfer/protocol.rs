//! YMODEM-style block framing
//!
//! A block is `[type][seq][~seq][payload][crc16 hi][crc16 lo]` with the
//! payload padded to the block size. The CRC covers the padded payload.

/// Start of a 128-byte block
pub const SOH: u8 = 0x01;
/// Start of a 1024-byte block
pub const STX: u8 = 0x02;
/// End of transmission
pub const EOT: u8 = 0x04;
/// Positive acknowledgment
pub const ACK: u8 = 0x06;
/// Negative acknowledgment, resend the block
pub const NAK: u8 = 0x15;
/// Receiver abort
pub const CAN: u8 = 0x18;
/// Receiver ready for CRC-mode blocks
pub const CRC_READY: u8 = b'C';

/// Payload size of header blocks
pub const HEADER_BLOCK_SIZE: usize = 128;
/// Payload size of data blocks
pub const DATA_BLOCK_SIZE: usize = 1024;
/// Fill byte for the unused tail of a data block
pub const DATA_PAD: u8 = 0x1A;
/// Fill byte for the unused tail of a header block
pub const HEADER_PAD: u8 = 0x00;

/// CRC-16/XMODEM: polynomial 0x1021, initial value 0, no reflection
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for &byte in data {
        crc ^= u16::from(byte) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
    }
    crc
}

/// Frame `payload` as one block of `block_size` bytes
///
/// `payload` must not exceed `block_size`.
pub fn encode_block(sequence: u8, payload: &[u8], block_size: usize, pad: u8) -> Vec<u8> {
    debug_assert!(payload.len() <= block_size);
    let kind = if block_size == DATA_BLOCK_SIZE { STX } else { SOH };

    let mut block = Vec::with_capacity(block_size + 5);
    block.push(kind);
    block.push(sequence);
    block.push(!sequence);
    block.extend_from_slice(payload);
    block.resize(3 + block_size, pad);

    let crc = crc16(&block[3..]);
    block.extend_from_slice(&crc.to_be_bytes());
    block
}

/// Header block announcing a file: `filename\0filesize\0`
///
/// `None` when the name does not fit a header block.
pub fn header_block(filename: &str, size: usize) -> Option<Vec<u8>> {
    let mut payload = Vec::with_capacity(HEADER_BLOCK_SIZE);
    payload.extend_from_slice(filename.as_bytes());
    payload.push(0);
    payload.extend_from_slice(size.to_string().as_bytes());
    payload.push(0);
    (payload.len() <= HEADER_BLOCK_SIZE)
        .then(|| encode_block(0, &payload, HEADER_BLOCK_SIZE, HEADER_PAD))
}

/// Empty header block closing the batch
pub fn final_block() -> Vec<u8> {
    encode_block(0, &[], HEADER_BLOCK_SIZE, HEADER_PAD)
}

/// Human-readable name of a control byte, for errors and logs
pub fn byte_name(byte: u8) -> String {
    match byte {
        SOH => "SOH".to_string(),
        STX => "STX".to_string(),
        EOT => "EOT".to_string(),
        ACK => "ACK".to_string(),
        NAK => "NAK".to_string(),
        CAN => "CAN".to_string(),
        CRC_READY => "'C'".to_string(),
        other => format!("0x{:02X}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_crc16_check_value() {
        assert_eq!(crc16(b"123456789"), 0x31C3);
        assert_eq!(crc16(&[]), 0);
    }

    #[test]
    fn test_data_block_layout() {
        let block = encode_block(1, b"G0 X0\n", DATA_BLOCK_SIZE, DATA_PAD);
        assert_eq!(block.len(), 3 + DATA_BLOCK_SIZE + 2);
        assert_eq!(&block[..3], &[STX, 0x01, 0xFE]);
        assert_eq!(&block[3..9], b"G0 X0\n");
        assert!(block[9..3 + DATA_BLOCK_SIZE].iter().all(|&b| b == DATA_PAD));
    }

    #[test]
    fn test_header_block() {
        let block = header_block("job.nc", 2048).unwrap();
        assert_eq!(block.len(), 3 + HEADER_BLOCK_SIZE + 2);
        assert_eq!(&block[..3], &[SOH, 0x00, 0xFF]);
        assert_eq!(&block[3..15], b"job.nc\x002048\x00");
        assert!(block[15..3 + HEADER_BLOCK_SIZE].iter().all(|&b| b == 0));

        assert!(header_block(&"x".repeat(200), 1).is_none());
    }

    #[test]
    fn test_final_block_is_empty_header() {
        let block = final_block();
        assert_eq!(&block[..3], &[SOH, 0x00, 0xFF]);
        assert!(block[3..3 + HEADER_BLOCK_SIZE].iter().all(|&b| b == 0));
        assert_eq!(&block[3 + HEADER_BLOCK_SIZE..], &[0, 0]);
    }

    proptest! {
        #[test]
        fn prop_block_crc_matches_payload(seq in any::<u8>(), payload in prop::collection::vec(any::<u8>(), 0..=1024)) {
            let block = encode_block(seq, &payload, DATA_BLOCK_SIZE, DATA_PAD);
            prop_assert_eq!(block.len(), DATA_BLOCK_SIZE + 5);
            prop_assert_eq!(block[1] ^ block[2], 0xFF);
            let crc = crc16(&block[3..3 + DATA_BLOCK_SIZE]);
            prop_assert_eq!(&block[3 + DATA_BLOCK_SIZE..], &crc.to_be_bytes()[..]);
        }
    }
}
