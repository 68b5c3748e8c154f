//! The two fixed-layout frames exchanged over the wire: a worker's 96-byte
//! request, and the server's variable-length data reply. Integers inside
//! both frames are little-endian; the session layer's big-endian length
//! prefix is handled one level up, in the network crate.

use crate::command::{Command, TEXT_LEN};
use evo_error::{err, Result};

/// `req_xml_` / `req_gen_` / `score___` sent from a worker. The struct's
/// own fields total 44 bytes; the remaining 52 bytes of the fixed 96-byte
/// frame are reserved and always zero.
pub const REQUEST_FRAME_LEN: usize = 96;
const REQUEST_FIELDS_LEN: usize = TEXT_LEN + 8 + 4 + 4 + 4 + 8;

#[derive(Clone, Debug, PartialEq)]
pub struct RequestFrame {
    pub command: Command,
    pub evolve_identifier: u64,
    pub sender_ip: u32,
    pub sender_port: u32,
    pub run_id: u32,
    pub score: f64,
}

impl RequestFrame {
    pub fn encode(&self) -> [u8; REQUEST_FRAME_LEN] {
        let mut buf = [0u8; REQUEST_FRAME_LEN];
        let mut text = [0u8; TEXT_LEN];
        self.command.write_text(&mut text);

        let mut offset = 0;
        write_bytes(&mut buf, &mut offset, &text);
        write_bytes(&mut buf, &mut offset, &self.evolve_identifier.to_le_bytes());
        write_bytes(&mut buf, &mut offset, &self.sender_ip.to_le_bytes());
        write_bytes(&mut buf, &mut offset, &self.sender_port.to_le_bytes());
        write_bytes(&mut buf, &mut offset, &self.run_id.to_le_bytes());
        write_bytes(&mut buf, &mut offset, &self.score.to_le_bytes());
        debug_assert_eq!(offset, REQUEST_FIELDS_LEN);
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<RequestFrame> {
        if bytes.len() != REQUEST_FRAME_LEN {
            return Err(err!(Protocol: "request frame must be {} bytes, got {}", REQUEST_FRAME_LEN, bytes.len()));
        }
        let mut offset = 0;
        let text: [u8; TEXT_LEN] = read_array(bytes, &mut offset);
        let command = Command::from_text(&text)?;
        let evolve_identifier = u64::from_le_bytes(read_array(bytes, &mut offset));
        let sender_ip = u32::from_le_bytes(read_array(bytes, &mut offset));
        let sender_port = u32::from_le_bytes(read_array(bytes, &mut offset));
        let run_id = u32::from_le_bytes(read_array(bytes, &mut offset));
        let score = f64::from_le_bytes(read_array(bytes, &mut offset));

        Ok(RequestFrame {
            command,
            evolve_identifier,
            sender_ip,
            sender_port,
            run_id,
            score,
        })
    }
}

/// `xml` or `genome` sent from the server. The header is 60 bytes; the
/// payload follows immediately and is either `genomeLength` doubles or
/// `xmlLength` bytes, never both.
pub const DATA_HEADER_LEN: usize = TEXT_LEN + 8 + 4 + 4 + 4 + 4 + 4 + 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataKind {
    Xml,
    Genome,
}

impl DataKind {
    fn tag(&self) -> &'static [u8] {
        match self {
            DataKind::Xml => b"xml",
            DataKind::Genome => b"genome",
        }
    }

    fn write_text(&self, out: &mut [u8; TEXT_LEN]) {
        out.fill(0);
        let tag = self.tag();
        out[..tag.len()].copy_from_slice(tag);
    }

    fn from_text(text: &[u8; TEXT_LEN]) -> Result<DataKind> {
        let end = text.iter().position(|&b| b == 0).unwrap_or(TEXT_LEN);
        match &text[..end] {
            b"xml" => Ok(DataKind::Xml),
            b"genome" => Ok(DataKind::Genome),
            other => Err(err!(Protocol: "unrecognised data frame tag {:?}", String::from_utf8_lossy(other))),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    Xml(Vec<u8>),
    Genome(Vec<f64>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct DataFrame {
    pub evolve_identifier: u64,
    pub sender_ip: u32,
    pub sender_port: u32,
    pub run_id: u32,
    pub md5: [u32; 4],
    pub payload: Payload,
}

impl DataFrame {
    fn kind(&self) -> DataKind {
        match self.payload {
            Payload::Xml(_) => DataKind::Xml,
            Payload::Genome(_) => DataKind::Genome,
        }
    }

    fn genome_length(&self) -> u32 {
        match &self.payload {
            Payload::Genome(values) => values.len() as u32,
            Payload::Xml(_) => 0,
        }
    }

    fn xml_length(&self) -> u32 {
        match &self.payload {
            Payload::Xml(bytes) => bytes.len() as u32,
            Payload::Genome(_) => 0,
        }
    }

    pub fn encoded_len(&self) -> usize {
        DATA_HEADER_LEN
            + match &self.payload {
                Payload::Xml(bytes) => bytes.len(),
                Payload::Genome(values) => values.len() * 8,
            }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; self.encoded_len()];
        let mut text = [0u8; TEXT_LEN];
        self.kind().write_text(&mut text);

        let mut offset = 0;
        write_bytes(&mut buf, &mut offset, &text);
        write_bytes(&mut buf, &mut offset, &self.evolve_identifier.to_le_bytes());
        write_bytes(&mut buf, &mut offset, &self.sender_ip.to_le_bytes());
        write_bytes(&mut buf, &mut offset, &self.sender_port.to_le_bytes());
        write_bytes(&mut buf, &mut offset, &self.run_id.to_le_bytes());
        write_bytes(&mut buf, &mut offset, &self.genome_length().to_le_bytes());
        write_bytes(&mut buf, &mut offset, &self.xml_length().to_le_bytes());
        for word in &self.md5 {
            write_bytes(&mut buf, &mut offset, &word.to_le_bytes());
        }
        debug_assert_eq!(offset, DATA_HEADER_LEN);

        match &self.payload {
            Payload::Xml(bytes) => buf[offset..].copy_from_slice(bytes),
            Payload::Genome(values) => {
                for v in values {
                    write_bytes(&mut buf, &mut offset, &v.to_le_bytes());
                }
            }
        }
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<DataFrame> {
        if bytes.len() < DATA_HEADER_LEN {
            return Err(err!(Protocol: "data frame shorter than header: {} bytes", bytes.len()));
        }
        let mut offset = 0;
        let text: [u8; TEXT_LEN] = read_array(bytes, &mut offset);
        let kind = DataKind::from_text(&text)?;
        let evolve_identifier = u64::from_le_bytes(read_array(bytes, &mut offset));
        let sender_ip = u32::from_le_bytes(read_array(bytes, &mut offset));
        let sender_port = u32::from_le_bytes(read_array(bytes, &mut offset));
        let run_id = u32::from_le_bytes(read_array(bytes, &mut offset));
        let genome_length = u32::from_le_bytes(read_array(bytes, &mut offset));
        let xml_length = u32::from_le_bytes(read_array(bytes, &mut offset));
        let mut md5 = [0u32; 4];
        for word in md5.iter_mut() {
            *word = u32::from_le_bytes(read_array(bytes, &mut offset));
        }

        let payload = match kind {
            DataKind::Xml => {
                let expected = DATA_HEADER_LEN + xml_length as usize;
                if bytes.len() != expected {
                    return Err(err!(Protocol: "xml data frame length mismatch: expected {expected}, got {}", bytes.len()));
                }
                Payload::Xml(bytes[offset..].to_vec())
            }
            DataKind::Genome => {
                let expected = DATA_HEADER_LEN + genome_length as usize * 8;
                if bytes.len() != expected {
                    return Err(err!(Protocol: "genome data frame length mismatch: expected {expected}, got {}", bytes.len()));
                }
                let mut values = Vec::with_capacity(genome_length as usize);
                let mut cursor = offset;
                for _ in 0..genome_length {
                    values.push(f64::from_le_bytes(read_array(bytes, &mut cursor)));
                }
                Payload::Genome(values)
            }
        };

        Ok(DataFrame {
            evolve_identifier,
            sender_ip,
            sender_port,
            run_id,
            md5,
            payload,
        })
    }

    /// The MD5 digest as four little-endian `u32` words, matching the
    /// frame's own `md5` field layout.
    pub fn md5_of(xml: &[u8]) -> [u32; 4] {
        let digest = md5::compute(xml).0;
        let mut words = [0u32; 4];
        for (i, word) in words.iter_mut().enumerate() {
            *word = u32::from_le_bytes(digest[i * 4..i * 4 + 4].try_into().unwrap());
        }
        words
    }
}

fn write_bytes(buf: &mut [u8], offset: &mut usize, bytes: &[u8]) {
    buf[*offset..*offset + bytes.len()].copy_from_slice(bytes);
    *offset += bytes.len();
}

fn read_array<const N: usize>(bytes: &[u8], offset: &mut usize) -> [u8; N] {
    let mut arr = [0u8; N];
    arr.copy_from_slice(&bytes[*offset..*offset + N]);
    *offset += N;
    arr
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_frame_round_trips_and_is_fixed_length() {
        let frame = RequestFrame {
            command: Command::Score,
            evolve_identifier: 1_700_000_000,
            sender_ip: 0x7f000001,
            sender_port: 9001,
            run_id: 42,
            score: 3.25,
        };
        let encoded = frame.encode();
        assert_eq!(encoded.len(), REQUEST_FRAME_LEN);
        let decoded = RequestFrame::decode(&encoded).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn short_request_frame_is_rejected() {
        let bytes = vec![0u8; REQUEST_FRAME_LEN - 1];
        assert!(RequestFrame::decode(&bytes).is_err());
    }

    #[test]
    fn genome_data_frame_round_trips() {
        let frame = DataFrame {
            evolve_identifier: 123,
            sender_ip: 10,
            sender_port: 20,
            run_id: 5,
            md5: [1, 2, 3, 4],
            payload: Payload::Genome(vec![1.5, -2.5, 3.0]),
        };
        let encoded = frame.encode();
        assert_eq!(encoded.len(), DATA_HEADER_LEN + 3 * 8);
        let decoded = DataFrame::decode(&encoded).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn xml_data_frame_md5_matches_payload() {
        let xml = b"<model/>".to_vec();
        let md5 = DataFrame::md5_of(&xml);
        let frame = DataFrame {
            evolve_identifier: 1,
            sender_ip: 0,
            sender_port: 0,
            run_id: 0,
            md5,
            payload: Payload::Xml(xml.clone()),
        };
        let encoded = frame.encode();
        let decoded = DataFrame::decode(&encoded).unwrap();
        assert_eq!(decoded.md5, DataFrame::md5_of(&xml));
        match decoded.payload {
            Payload::Xml(bytes) => assert_eq!(bytes, xml),
            _ => panic!("expected xml payload"),
        }
    }
}
