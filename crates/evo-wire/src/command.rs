//! The three worker-to-server command tags carried in a request frame's
//! text field.

use evo_error::{err, Result};

pub const TEXT_LEN: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    RequestXml,
    RequestGenome,
    Score,
}

impl Command {
    const REQ_XML: &'static [u8] = b"req_xml_";
    const REQ_GEN: &'static [u8] = b"req_gen_";
    const SCORE: &'static [u8] = b"score___";

    pub fn tag(&self) -> &'static [u8] {
        match self {
            Command::RequestXml => Self::REQ_XML,
            Command::RequestGenome => Self::REQ_GEN,
            Command::Score => Self::SCORE,
        }
    }

    /// Writes this command's tag into a zero-padded 16-byte text field.
    pub fn write_text(&self, out: &mut [u8; TEXT_LEN]) {
        out.fill(0);
        let tag = self.tag();
        out[..tag.len()].copy_from_slice(tag);
    }

    /// Parses a command from a 16-byte text field, ignoring trailing NUL
    /// padding. An unrecognised tag is a protocol error the caller should
    /// log and discard, never a fatal one.
    pub fn from_text(text: &[u8; TEXT_LEN]) -> Result<Command> {
        let trimmed = trim_nul(text);
        match trimmed {
            Self::REQ_XML => Ok(Command::RequestXml),
            Self::REQ_GEN => Ok(Command::RequestGenome),
            Self::SCORE => Ok(Command::Score),
            other => Err(err!(Protocol: "unrecognised command tag {:?}", String::from_utf8_lossy(other))),
        }
    }
}

fn trim_nul(text: &[u8; TEXT_LEN]) -> &[u8] {
    let end = text.iter().position(|&b| b == 0).unwrap_or(TEXT_LEN);
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_command_round_trips_through_its_text_field() {
        for command in [Command::RequestXml, Command::RequestGenome, Command::Score] {
            let mut text = [0u8; TEXT_LEN];
            command.write_text(&mut text);
            assert_eq!(Command::from_text(&text).unwrap(), command);
        }
    }

    #[test]
    fn unknown_tag_is_a_protocol_error() {
        let mut text = [0u8; TEXT_LEN];
        text[..5].copy_from_slice(b"bogus");
        assert!(Command::from_text(&text).is_err());
    }
}
