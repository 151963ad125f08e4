use std::io::Cursor;
use std::net::Ipv4Addr;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use super::{CMD_DISCOVERY, CodecError};

const SN_LEN: usize = 32;
const NAME_LEN: usize = 64;
const OBJECT_LEN: usize = 64;
const VERSION_LEN: usize = 10;
const GIT_HASH_LEN: usize = 10;
const REVISION_LEN: usize = 10;
const VENDOR_LEN: usize = 32;
const MODEL_LEN: usize = 32;

/// cmd + sn + name + object + ip + port + uid + version + git hash +
/// revision + vendor + model.
pub const DISCOVERY_PACKET_LEN: usize = 1
    + SN_LEN
    + NAME_LEN
    + OBJECT_LEN
    + 4
    + 2
    + 4
    + VERSION_LEN
    + GIT_HASH_LEN
    + REVISION_LEN
    + VENDOR_LEN
    + MODEL_LEN;

/// Device announcement, command byte `0x00`. A single fixed-size struct
/// decoded in one pass; short buffers are an error and the packet is
/// dropped by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryPacket {
    pub serial_number: String,
    pub name: String,
    pub object: String,
    pub ip: Ipv4Addr,
    pub port: u16,
    pub uid: u32,
    pub version: String,
    pub git_hash: String,
    pub revision: String,
    pub vendor: String,
    pub model: String,
}

impl DiscoveryPacket {
    pub fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        if buf.len() < DISCOVERY_PACKET_LEN {
            return Err(CodecError::TooShort {
                actual: buf.len(),
                expected: DISCOVERY_PACKET_LEN,
            });
        }
        if buf[0] != CMD_DISCOVERY {
            return Err(CodecError::UnexpectedCommand(buf[0]));
        }

        let mut cur = Cursor::new(&buf[1..]);

        let serial_number = read_fixed_str(&mut cur, SN_LEN);
        let name = read_fixed_str(&mut cur, NAME_LEN);
        let object = read_fixed_str(&mut cur, OBJECT_LEN);

        let mut ip = [0u8; 4];
        for byte in &mut ip {
            *byte = cur.read_u8().unwrap_or(0);
        }

        // Reads cannot fail past this point: the length check above covers
        // the whole fixed layout.
        let port = cur.read_u16::<LittleEndian>().unwrap_or(0);
        let uid = cur.read_u32::<LittleEndian>().unwrap_or(0);

        let version = read_fixed_str(&mut cur, VERSION_LEN);
        let git_hash = read_fixed_str(&mut cur, GIT_HASH_LEN);
        let revision = read_fixed_str(&mut cur, REVISION_LEN);
        let vendor = read_fixed_str(&mut cur, VENDOR_LEN);
        let model = read_fixed_str(&mut cur, MODEL_LEN);

        Ok(Self {
            serial_number,
            name,
            object,
            ip: Ipv4Addr::from(ip),
            port,
            uid,
            version,
            git_hash,
            revision,
            vendor,
            model,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(DISCOVERY_PACKET_LEN);

        buf.push(CMD_DISCOVERY);
        write_fixed_str(&mut buf, &self.serial_number, SN_LEN);
        write_fixed_str(&mut buf, &self.name, NAME_LEN);
        write_fixed_str(&mut buf, &self.object, OBJECT_LEN);
        buf.extend_from_slice(&self.ip.octets());
        let _ = buf.write_u16::<LittleEndian>(self.port);
        let _ = buf.write_u32::<LittleEndian>(self.uid);
        write_fixed_str(&mut buf, &self.version, VERSION_LEN);
        write_fixed_str(&mut buf, &self.git_hash, GIT_HASH_LEN);
        write_fixed_str(&mut buf, &self.revision, REVISION_LEN);
        write_fixed_str(&mut buf, &self.vendor, VENDOR_LEN);
        write_fixed_str(&mut buf, &self.model, MODEL_LEN);

        buf
    }
}

/// Reads a fixed-width field and trims the trailing NUL padding
/// (C-string semantics).
fn read_fixed_str(cur: &mut Cursor<&[u8]>, len: usize) -> String {
    let mut raw = vec![0u8; len];
    for byte in &mut raw {
        *byte = cur.read_u8().unwrap_or(0);
    }
    let end = raw
        .iter()
        .rposition(|&b| b != 0)
        .map(|pos| pos + 1)
        .unwrap_or(0);
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

fn write_fixed_str(buf: &mut Vec<u8>, value: &str, len: usize) {
    let bytes = value.as_bytes();
    let take = bytes.len().min(len);
    buf.extend_from_slice(&bytes[..take]);
    buf.extend(std::iter::repeat_n(0u8, len - take));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DiscoveryPacket {
        DiscoveryPacket {
            serial_number: "SN-0042".into(),
            name: "Gate-A".into(),
            object: "Main entrance".into(),
            ip: Ipv4Addr::new(192, 168, 1, 50),
            port: 50000,
            uid: 7001,
            version: "1.2.3".into(),
            git_hash: "abcdef0".into(),
            revision: "rev4".into(),
            vendor: "Inforion".into(),
            model: "MD-6".into(),
        }
    }

    #[test]
    fn test_round_trip() {
        let packet = sample();
        let encoded = packet.encode();

        assert_eq!(encoded.len(), DISCOVERY_PACKET_LEN);
        assert_eq!(encoded[0], CMD_DISCOVERY);

        let decoded = DiscoveryPacket::decode(&encoded).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn test_nul_padding_is_transparent() {
        let encoded = sample().encode();
        // Name field starts right after cmd + serial number.
        let name_field = &encoded[1 + 32..1 + 32 + 64];
        assert_eq!(&name_field[..6], b"Gate-A");
        assert!(name_field[6..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_short_buffer_is_an_error() {
        let encoded = sample().encode();
        let err = DiscoveryPacket::decode(&encoded[..100]).unwrap_err();
        assert!(matches!(err, CodecError::TooShort { actual: 100, .. }));
    }

    #[test]
    fn test_wrong_command_byte() {
        let mut encoded = sample().encode();
        encoded[0] = 0x05;
        assert!(matches!(
            DiscoveryPacket::decode(&encoded),
            Err(CodecError::UnexpectedCommand(0x05))
        ));
    }

    #[test]
    fn test_overlong_string_is_truncated() {
        let mut packet = sample();
        packet.version = "0123456789ABCDEF".into();
        let decoded = DiscoveryPacket::decode(&packet.encode()).unwrap();
        assert_eq!(decoded.version, "0123456789");
    }
}
