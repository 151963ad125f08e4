use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};

use super::{CMD_EVENT, CodecError};

/// Zone grid dimensions are fixed at compile time by the detector
/// firmware: six zone rows, two coil sides.
pub const ZONES_PER_SIDE: usize = 6;
pub const ZONE_SIDES: usize = 2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    #[serde(rename = "type")]
    pub kind: u32,
    pub class: u32,
    pub object: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetalCounters {
    pub alarms: u32,
    pub alarms_in: u32,
    pub alarms_out: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectorStatus {
    pub state: u32,
    #[serde(rename = "in")]
    pub in_count: u32,
    #[serde(rename = "out")]
    pub out_count: u32,
    pub inside: u32,
    pub speed: f32,
    pub calib_timeout: u32,
    pub level: u32,
    pub lights: u32,
    pub classification: Classification,
    pub metal: MetalCounters,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneConfig {
    pub zones_h: u32,
    pub zones_v: u32,
    pub total: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectorZones {
    pub config: ZoneConfig,
    pub alarm: [[Classification; ZONE_SIDES]; ZONES_PER_SIDE],
    pub level: [[u8; ZONE_SIDES]; ZONES_PER_SIDE],
    pub cnt: [[u32; ZONE_SIDES]; ZONES_PER_SIDE],
}

/// Detector status + zones notification, command byte `0x05`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EventPacket {
    pub ts: u32,
    pub status: DetectorStatus,
    pub zones: DetectorZones,
}

impl EventPacket {
    /// Decodes a packet, tolerating truncation: any field past the end of
    /// the buffer reads as zero. The zones block sits at the tail of the
    /// layout and is the part most often cut short on the wire; only a
    /// buffer too short for the command byte and timestamp is an error.
    pub fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        if buf.len() < 5 {
            return Err(CodecError::TooShort {
                actual: buf.len(),
                expected: 5,
            });
        }
        if buf[0] != CMD_EVENT {
            return Err(CodecError::UnexpectedCommand(buf[0]));
        }

        let mut cur = Cursor::new(&buf[1..]);

        let ts = read_u32(&mut cur);

        let status = DetectorStatus {
            state: read_u32(&mut cur),
            in_count: read_u32(&mut cur),
            out_count: read_u32(&mut cur),
            inside: read_u32(&mut cur),
            speed: cur.read_f32::<LittleEndian>().unwrap_or(0.0),
            calib_timeout: read_u32(&mut cur),
            level: read_u32(&mut cur),
            lights: read_u32(&mut cur),
            classification: read_classification(&mut cur),
            metal: MetalCounters {
                alarms: read_u32(&mut cur),
                alarms_in: read_u32(&mut cur),
                alarms_out: read_u32(&mut cur),
            },
        };

        let mut zones = DetectorZones {
            config: ZoneConfig {
                zones_h: read_u32(&mut cur),
                zones_v: read_u32(&mut cur),
                total: read_u32(&mut cur),
            },
            ..DetectorZones::default()
        };
        for row in &mut zones.alarm {
            for cell in row {
                *cell = read_classification(&mut cur);
            }
        }
        for row in &mut zones.level {
            for cell in row {
                *cell = cur.read_u8().unwrap_or(0);
            }
        }
        for row in &mut zones.cnt {
            for cell in row {
                *cell = read_u32(&mut cur);
            }
        }

        Ok(Self { ts, status, zones })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();

        buf.push(CMD_EVENT);
        write_u32(&mut buf, self.ts);

        write_u32(&mut buf, self.status.state);
        write_u32(&mut buf, self.status.in_count);
        write_u32(&mut buf, self.status.out_count);
        write_u32(&mut buf, self.status.inside);
        let _ = buf.write_f32::<LittleEndian>(self.status.speed);
        write_u32(&mut buf, self.status.calib_timeout);
        write_u32(&mut buf, self.status.level);
        write_u32(&mut buf, self.status.lights);
        write_classification(&mut buf, &self.status.classification);
        write_u32(&mut buf, self.status.metal.alarms);
        write_u32(&mut buf, self.status.metal.alarms_in);
        write_u32(&mut buf, self.status.metal.alarms_out);

        write_u32(&mut buf, self.zones.config.zones_h);
        write_u32(&mut buf, self.zones.config.zones_v);
        write_u32(&mut buf, self.zones.config.total);
        for row in &self.zones.alarm {
            for cell in row {
                write_classification(&mut buf, cell);
            }
        }
        for row in &self.zones.level {
            for cell in row {
                buf.push(*cell);
            }
        }
        for row in &self.zones.cnt {
            for cell in row {
                write_u32(&mut buf, *cell);
            }
        }

        buf
    }
}

fn read_u32(cur: &mut Cursor<&[u8]>) -> u32 {
    cur.read_u32::<LittleEndian>().unwrap_or(0)
}

fn read_classification(cur: &mut Cursor<&[u8]>) -> Classification {
    Classification {
        kind: read_u32(cur),
        class: read_u32(cur),
        object: read_u32(cur),
    }
}

fn write_u32(buf: &mut Vec<u8>, value: u32) {
    let _ = buf.write_u32::<LittleEndian>(value);
}

fn write_classification(buf: &mut Vec<u8>, value: &Classification) {
    write_u32(buf, value.kind);
    write_u32(buf, value.class);
    write_u32(buf, value.object);
}
