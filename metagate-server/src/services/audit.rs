use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::warn;

use crate::codec::EventPacket;

use super::ingest::DetectionAudit;

const HEADER: [&str; 10] = [
    "Time",
    "DeviceID",
    "IP",
    "State",
    "In",
    "Out",
    "Inside",
    "Speed",
    "Level",
    "MetalAlarms",
];

/// Append-only CSV audit trail of detector events, one row per packet.
/// Semicolon-separated for spreadsheet imports in locales with comma
/// decimals.
pub struct CsvAudit {
    writer: Mutex<csv::Writer<std::fs::File>>,
}

impl CsvAudit {
    pub fn open(path: impl AsRef<Path>) -> csv::Result<Self> {
        let path = path.as_ref();
        let is_new = !path.exists();
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;

        let mut writer = csv::WriterBuilder::new()
            .delimiter(b';')
            .has_headers(false)
            .from_writer(file);
        if is_new {
            writer.write_record(HEADER)?;
            writer.flush()?;
        }

        Ok(Self {
            writer: Mutex::new(writer),
        })
    }

    fn write_row(&self, device_id: &str, ip: &str, packet: &EventPacket) -> csv::Result<()> {
        let time = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();

        let mut writer = match self.writer.lock() {
            Ok(writer) => writer,
            Err(poisoned) => poisoned.into_inner(),
        };
        writer.write_record([
            time.as_str(),
            device_id,
            ip,
            &packet.status.state.to_string(),
            &packet.status.in_count.to_string(),
            &packet.status.out_count.to_string(),
            &packet.status.inside.to_string(),
            &format!("{:.2}", packet.status.speed),
            &packet.status.level.to_string(),
            &packet.status.metal.alarms.to_string(),
        ])?;
        writer.flush()?;
        Ok(())
    }
}

impl DetectionAudit for CsvAudit {
    fn record(&self, device_id: &str, ip: &str, packet: &EventPacket) {
        if let Err(err) = self.write_row(device_id, ip, packet) {
            warn!(%err, "audit row not written");
        }
    }
}
