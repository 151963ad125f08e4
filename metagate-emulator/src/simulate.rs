use rand::Rng;
use serde_json::{Value, json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::info;

use crate::command::Command;

/// Synthetic gate state. Counters only move forward, the way a real
/// detector's do between calibrations.
#[derive(Debug, Default)]
pub struct GateSimulator {
    device_id: String,
    in_count: u32,
    out_count: u32,
    level: u32,
    alarm_pending: bool,
}

impl GateSimulator {
    pub fn new(device_id: String) -> Self {
        Self {
            device_id,
            level: 120,
            ..Self::default()
        }
    }

    /// Advances the simulation one step and renders the status report
    /// the gateway expects.
    pub fn next_status(&mut self) -> Value {
        let mut rng = rand::rng();

        self.in_count += rng.random_range(0..3);
        self.out_count += rng.random_range(0..3);
        self.out_count = self.out_count.min(self.in_count);
        self.level = self.level.saturating_add_signed(rng.random_range(-5..=5));

        let alarm = self.alarm_pending || rng.random_range(0..10) == 0;
        self.alarm_pending = false;

        json!({
            "ts": OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default(),
            "state": if alarm { 2 } else { 1 },
            "in": self.in_count,
            "out": self.out_count,
            "inside": self.in_count - self.out_count,
            "speed": rng.random_range(0.8..1.6_f32),
            "level": self.level,
            "alarm": alarm,
        })
    }

    pub fn apply_command(&mut self, command: &Command) {
        info!(device_id = %self.device_id, id = %command.id, kind = %command.kind, "command received");
        match command.kind.as_str() {
            "reboot" => {
                self.in_count = 0;
                self.out_count = 0;
                self.level = 120;
            }
            "alarmtest" => self.alarm_pending = true,
            "setparam" => {
                if let Some(level) = command
                    .payload
                    .as_ref()
                    .and_then(|payload| payload.get("level"))
                    .and_then(Value::as_u64)
                {
                    self.level = level as u32;
                }
            }
            _ => info!(kind = %command.kind, "command ignored"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(kind: &str, payload: Option<Value>) -> Command {
        Command {
            id: String::from("c1"),
            kind: kind.to_string(),
            payload,
        }
    }

    #[test]
    fn test_counters_are_monotonic_and_consistent() {
        let mut sim = GateSimulator::new(String::from("gate-001"));
        let mut last_in = 0;
        for _ in 0..50 {
            let status = sim.next_status();
            let in_count = status["in"].as_u64().unwrap();
            let out_count = status["out"].as_u64().unwrap();
            assert!(in_count >= last_in);
            assert!(out_count <= in_count);
            assert_eq!(status["inside"].as_u64().unwrap(), in_count - out_count);
            last_in = in_count;
        }
    }

    #[test]
    fn test_reboot_resets_counters() {
        let mut sim = GateSimulator::new(String::from("gate-001"));
        sim.next_status();
        sim.apply_command(&command("reboot", None));
        assert_eq!(sim.in_count, 0);
        assert_eq!(sim.out_count, 0);
    }

    #[test]
    fn test_alarmtest_forces_alarm() {
        let mut sim = GateSimulator::new(String::from("gate-001"));
        sim.apply_command(&command("alarmtest", None));
        let status = sim.next_status();
        assert_eq!(status["state"].as_u64().unwrap(), 2);
        assert!(status["alarm"].as_bool().unwrap());
    }

    #[test]
    fn test_setparam_level() {
        let mut sim = GateSimulator::new(String::from("gate-001"));
        sim.apply_command(&command("setparam", Some(json!({ "level": 200 }))));
        assert_eq!(sim.level, 200);
    }
}
