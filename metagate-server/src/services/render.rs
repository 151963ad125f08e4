use crate::codec::{EventPacket, ZONE_SIDES, ZONES_PER_SIDE};

use super::ingest::ZoneRenderer;

/// Pixels per zone cell.
const CELL: usize = 32;

/// Renders the zone level grid as a binary PGM (P5) image, one grayscale
/// block per zone. Rows are zones top to bottom, columns are the two coil
/// sides.
#[derive(Debug, Default)]
pub struct PgmRenderer;

impl ZoneRenderer for PgmRenderer {
    fn render(&self, packet: &EventPacket) -> Option<Vec<u8>> {
        let width = ZONE_SIDES * CELL;
        let height = ZONES_PER_SIDE * CELL;

        let mut out = format!("P5\n{width} {height}\n255\n").into_bytes();
        out.reserve(width * height);
        for row in 0..height {
            for col in 0..width {
                out.push(packet.zones.level[row / CELL][col / CELL]);
            }
        }
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pgm_layout() {
        let mut packet = EventPacket::default();
        packet.zones.level[0][0] = 10;
        packet.zones.level[5][1] = 250;

        let image = PgmRenderer.render(&packet).unwrap();

        let header = format!("P5\n{} {}\n255\n", ZONE_SIDES * CELL, ZONES_PER_SIDE * CELL);
        assert!(image.starts_with(header.as_bytes()));

        let pixels = &image[header.len()..];
        assert_eq!(pixels.len(), ZONE_SIDES * CELL * ZONES_PER_SIDE * CELL);
        // Top-left block carries zone [0][0], bottom-right zone [5][1].
        assert_eq!(pixels[0], 10);
        assert_eq!(pixels[pixels.len() - 1], 250);
    }
}
