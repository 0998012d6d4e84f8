//! Turns successive orientation samples into discrete jog events.

/// One reading of the pointer's three orientation angles, in sensor units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OrientationSample {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl OrientationSample {
    /// Decodes the characteristic payload: x, y, z as consecutive
    /// little-endian f32s. Extra trailing bytes are ignored; short reads
    /// yield nothing.
    pub fn from_le_bytes(data: &[u8]) -> Option<OrientationSample> {
        if data.len() < 12 {
            return None;
        }
        let angle = |i: usize| f32::from_le_bytes(data[i..i + 4].try_into().unwrap());
        Some(OrientationSample {
            x: angle(0),
            y: angle(4),
            z: angle(8),
        })
    }
}

/// The controller's five jog axes. A..C are driven by the pointer,
/// D and E only by explicit key presses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    A,
    B,
    C,
    D,
    E,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Polarity {
    Positive,
    Negative,
}

/// Whether jog axes refer to individual joints or Cartesian directions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MotionSpace {
    Joint,
    #[default]
    Coordinate,
}

impl MotionSpace {
    pub fn toggled(self) -> MotionSpace {
        match self {
            MotionSpace::Joint => MotionSpace::Coordinate,
            MotionSpace::Coordinate => MotionSpace::Joint,
        }
    }
}

/// A discrete directional jog request. Constructed, dispatched, discarded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JogEvent {
    pub axis: Axis,
    pub polarity: Polarity,
    pub space: MotionSpace,
}

/// Delta-threshold decoder. Keeps exactly one previous sample; each new
/// sample is compared per axis and then unconditionally becomes the new
/// previous sample.
pub struct GestureDecoder {
    prev: Option<OrientationSample>,
    threshold: f32,
}

impl GestureDecoder {
    pub fn new(threshold: f32) -> GestureDecoder {
        GestureDecoder {
            prev: None,
            threshold,
        }
    }

    /// Emits zero to three events, axes evaluated independently in x, y, z
    /// order. The threshold is exclusive in both directions: a delta of
    /// exactly ±threshold fires nothing. The very first sample only seeds
    /// the history.
    pub fn decode(&mut self, next: OrientationSample, space: MotionSpace) -> Vec<JogEvent> {
        let Some(prev) = self.prev.replace(next) else {
            return Vec::new();
        };

        let deltas = [
            (Axis::A, next.x - prev.x),
            (Axis::B, next.y - prev.y),
            (Axis::C, next.z - prev.z),
        ];

        let mut events = Vec::new();
        for (axis, delta) in deltas {
            let polarity = if delta > self.threshold {
                Polarity::Positive
            } else if delta < -self.threshold {
                Polarity::Negative
            } else {
                continue;
            };
            events.push(JogEvent {
                axis,
                polarity,
                space,
            });
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample(x: f32, y: f32, z: f32) -> OrientationSample {
        OrientationSample { x, y, z }
    }

    fn seeded(prev: OrientationSample) -> GestureDecoder {
        let mut decoder = GestureDecoder::new(1.0);
        assert!(decoder
            .decode(prev, MotionSpace::Coordinate)
            .is_empty());
        decoder
    }

    #[test]
    fn first_sample_only_seeds_history() {
        let mut decoder = GestureDecoder::new(1.0);
        // Way above threshold relative to nothing at all.
        let events = decoder.decode(sample(50.0, -50.0, 50.0), MotionSpace::Coordinate);
        assert!(events.is_empty());
        assert_eq!(decoder.prev, Some(sample(50.0, -50.0, 50.0)));
    }

    #[test]
    fn positive_x_step_jogs_a_forward() {
        // prev = origin, next.x = 2.5: one positive A event.
        let mut decoder = seeded(sample(0.0, 0.0, 0.0));
        let events = decoder.decode(sample(2.5, 0.0, 0.0), MotionSpace::Coordinate);
        assert_eq!(
            events,
            vec![JogEvent {
                axis: Axis::A,
                polarity: Polarity::Positive,
                space: MotionSpace::Coordinate,
            }]
        );
    }

    #[test]
    fn simultaneous_deltas_fire_in_axis_order() {
        // x falls, y rises: A-negative before B-positive.
        let mut decoder = seeded(sample(0.0, 0.0, 0.0));
        let events = decoder.decode(sample(-3.0, 2.0, 0.0), MotionSpace::Joint);
        assert_eq!(events.len(), 2);
        assert_eq!((events[0].axis, events[0].polarity), (Axis::A, Polarity::Negative));
        assert_eq!((events[1].axis, events[1].polarity), (Axis::B, Polarity::Positive));
        assert!(events.iter().all(|e| e.space == MotionSpace::Joint));
    }

    #[test]
    fn threshold_is_exclusive() {
        let mut decoder = seeded(sample(0.0, 0.0, 0.0));
        assert!(decoder
            .decode(sample(1.0, -1.0, 0.0), MotionSpace::Coordinate)
            .is_empty());
    }

    #[test]
    fn history_updates_even_without_events() {
        let mut decoder = seeded(sample(0.0, 0.0, 0.0));
        decoder.decode(sample(0.5, 0.5, 0.5), MotionSpace::Coordinate);
        assert_eq!(decoder.prev, Some(sample(0.5, 0.5, 0.5)));

        // A slow drift below threshold per step never fires, but the
        // history still tracks every step.
        decoder.decode(sample(1.4, 1.4, 1.4), MotionSpace::Coordinate);
        assert_eq!(decoder.prev, Some(sample(1.4, 1.4, 1.4)));
    }

    #[test]
    fn decode_characteristic_payload() {
        let mut data = Vec::new();
        data.extend_from_slice(&1.5f32.to_le_bytes());
        data.extend_from_slice(&(-2.0f32).to_le_bytes());
        data.extend_from_slice(&0.25f32.to_le_bytes());
        assert_eq!(
            OrientationSample::from_le_bytes(&data),
            Some(sample(1.5, -2.0, 0.25))
        );

        // Trailing bytes are fine, short reads are not.
        data.push(0xFF);
        assert!(OrientationSample::from_le_bytes(&data).is_some());
        assert_eq!(OrientationSample::from_le_bytes(&data[..11]), None);
        assert_eq!(OrientationSample::from_le_bytes(&[]), None);
    }

    proptest! {
        // Deltas within the closed [-1, 1] band on every axis never fire.
        #[test]
        fn no_events_within_threshold(
            px in -100.0..100.0f32, py in -100.0..100.0f32, pz in -100.0..100.0f32,
            dx in -1.0..=1.0f32, dy in -1.0..=1.0f32, dz in -1.0..=1.0f32,
        ) {
            let prev = sample(px, py, pz);
            let mut decoder = seeded(prev);
            let next = sample(px + dx, py + dy, pz + dz);
            // Floating-point addition can round the realized delta just past
            // the threshold; only assert on the deltas the decoder sees.
            prop_assume!((next.x - prev.x).abs() <= 1.0);
            prop_assume!((next.y - prev.y).abs() <= 1.0);
            prop_assume!((next.z - prev.z).abs() <= 1.0);
            let events = decoder.decode(next, MotionSpace::Coordinate);
            prop_assert!(events.is_empty());
            prop_assert_eq!(decoder.prev, Some(next));
        }

        // An x delta past the threshold fires exactly one A event,
        // whatever y and z do.
        #[test]
        fn x_step_fires_one_a_event(
            px in -100.0..100.0f32, py in -100.0..100.0f32, pz in -100.0..100.0f32,
            dx in 1.01..50.0f32, dy in -50.0..50.0f32, dz in -50.0..50.0f32,
        ) {
            let prev = sample(px, py, pz);
            let mut decoder = seeded(prev);
            let next = sample(px + dx, py + dy, pz + dz);
            prop_assume!(next.x - prev.x > 1.0);
            let events = decoder.decode(next, MotionSpace::Coordinate);
            let a_events: Vec<_> = events.iter().filter(|e| e.axis == Axis::A).collect();
            prop_assert_eq!(a_events.len(), 1);
            prop_assert_eq!(a_events[0].polarity, Polarity::Positive);
        }
    }
}
