//! A producer emitting two payload types through one `publish` call site.
//!
//! Run with:
//!   cargo run --example sensor

use sigprims::{publish, Bus, Produces, Publisher};

/// Pressure in hectopascals.
#[derive(Debug, Clone, Copy)]
struct Pressure(f32);

/// Raw ADC count.
#[derive(Debug, Clone, Copy)]
struct AdcCount(i32);

struct Barometer {
    pressure: Publisher<Pressure>,
    counts: Publisher<AdcCount>,
}

impl Produces<Pressure> for Barometer {
    fn publisher(&self) -> &Publisher<Pressure> {
        &self.pressure
    }
}

impl Produces<AdcCount> for Barometer {
    fn publisher(&self) -> &Publisher<AdcCount> {
        &self.counts
    }
}

impl Barometer {
    fn sample(&self, raw: i32) {
        publish(self, &AdcCount(raw));
        publish(self, &Pressure(raw as f32 * 0.25));
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let bus = Bus::new();
    bus.declare::<Pressure>("Pressure")?;
    bus.declare::<AdcCount>("AdcCount")?;

    let _pressure = bus.subscribe_filtered(
        |p: &Pressure| eprintln!("pressure {:.2} hPa", p.0),
        |p: &Pressure| p.0 > 1000.0,
    )?;
    let _counts = bus.subscribe_fn(|c: &AdcCount| eprintln!("adc {}", c.0))?;

    let barometer = Barometer {
        pressure: bus.publisher()?,
        counts: bus.publisher()?,
    };
    for raw in [3990, 4013, 4100] {
        barometer.sample(raw);
    }

    for key in bus.keys() {
        eprintln!("{key}");
    }
    Ok(())
}
