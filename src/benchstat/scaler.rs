/// Formats values of one metric with a fixed unit prefix and precision
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scaler {
    factor: f64,
    precision: usize,
    suffix: &'static str,
}

const TIME: &[(f64, &str)] = &[(1e9, "s"), (1e6, "ms"), (1e3, "µs"), (1.0, "ns")];
const BYTES: &[(f64, &str)] = &[(1e9, "GB"), (1e6, "MB"), (1e3, "kB"), (1.0, "B")];
const SPEED: &[(f64, &str)] = &[(1e3, "GB/s"), (1.0, "MB/s")];
const COUNT: &[(f64, &str)] = &[(1e9, "G"), (1e6, "M"), (1e3, "k"), (1.0, "")];

impl Scaler {
    /// Pick a scale for `unit` so that `reference` prints with about three significant digits
    pub fn new(reference: f64, unit: &str) -> Self {
        let ladder = match unit {
            "ns/op" => TIME,
            "B/op" => BYTES,
            "MB/s" => SPEED,
            _ => COUNT,
        };
        let x = reference.abs();

        let (factor, suffix) = ladder
            .iter()
            .copied()
            .find(|(factor, _)| x / factor >= 0.995)
            .unwrap_or(ladder[ladder.len() - 1]);

        let scaled = x / factor;
        let precision = if scaled >= 99.5 {
            0
        } else if scaled >= 9.95 {
            1
        } else {
            2
        };

        Self {
            factor,
            precision,
            suffix,
        }
    }

    pub fn format(&self, value: f64) -> String {
        format!("{:.*}{}", self.precision, value / self.factor, self.suffix)
    }
}
