//! Per-tower value types shared by the calibration stages

use std::fmt;

/// One of the three delta towers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tower {
    X,
    Y,
    Z,
}

impl Tower {
    /// Towers in the order trims are reported and normalized
    pub const ALL: [Tower; 3] = [Tower::X, Tower::Y, Tower::Z];
}

impl fmt::Display for Tower {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Tower::X => "X",
            Tower::Y => "Y",
            Tower::Z => "Z",
        };
        f.write_str(name)
    }
}

/// Averaged probe heights near each tower for one iteration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TowerMeasurement {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl TowerMeasurement {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Highest of the three pillar heights
    pub fn max(&self) -> f64 {
        self.x.max(self.y).max(self.z)
    }
}

/// Height of each tower relative to the highest one (all values ≤ 0)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TowerError {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl TowerError {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn get(&self, tower: Tower) -> f64 {
        match tower {
            Tower::X => self.x,
            Tower::Y => self.y,
            Tower::Z => self.z,
        }
    }

    /// Largest error magnitude across the towers
    pub fn max_abs(&self) -> f64 {
        self.x.abs().max(self.y.abs()).max(self.z.abs())
    }
}

/// Cumulative per-tower trim offsets sent with M666
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrimState {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl TrimState {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn get(&self, tower: Tower) -> f64 {
        match tower {
            Tower::X => self.x,
            Tower::Y => self.y,
            Tower::Z => self.z,
        }
    }

    pub fn set(&mut self, tower: Tower, value: f64) {
        match tower {
            Tower::X => self.x = value,
            Tower::Y => self.y = value,
            Tower::Z => self.z = value,
        }
    }

    /// Add the same offset to every tower
    pub fn shifted(&self, offset: f64) -> Self {
        Self::new(self.x + offset, self.y + offset, self.z + offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measurement_max() {
        assert_eq!(TowerMeasurement::new(0.9, 1.1, 1.0).max(), 1.1);
        assert_eq!(TowerMeasurement::new(-0.2, -0.4, -0.1).max(), -0.1);
    }

    #[test]
    fn test_error_max_abs() {
        assert_eq!(TowerError::new(0.0, -0.3, -0.05).max_abs(), 0.3);
        assert_eq!(TowerError::new(0.0, 0.0, 0.0).max_abs(), 0.0);
    }

    #[test]
    fn test_trim_get_set_shift() {
        let mut trims = TrimState::default();
        trims.set(Tower::Y, 0.25);
        assert_eq!(trims.get(Tower::Y), 0.25);
        assert_eq!(trims.shifted(-0.25), TrimState::new(-0.25, 0.0, -0.25));
    }

    #[test]
    fn test_tower_display_order() {
        let names: Vec<String> = Tower::ALL.iter().map(|t| t.to_string()).collect();
        assert_eq!(names, ["X", "Y", "Z"]);
    }
}
