use crate::geo::normalize_degrees;

/// Gyro-based heading aligned to magnetic north.
///
/// The gyro ("game rotation") yaw is smooth but has an arbitrary zero. Until
/// calibration is frozen, every magnetic yaw sample re-estimates the offset
/// between the two; afterwards only the gyro stream moves the heading, which
/// keeps steel and electronics indoors from pulling it around.
#[derive(Debug, Clone, Default)]
pub struct HeadingTracker {
    gyro_yaw: Option<f64>,
    offset: f64,
    calibrated: bool,
    frozen: bool,
}

impl HeadingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update_gyro(&mut self, yaw_deg: f64) {
        self.gyro_yaw = Some(yaw_deg);
    }

    /// Returns true when the offset was updated.
    pub fn update_magnetic(&mut self, yaw_deg: f64) -> bool {
        if self.frozen {
            return false;
        }
        match self.gyro_yaw {
            Some(gyro) => {
                self.offset = gyro - yaw_deg;
                self.calibrated = true;
                true
            }
            None => false,
        }
    }

    /// Stop (or resume) accepting magnetic corrections.
    pub fn set_frozen(&mut self, frozen: bool) {
        if frozen && !self.frozen {
            log::debug!("Heading offset frozen at {:.1}°", self.offset);
        }
        self.frozen = frozen;
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Heading in [0, 360), or `None` before any gyro sample.
    pub fn heading(&self) -> Option<f64> {
        self.gyro_yaw.map(|yaw| normalize_degrees(yaw - self.offset))
    }
}
