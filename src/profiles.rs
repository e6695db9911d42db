use crate::base::color::{self, Color};
use chrono::{Local, NaiveTime, Timelike};
use serde_derive::{Deserialize, Serialize};

/// Time-of-day color profiles: one color for the morning, one for the
/// evening. The switch point is noon, matching the original installation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileSchedule {
    pub morning: Color,
    pub evening: Color,
}

impl Default for ProfileSchedule {
    fn default() -> Self {
        ProfileSchedule {
            morning: color::COOL_WHITE,
            evening: color::WARM_WHITE,
        }
    }
}

impl ProfileSchedule {
    /// Profile color for a given local time. Pure, no clock access.
    pub fn active_color_at(&self, time: NaiveTime) -> Color {
        if time.hour() < 12 {
            self.morning
        } else {
            self.evening
        }
    }

    pub fn active_color_now(&self) -> Color {
        self.active_color_at(Local::now().time())
    }
}
