//! Signal strength classification for the network link
//!
//! Maps a raw RSSI value (dBm) to the operator-facing quality tier shown in
//! link reports. Pure function, no state.

use std::fmt;

/// Quality tier derived from link signal strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalQuality {
    Amazing,
    VeryGood,
    Okay,
    NotGood,
    Unusable,
}

impl SignalQuality {
    /// Classify an RSSI value in dBm.
    ///
    /// Thresholds are exclusive lower bounds evaluated top-down; the first
    /// match wins, so boundary values land on the lower tier.
    pub fn classify(rssi_dbm: i32) -> Self {
        if rssi_dbm > -67 {
            SignalQuality::Amazing
        } else if rssi_dbm > -70 {
            SignalQuality::VeryGood
        } else if rssi_dbm > -80 {
            SignalQuality::Okay
        } else if rssi_dbm > -90 {
            SignalQuality::NotGood
        } else {
            SignalQuality::Unusable
        }
    }

    /// Human-readable label used in link reports.
    pub fn label(&self) -> &'static str {
        match self {
            SignalQuality::Amazing => "Amazing",
            SignalQuality::VeryGood => "Very Good",
            SignalQuality::Okay => "Okay",
            SignalQuality::NotGood => "Not Good",
            SignalQuality::Unusable => "Unusable",
        }
    }
}

impl fmt::Display for SignalQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
