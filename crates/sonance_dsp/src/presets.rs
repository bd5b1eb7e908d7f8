//! Built-in Equalizer Presets
//!
//! Values are slider positions (-100..=100), the same units
//! `set_equalizer_params` takes; see [`crate::slider_to_gain_db`].

use crate::eq::EQ_BAND_COUNT;

/// Named preset: (name, preamp, band sliders)
pub type Preset = (&'static str, i32, [i32; EQ_BAND_COUNT]);

/// List of built-in presets
pub const PRESETS: &[Preset] = &[
    ("Flat", 0, [0; EQ_BAND_COUNT]),
    ("Classical", 0, [0, 0, 0, 0, 0, 0, -40, -40, -40, -50]),
    ("Club", 0, [0, 0, 20, 30, 30, 30, 20, 0, 0, 0]),
    ("Dance", 0, [50, 35, 10, 0, 0, -30, -40, -40, 0, 0]),
    ("Full Bass", 0, [70, 70, 70, 40, 20, -45, -50, -55, -55, -55]),
    ("Full Treble", 0, [-50, -50, -50, -25, 15, 55, 80, 80, 80, 85]),
    ("Full Bass + Treble", 0, [35, 30, 0, -40, -25, 10, 45, 55, 60, 60]),
    ("Laptop/Headphones", 0, [25, 50, 25, -20, 0, -30, -40, -40, 0, 0]),
    ("Large Hall", 0, [50, 50, 30, 30, 0, -25, -25, -25, 0, 0]),
    ("Live", 0, [-25, 0, 20, 25, 30, 30, 20, 15, 15, 10]),
    ("Party", 0, [35, 35, 0, 0, 0, 0, 0, 0, 35, 35]),
    ("Pop", 0, [-10, 25, 35, 40, 25, -5, -15, -15, -10, -10]),
    ("Reggae", 0, [0, 0, -5, -30, 0, -35, -35, 0, 0, 0]),
    ("Rock", 0, [40, 25, -30, -40, -20, 20, 45, 55, 55, 55]),
    ("Soft", 0, [25, 10, -5, -15, -5, 20, 45, 50, 55, 60]),
    ("Ska", 0, [-15, -25, -25, -5, 20, 30, 45, 50, 55, 50]),
    ("Techno", 0, [40, 30, 0, -30, -25, 0, 40, 50, 50, 45]),
];

/// Look up a preset by name (case-insensitive)
pub fn find_preset(name: &str) -> Option<&'static Preset> {
    PRESETS.iter().find(|(n, _, _)| n.eq_ignore_ascii_case(name))
}
