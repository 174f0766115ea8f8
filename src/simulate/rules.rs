//! Keyword rules that pick the simulated effects for an instruction.

use image::Rgb;

/// A visual effect applied to the whole surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Effect {
    /// Flat color overlay at the given opacity.
    Tint { color: Rgb<u8>, alpha: f32 },
    /// Scattered diagonal rain streaks.
    Rain,
}

#[derive(Debug)]
pub(crate) struct Rule {
    pub name: &'static str,
    pub keywords: &'static [&'static str],
    pub effect: Effect,
}

impl Rule {
    /// `lowered` must already be lowercase.
    pub fn matches(&self, lowered: &str) -> bool {
        self.keywords.iter().any(|k| lowered.contains(k))
    }
}

/// Applied in order; every matching rule contributes.
pub(crate) const RULES: &[Rule] = &[
    Rule {
        name: "warm",
        keywords: &["sunset", "warm", "golden", "orange", "autumn"],
        effect: Effect::Tint {
            color: Rgb([255, 165, 0]),
            alpha: 0.2,
        },
    },
    Rule {
        name: "cool",
        keywords: &["cool", "blue", "winter", "cold", "ice"],
        effect: Effect::Tint {
            color: Rgb([0, 100, 255]),
            alpha: 0.2,
        },
    },
    Rule {
        name: "dark",
        keywords: &["dark", "night", "shadow", "moody"],
        effect: Effect::Tint {
            color: Rgb([0, 0, 0]),
            alpha: 0.3,
        },
    },
    Rule {
        name: "bright",
        keywords: &["bright", "light", "sunny", "day"],
        effect: Effect::Tint {
            color: Rgb([255, 255, 255]),
            alpha: 0.2,
        },
    },
    Rule {
        name: "vintage",
        keywords: &["vintage", "retro", "old", "sepia"],
        effect: Effect::Tint {
            color: Rgb([112, 66, 20]),
            alpha: 0.3,
        },
    },
    Rule {
        name: "neon",
        keywords: &["neon", "cyberpunk", "glow"],
        effect: Effect::Tint {
            color: Rgb([255, 0, 255]),
            alpha: 0.15,
        },
    },
    Rule {
        name: "rain",
        keywords: &["rain", "storm"],
        effect: Effect::Rain,
    },
];

/// Rules matching `instruction`, in application order.
pub(crate) fn matching(instruction: &str) -> impl Iterator<Item = &'static Rule> {
    let lowered = instruction.to_lowercase();
    RULES.iter().filter(move |rule| rule.matches(&lowered))
}
