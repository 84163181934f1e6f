//! Which hex aggregation layer is shown and how it is colored.
//!
//! Everything here is a static lookup keyed by [`ActiveLayer`]; nothing is
//! computed from map state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::map::{MapEngine, MapSession};

pub const HEX_TESTS_LAYER: &str = "hex-fill-tests";
pub const HEX_THROUGHPUT_LAYER: &str = "hex-fill-throughput";
pub const HEX_STD_DEV_LAYER: &str = "hex-fill-std-dev";
pub const HEX_SUCCESS_RATE_LAYER: &str = "hex-fill-successrate";

/// Every layer id this controller toggles, in paint order.
pub const LAYER_REGISTRY: [&str; 4] = [
    HEX_TESTS_LAYER,
    HEX_THROUGHPUT_LAYER,
    HEX_STD_DEV_LAYER,
    HEX_SUCCESS_RATE_LAYER,
];

/// Attribute currently visualized on the hex layer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActiveLayer {
    #[default]
    #[serde(rename = "count")]
    Count,
    #[serde(rename = "throughput")]
    Throughput,
    #[serde(rename = "std_dev")]
    StdDev,
    #[serde(rename = "successrate")]
    SuccessRate,
}

impl ActiveLayer {
    pub const ALL: [ActiveLayer; 4] = [
        ActiveLayer::Count,
        ActiveLayer::Throughput,
        ActiveLayer::StdDev,
        ActiveLayer::SuccessRate,
    ];

    pub fn layer_id(self) -> &'static str {
        match self {
            ActiveLayer::Count => HEX_TESTS_LAYER,
            ActiveLayer::Throughput => HEX_THROUGHPUT_LAYER,
            ActiveLayer::StdDev => HEX_STD_DEV_LAYER,
            ActiveLayer::SuccessRate => HEX_SUCCESS_RATE_LAYER,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ActiveLayer::Count => "Test count",
            ActiveLayer::Throughput => "Throughput",
            ActiveLayer::StdDev => "Std. deviation",
            ActiveLayer::SuccessRate => "Success rate",
        }
    }

    /// Feature property the hex fill is colored by.
    pub fn property(self) -> &'static str {
        layer_style(self).property
    }
}

/// Layer id to layout visibility.
pub type LayerVisibilityConfig = BTreeMap<&'static str, bool>;

pub fn compute_visibility(active: ActiveLayer) -> LayerVisibilityConfig {
    let visible = active.layer_id();
    LAYER_REGISTRY
        .iter()
        .map(|&id| (id, id == visible))
        .collect()
}

/// Push the visibility for `active` to the map.
///
/// Layers missing from the map are skipped. Returns how many layers were
/// updated.
pub fn apply_visibility<E: MapEngine>(active: ActiveLayer, session: &mut MapSession<E>) -> usize {
    compute_visibility(active)
        .into_iter()
        .filter(|&(id, visible)| session.set_layout_visibility(id, visible))
        .count()
}

struct ColorStop {
    breakpoint: f64,
    color: &'static str,
}

struct LayerStyle {
    title: &'static str,
    property: &'static str,
    stops: &'static [ColorStop],
}

const COUNT_STOPS: &[ColorStop] = &[
    ColorStop { breakpoint: 0.0, color: "#f1eef6" },
    ColorStop { breakpoint: 10.0, color: "#bdc9e1" },
    ColorStop { breakpoint: 50.0, color: "#74a9cf" },
    ColorStop { breakpoint: 100.0, color: "#2b8cbe" },
    ColorStop { breakpoint: 500.0, color: "#045a8d" },
];

const THROUGHPUT_STOPS: &[ColorStop] = &[
    ColorStop { breakpoint: 0.0, color: "#d7191c" },
    ColorStop { breakpoint: 25.0, color: "#fdae61" },
    ColorStop { breakpoint: 100.0, color: "#ffffbf" },
    ColorStop { breakpoint: 250.0, color: "#a6d96a" },
    ColorStop { breakpoint: 1000.0, color: "#1a9641" },
];

const STD_DEV_STOPS: &[ColorStop] = &[
    ColorStop { breakpoint: 0.0, color: "#fef0d9" },
    ColorStop { breakpoint: 5.0, color: "#fdcc8a" },
    ColorStop { breakpoint: 20.0, color: "#fc8d59" },
    ColorStop { breakpoint: 50.0, color: "#e34a33" },
    ColorStop { breakpoint: 100.0, color: "#b30000" },
];

const SUCCESS_RATE_STOPS: &[ColorStop] = &[
    ColorStop { breakpoint: 0.0, color: "#d7191c" },
    ColorStop { breakpoint: 0.5, color: "#fdae61" },
    ColorStop { breakpoint: 0.75, color: "#ffffbf" },
    ColorStop { breakpoint: 0.9, color: "#a6d96a" },
    ColorStop { breakpoint: 0.99, color: "#1a9641" },
];

fn layer_style(active: ActiveLayer) -> &'static LayerStyle {
    static COUNT: LayerStyle = LayerStyle {
        title: "Speed tests per hexagon",
        property: "tests",
        stops: COUNT_STOPS,
    };
    static THROUGHPUT: LayerStyle = LayerStyle {
        title: "Median download (Mbps)",
        property: "throughput",
        stops: THROUGHPUT_STOPS,
    };
    static STD_DEV: LayerStyle = LayerStyle {
        title: "Download std. deviation (Mbps)",
        property: "std_dev",
        stops: STD_DEV_STOPS,
    };
    static SUCCESS_RATE: LayerStyle = LayerStyle {
        title: "Test success rate",
        property: "success_rate",
        stops: SUCCESS_RATE_STOPS,
    };
    match active {
        ActiveLayer::Count => &COUNT,
        ActiveLayer::Throughput => &THROUGHPUT,
        ActiveLayer::StdDev => &STD_DEV,
        ActiveLayer::SuccessRate => &SUCCESS_RATE,
    }
}

/// One legend row.
#[derive(Clone, Debug, PartialEq)]
pub struct LegendEntry {
    pub color: &'static str,
    pub label: String,
}

/// Legend for the active layer.
#[derive(Clone, Debug, PartialEq)]
pub struct ColorMapping {
    pub title: &'static str,
    pub entries: Vec<LegendEntry>,
}

pub fn color_mapping(active: ActiveLayer) -> ColorMapping {
    let style = layer_style(active);
    let entries = style
        .stops
        .iter()
        .enumerate()
        .map(|(idx, stop)| {
            let label = match style.stops.get(idx + 1) {
                Some(next) => format!("{} - {}", stop.breakpoint, next.breakpoint),
                None => format!("> {}", stop.breakpoint),
            };
            LegendEntry {
                color: stop.color,
                label,
            }
        })
        .collect();
    ColorMapping {
        title: style.title,
        entries,
    }
}

/// `(breakpoint, color)` pairs used as the fill layer's step expression.
pub fn color_stops(active: ActiveLayer) -> Vec<(f64, String)> {
    layer_style(active)
        .stops
        .iter()
        .map(|stop| (stop.breakpoint, stop.color.to_string()))
        .collect()
}

/// Step-function color for `value`; values below the first breakpoint take
/// the first color.
pub fn color_for_value(active: ActiveLayer, value: f64) -> &'static str {
    let stops = layer_style(active).stops;
    stops
        .iter()
        .rev()
        .find(|stop| value >= stop.breakpoint)
        .unwrap_or(&stops[0])
        .color
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throughput_shows_only_throughput_layer() {
        let visibility = compute_visibility(ActiveLayer::Throughput);
        let visible: Vec<_> = visibility
            .iter()
            .filter(|&(_, &shown)| shown)
            .map(|(&id, _)| id)
            .collect();
        assert_eq!(visible, vec![HEX_THROUGHPUT_LAYER]);
        assert_eq!(visibility.len(), LAYER_REGISTRY.len());
    }

    #[test]
    fn count_shows_only_tests_layer() {
        let visibility = compute_visibility(ActiveLayer::Count);
        assert_eq!(visibility[HEX_TESTS_LAYER], true);
        assert!(
            visibility
                .iter()
                .filter(|&(&id, _)| id != HEX_TESTS_LAYER)
                .all(|(_, &shown)| !shown)
        );
    }

    #[test]
    fn every_layer_has_exactly_one_visible_id() {
        for active in ActiveLayer::ALL {
            let visibility = compute_visibility(active);
            assert_eq!(visibility.values().filter(|&&shown| shown).count(), 1);
            assert_eq!(visibility[active.layer_id()], true);
        }
    }

    #[test]
    fn breakpoints_strictly_increase() {
        for active in ActiveLayer::ALL {
            let stops = color_stops(active);
            assert!(stops.windows(2).all(|pair| pair[0].0 < pair[1].0));
        }
    }

    #[test]
    fn legend_last_entry_reads_greater_than() {
        let legend = color_mapping(ActiveLayer::Throughput);
        assert_eq!(legend.entries.len(), 5);
        assert_eq!(legend.entries[0].label, "0 - 25");
        assert_eq!(legend.entries.last().unwrap().label, "> 1000");
    }

    #[test]
    fn color_for_value_steps_at_breakpoints() {
        assert_eq!(color_for_value(ActiveLayer::Count, -1.0), "#f1eef6");
        assert_eq!(color_for_value(ActiveLayer::Count, 10.0), "#bdc9e1");
        assert_eq!(color_for_value(ActiveLayer::Count, 49.9), "#bdc9e1");
        assert_eq!(color_for_value(ActiveLayer::Count, 10_000.0), "#045a8d");
    }

    #[test]
    fn active_layer_uses_wire_names() {
        let encoded = serde_json::to_string(&ActiveLayer::SuccessRate).unwrap();
        assert_eq!(encoded, "\"successrate\"");
        let decoded: ActiveLayer = serde_json::from_str("\"std_dev\"").unwrap();
        assert_eq!(decoded, ActiveLayer::StdDev);
    }
}
