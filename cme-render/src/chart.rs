//! Detail Chart Renderer: ordered, labeled percentage bars for one feature.

use cme_census::feature::{DetailDataset, FeatureId};
use cme_census::variables::CohortTable;
use log::debug;
use serde::Serialize;
use std::fmt::Write;

/// Shown before the first click.
pub const PLACEHOLDER: &str = "Click a tract on the map to see its breakdown";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bar {
    pub code: String,
    pub label: String,
    /// Percent, 0-100.
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chart {
    pub title: String,
    pub feature_id: FeatureId,
    pub region: String,
    pub bars: Vec<Bar>,
    pub y_axis_label: String,
    pub y_max: f64,
    pub tick_suffix: String,
}

/// What the chart surface should display.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChartView {
    Placeholder { message: String },
    Bars(Chart),
}

impl ChartView {
    pub fn placeholder(message: impl Into<String>) -> Self {
        ChartView::Placeholder {
            message: message.into(),
        }
    }

    pub fn chart(&self) -> Option<&Chart> {
        match self {
            ChartView::Bars(chart) => Some(chart),
            ChartView::Placeholder { .. } => None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, ChartView::Placeholder { .. })
    }
}

impl Default for ChartView {
    fn default() -> Self {
        ChartView::placeholder(PLACEHOLDER)
    }
}

/// Smallest multiple of 5 at or above the tallest bar, within [5, 100].
fn axis_max(bars: &[Bar]) -> f64 {
    let tallest = bars.iter().map(|b| b.value).fold(0.0_f64, f64::max);
    ((tallest / 5.0).ceil() * 5.0).clamp(5.0, 100.0)
}

/// Render bars in the table's order with the table's labels. Rows whose code
/// is not in the table are dropped.
pub fn render(detail: Option<&DetailDataset>, table: &CohortTable) -> ChartView {
    let detail = match detail {
        Some(d) => d,
        None => return ChartView::default(),
    };
    let bars: Vec<Bar> = table
        .categories
        .iter()
        .filter_map(|category| {
            detail
                .rows
                .iter()
                .find(|row| row.category == category.code)
                .map(|row| Bar {
                    code: category.code.clone(),
                    label: category.label.clone(),
                    value: row.percentage.clamp(0.0, 100.0),
                })
        })
        .collect();
    if bars.len() < detail.rows.len() {
        debug!(
            "Dropped {} detail rows outside the display order for {}",
            detail.rows.len() - bars.len(),
            detail.feature_id
        );
    }
    ChartView::Bars(Chart {
        title: format!("{}, tract {}", table.title, detail.feature_id),
        feature_id: detail.feature_id.clone(),
        region: detail.region.name.clone(),
        y_max: axis_max(&bars),
        bars,
        y_axis_label: "Percent of population".to_string(),
        tick_suffix: "%".to_string(),
    })
}

impl Chart {
    /// Horizontal text bars, `width` characters at `y_max`.
    pub fn to_text(&self, width: usize) -> String {
        let label_width = self.bars.iter().map(|b| b.label.len()).max().unwrap_or(0);
        let mut out = String::new();
        let _ = writeln!(out, "{} ({})", self.title, self.region);
        for bar in &self.bars {
            let filled = ((bar.value / self.y_max) * width as f64).round() as usize;
            let _ = writeln!(
                out,
                "{:>lw$} | {} {:.1}{}",
                bar.label,
                "#".repeat(filled.min(width)),
                bar.value,
                self.tick_suffix,
                lw = label_width
            );
        }
        let _ = writeln!(
            out,
            "{:>lw$}   {} (0-{}{})",
            "",
            self.y_axis_label,
            self.y_max,
            self.tick_suffix,
            lw = label_width
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cme_census::feature::DetailRow;
    use cme_census::region::Region;

    fn detail(rows: Vec<(&str, f64)>) -> DetailDataset {
        DetailDataset {
            region: Region::lookup("Texas").unwrap(),
            feature_id: FeatureId::from("48201100100"),
            rows: rows
                .into_iter()
                .map(|(category, percentage)| DetailRow {
                    category: category.to_string(),
                    percentage,
                })
                .collect(),
        }
    }

    #[test]
    fn no_detail_is_placeholder() {
        let view = render(None, &CohortTable::age_cohorts());
        assert!(view.is_placeholder());
        assert_eq!(view, ChartView::placeholder(PLACEHOLDER));
    }

    #[test]
    fn bars_follow_table_order_and_labels() {
        let table = CohortTable::age_cohorts();
        let view = render(
            Some(&detail(vec![
                ("S0101_C02_019E", 1.5),
                ("S0101_C02_002E", 7.25),
                ("S0101_C02_010E", 6.0),
                ("S0101_C02_001E", 100.0),
            ])),
            &table,
        );
        let chart = view.chart().unwrap();
        let labels: Vec<&str> = chart.bars.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["Under 5", "40-44", "85 and over"]);
        assert_eq!(chart.bars[0].value, 7.25);
        assert_eq!(chart.y_max, 10.0);
        assert_eq!(chart.tick_suffix, "%");
        assert_eq!(chart.y_axis_label, "Percent of population");
    }

    #[test]
    fn values_are_clamped_to_percent_scale() {
        let chart = render(
            Some(&detail(vec![("S0101_C02_002E", 130.0), ("S0101_C02_003E", -2.0)])),
            &CohortTable::age_cohorts(),
        );
        let chart = chart.chart().unwrap();
        assert_eq!(chart.bars[0].value, 100.0);
        assert_eq!(chart.bars[1].value, 0.0);
        assert_eq!(chart.y_max, 100.0);
    }

    #[test]
    fn text_rendering_has_one_line_per_bar() {
        let view = render(
            Some(&detail(vec![("S0101_C02_002E", 5.0), ("S0101_C02_003E", 10.0)])),
            &CohortTable::age_cohorts(),
        );
        let text = view.chart().unwrap().to_text(20);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[1].contains("Under 5 | ########## 5.0%"));
        assert!(lines[2].contains("5-9 | #################### 10.0%"));
    }

    #[test]
    fn chart_view_serializes_with_kind() {
        let json = serde_json::to_value(ChartView::default()).unwrap();
        assert_eq!(json["kind"], "placeholder");
        assert_eq!(json["message"], PLACEHOLDER);
    }
}
