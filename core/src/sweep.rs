//! Walk the experiment grid and turn each fixed dimension value into a chart description.

use std::fmt;

use anyhow::Result;
use tracing::{info, warn};

use crate::{
    config::{format_loss, Configuration, StudyConfig},
    loader::SampleSource,
    metrics::{estimate, Estimate},
};

pub const THROUGHPUT_LABEL: &str = "Throughput (Mbps)";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SweepKind {
    /// Delay on the x-axis, one figure per loss level.
    Delay,
    /// Loss on the x-axis, one figure per delay level.
    Loss,
}

impl SweepKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Delay => "delay",
            Self::Loss => "loss",
        }
    }
}

impl fmt::Display for SweepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single x position of a series. `estimate` is `None` when the configuration had no
/// usable samples; renderers leave a gap there.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SeriesPoint {
    pub x: f64,
    pub estimate: Option<Estimate>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Series {
    pub label: String,
    pub points: Vec<SeriesPoint>,
}

impl Series {
    pub fn estimated_points(&self) -> impl Iterator<Item = (f64, Estimate)> + '_ {
        self.points
            .iter()
            .filter_map(|point| point.estimate.map(|estimate| (point.x, estimate)))
    }

    pub fn is_empty(&self) -> bool {
        self.estimated_points().next().is_none()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Figure {
    pub kind: SweepKind,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub file_stem: String,
    pub x_values: Vec<f64>,
    pub series: Vec<Series>,
}

impl Figure {
    pub fn series(&self, label: &str) -> Option<&Series> {
        self.series.iter().find(|series| series.label == label)
    }
}

/// One figure per loss level, plotting throughput against delay for every variant.
pub fn throughput_vs_delay(config: &StudyConfig, source: &impl SampleSource) -> Result<Vec<Figure>> {
    let x_values: Vec<f64> = config.delays_ms().iter().map(|&d| f64::from(d)).collect();
    let mut figures = Vec::with_capacity(config.losses_pct().len());

    for &loss in config.losses_pct() {
        let mut series = Vec::with_capacity(config.variants().len());
        for variant in config.variants() {
            let mut points = Vec::with_capacity(config.delays_ms().len());
            for &delay in config.delays_ms() {
                let configuration = Configuration::new(variant, delay, loss);
                points.push(SeriesPoint {
                    x: f64::from(delay),
                    estimate: point_estimate(source, &configuration, config.confidence_level())?,
                });
            }
            series.push(Series {
                label: capitalize(variant),
                points,
            });
        }

        let loss_label = format_loss(loss);
        info!("built throughput-vs-delay figure for loss {}%", loss_label);
        figures.push(Figure {
            kind: SweepKind::Delay,
            title: format!("Throughput vs. Delay (Loss={loss_label}%)"),
            x_label: "Delay (ms)".to_string(),
            y_label: THROUGHPUT_LABEL.to_string(),
            file_stem: format!("throughput_vs_delay_loss{loss_label}"),
            x_values: x_values.clone(),
            series,
        });
    }

    Ok(figures)
}

/// One figure per delay level, plotting throughput against loss for every variant.
pub fn throughput_vs_loss(config: &StudyConfig, source: &impl SampleSource) -> Result<Vec<Figure>> {
    let x_values = config.losses_pct().to_vec();
    let mut figures = Vec::with_capacity(config.delays_ms().len());

    for &delay in config.delays_ms() {
        let mut series = Vec::with_capacity(config.variants().len());
        for variant in config.variants() {
            let mut points = Vec::with_capacity(config.losses_pct().len());
            for &loss in config.losses_pct() {
                let configuration = Configuration::new(variant, delay, loss);
                points.push(SeriesPoint {
                    x: loss,
                    estimate: point_estimate(source, &configuration, config.confidence_level())?,
                });
            }
            series.push(Series {
                label: capitalize(variant),
                points,
            });
        }

        info!("built throughput-vs-loss figure for delay {}ms", delay);
        figures.push(Figure {
            kind: SweepKind::Loss,
            title: format!("Throughput vs. Loss (Delay={delay}ms)"),
            x_label: "Loss (%)".to_string(),
            y_label: THROUGHPUT_LABEL.to_string(),
            file_stem: format!("throughput_vs_loss_delay{delay}"),
            x_values: x_values.clone(),
            series,
        });
    }

    Ok(figures)
}

/// Run the sweep named by `kind`.
pub fn build_figures(
    kind: SweepKind,
    config: &StudyConfig,
    source: &impl SampleSource,
) -> Result<Vec<Figure>> {
    match kind {
        SweepKind::Delay => throughput_vs_delay(config, source),
        SweepKind::Loss => throughput_vs_loss(config, source),
    }
}

fn point_estimate(
    source: &impl SampleSource,
    configuration: &Configuration<'_>,
    confidence: f64,
) -> Result<Option<Estimate>> {
    let outcome = source.load(configuration)?;
    match estimate(outcome.values(), confidence) {
        Ok(estimate) => Ok(Some(estimate)),
        Err(err) => {
            warn!("no estimate for {} ({}): {}", configuration, outcome.path().display(), err);
            Ok(None)
        }
    }
}

fn capitalize(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::loader::LoadOutcome;

    /// Serves `[base, base + 1, base + 2]` for every configuration and records each request.
    struct FakeSource {
        requests: RefCell<Vec<String>>,
    }

    impl FakeSource {
        fn new() -> Self {
            Self {
                requests: RefCell::new(Vec::new()),
            }
        }
    }

    impl SampleSource for FakeSource {
        fn load(&self, configuration: &Configuration<'_>) -> Result<LoadOutcome> {
            self.requests.borrow_mut().push(configuration.to_string());
            let base = f64::from(configuration.delay_ms) + configuration.loss_pct;
            Ok(LoadOutcome::Loaded {
                path: format!("{configuration}").into(),
                values: vec![base, base + 1.0, base + 2.0],
                dropped_rows: 0,
            })
        }
    }

    #[test]
    fn capitalizes_variant_labels() {
        assert_eq!(capitalize("reno"), "Reno");
        assert_eq!(capitalize("cubic"), "Cubic");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn delay_sweep_has_one_figure_per_loss_in_order() {
        let config = StudyConfig::default();
        let figures = throughput_vs_delay(&config, &FakeSource::new()).unwrap();

        let titles: Vec<_> = figures.iter().map(|f| f.title.as_str()).collect();
        assert_eq!(
            titles,
            [
                "Throughput vs. Delay (Loss=0.1%)",
                "Throughput vs. Delay (Loss=0.5%)",
                "Throughput vs. Delay (Loss=1.0%)",
            ]
        );
        for figure in &figures {
            assert_eq!(figure.x_values, [10.0, 50.0, 100.0]);
            let labels: Vec<_> = figure.series.iter().map(|s| s.label.as_str()).collect();
            assert_eq!(labels, ["Reno", "Cubic"]);
        }

        let reno = figures[0].series("Reno").unwrap();
        let means: Vec<_> = reno.estimated_points().map(|(_, e)| e.mean).collect();
        assert!((means[0] - 11.1).abs() < 1e-9);
        assert!((means[2] - 101.1).abs() < 1e-9);
    }

    #[test]
    fn loss_sweep_has_one_figure_per_delay() {
        let config = StudyConfig::default();
        let figures = throughput_vs_loss(&config, &FakeSource::new()).unwrap();

        assert_eq!(figures.len(), 3);
        assert_eq!(figures[2].title, "Throughput vs. Loss (Delay=100ms)");
        assert_eq!(figures[2].file_stem, "throughput_vs_loss_delay100");
        assert_eq!(figures[2].x_label, "Loss (%)");
        assert_eq!(figures[0].x_values, [0.1, 0.5, 1.0]);
        assert!(figures.iter().all(|f| f.kind == SweepKind::Loss));
    }

    #[test]
    fn each_sweep_reloads_every_configuration() {
        let config = StudyConfig::default();
        let source = FakeSource::new();

        throughput_vs_delay(&config, &source).unwrap();
        throughput_vs_loss(&config, &source).unwrap();

        let requests = source.requests.borrow();
        assert_eq!(requests.len(), 2 * 2 * 3 * 3);
        let reno_10_01 = requests
            .iter()
            .filter(|r| r.as_str() == "reno delay=10ms loss=0.1%")
            .count();
        assert_eq!(reno_10_01, 2);
    }

    #[test]
    fn variant_order_follows_config() {
        let config = StudyConfig::new(
            vec!["cubic".into(), "bbr".into(), "reno".into()],
            vec![20],
            vec![0.2],
            0.9,
        )
        .unwrap();
        let figures = throughput_vs_delay(&config, &FakeSource::new()).unwrap();
        let labels: Vec<_> = figures[0].series.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, ["Cubic", "Bbr", "Reno"]);
    }
}
