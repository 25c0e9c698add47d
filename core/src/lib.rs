pub mod config;
pub mod loader;
pub mod metrics;
pub mod report;
pub mod sweep;
pub mod visualization;

pub use config::{load_or_init, Configuration, StudyConfig};
pub use loader::{load_samples, results_file_name, LoadOutcome, ResultsDir, SampleSource};
pub use metrics::{estimate, Estimate, EstimateError};
pub use report::{
    ensure_report_file, render_configuration_section, render_figures_section, update_sections,
    ReportSection, DEFAULT_REPORT_TEMPLATE,
};
pub use sweep::{
    build_figures, throughput_vs_delay, throughput_vs_loss, Figure, Series, SeriesPoint,
    SweepKind,
};
pub use visualization::{encode_rgb_png, png_data_url, write_figure, RenderedFigure};
