use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use tcpstudy_core::{
    build_figures, ensure_report_file, render_configuration_section, render_figures_section,
    update_sections, write_figure, RenderedFigure, ReportSection, ResultsDir, StudyConfig,
    SweepKind, DEFAULT_REPORT_TEMPLATE,
};
use tracing::info;

/// Aggregate TCP throughput results into confidence-interval charts.
#[derive(Debug, Parser)]
#[command(name = "throughput-study", version)]
struct Cli {
    /// Study configuration; written with the default grid if it does not exist.
    #[arg(long, default_value = "tcpstudy.json")]
    config: PathBuf,

    /// Directory holding the `results_*.csv` files.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Directory receiving the charts and the report notebook.
    #[arg(long)]
    out_dir: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Sweep::All)]
    sweep: Sweep,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Sweep {
    Delay,
    Loss,
    All,
}

impl Sweep {
    fn kinds(self) -> &'static [SweepKind] {
        match self {
            Self::Delay => &[SweepKind::Delay],
            Self::Loss => &[SweepKind::Loss],
            Self::All => &[SweepKind::Delay, SweepKind::Loss],
        }
    }
}

fn main() -> Result<()> {
    let filter = std::env::var("TCPSTUDY_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let report_path = config.output_dir().join("report.md");
    ensure_report_file(&report_path, DEFAULT_REPORT_TEMPLATE)?;

    info!(
        "aggregating results from {} ({} variants, {} delays, {} losses)",
        config.data_dir().display(),
        config.variants().len(),
        config.delays_ms().len(),
        config.losses_pct().len()
    );

    let source = ResultsDir::new(config.data_dir());
    let mut sections = vec![ReportSection::new(
        "configuration",
        render_configuration_section(&config),
    )];

    for &kind in cli.sweep.kinds() {
        let rendered = run_sweep(kind, &config, &source)?;
        sections.push(ReportSection::new(
            section_id(kind),
            render_figures_section(&rendered),
        ));
    }

    update_sections(&report_path, &sections)?;
    info!("updated report at {}", report_path.display());

    Ok(())
}

fn load_config(cli: &Cli) -> Result<StudyConfig> {
    let mut config = StudyConfig::load(&cli.config)?;
    if let Some(dir) = &cli.data_dir {
        config = config.with_data_dir(dir);
    }
    if let Some(dir) = &cli.out_dir {
        config = config.with_output_dir(dir);
    }
    Ok(config)
}

fn run_sweep(kind: SweepKind, config: &StudyConfig, source: &ResultsDir) -> Result<Vec<RenderedFigure>> {
    let figures = build_figures(kind, config, source)?;
    let mut rendered = Vec::with_capacity(figures.len());
    for figure in &figures {
        let chart = write_figure(figure, config.output_dir())?;
        info!("wrote \"{}\" to {}", chart.title, chart.path.display());
        rendered.push(chart);
    }
    Ok(rendered)
}

fn section_id(kind: SweepKind) -> &'static str {
    match kind {
        SweepKind::Delay => "delay-sweep",
        SweepKind::Loss => "loss-sweep",
    }
}
