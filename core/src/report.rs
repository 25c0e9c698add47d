use std::{
    fmt::Write as _,
    fs::{self, OpenOptions},
    io::{ErrorKind, Write},
    path::Path,
};

use anyhow::{anyhow, Context, Result};

use crate::{
    config::{format_loss, StudyConfig},
    visualization::RenderedFigure,
};

pub const DEFAULT_REPORT_TEMPLATE: &str = r"# TCP Throughput Study

<!-- SECTION:overview start -->
<!-- Describe the testbed and how the result files were produced. -->
<!-- SECTION:overview end -->

## Configuration

<!-- SECTION:configuration start -->
<!-- Populated automatically with the experiment grid from the latest run. -->
<!-- SECTION:configuration end -->

## Throughput vs. Delay

<!-- SECTION:delay-sweep start -->
<!-- Populated automatically with one chart per loss level. -->
<!-- SECTION:delay-sweep end -->

## Throughput vs. Loss

<!-- SECTION:loss-sweep start -->
<!-- Populated automatically with one chart per delay level. -->
<!-- SECTION:loss-sweep end -->

> Sections may be rearranged or extended freely. Keep the `<!-- SECTION:name start/end -->`
> markers around any region that should be rewritten on the next run.
";

/// Replacement body for the region between `<!-- SECTION:{id} start -->` and
/// `<!-- SECTION:{id} end -->` in a notebook.
#[derive(Clone, Debug)]
pub struct ReportSection {
    id: String,
    body: String,
}

impl ReportSection {
    pub fn new(id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            body: body.into(),
        }
    }

    fn markers(&self) -> (String, String) {
        (
            format!("<!-- SECTION:{} start -->", self.id),
            format!("<!-- SECTION:{} end -->", self.id),
        )
    }

    /// Swap the body between this section's markers; text outside them is kept verbatim.
    fn splice(&self, notebook: &str) -> Result<String> {
        let (open, close) = self.markers();
        let (head, rest) = notebook
            .split_once(open.as_str())
            .ok_or_else(|| anyhow!("report has no `{open}` marker"))?;
        let (_, tail) = rest
            .split_once(close.as_str())
            .ok_or_else(|| anyhow!("report has no `{close}` marker after `{open}`"))?;

        let body = self.body.trim_matches('\n');
        let body = if body.is_empty() {
            String::new()
        } else {
            format!("{body}\n")
        };
        Ok(format!("{head}{open}\n{body}{close}{tail}"))
    }
}

/// Write `template` to `path` unless a notebook is already there.
pub fn ensure_report_file(path: &Path, template: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(mut file) => file
            .write_all(template.as_bytes())
            .with_context(|| format!("failed to write report template to {}", path.display())),
        Err(err) if err.kind() == ErrorKind::AlreadyExists => Ok(()),
        Err(err) => {
            Err(err).with_context(|| format!("failed to create report at {}", path.display()))
        }
    }
}

/// Rewrite each section of the notebook at `path`, failing before any write if a marker is missing.
pub fn update_sections(path: &Path, sections: &[ReportSection]) -> Result<()> {
    let notebook = fs::read_to_string(path)
        .with_context(|| format!("failed to read report at {}", path.display()))?;
    let updated = sections
        .iter()
        .try_fold(notebook, |notebook, section| section.splice(&notebook))
        .with_context(|| format!("failed to update report at {}", path.display()))?;

    fs::write(path, updated)
        .with_context(|| format!("failed to write updated report to {}", path.display()))
}

pub fn render_configuration_section(config: &StudyConfig) -> String {
    let losses: Vec<String> = config
        .losses_pct()
        .iter()
        .map(|&loss| format!("{}%", format_loss(loss)))
        .collect();
    let delays: Vec<String> = config
        .delays_ms()
        .iter()
        .map(|delay| format!("{delay}ms"))
        .collect();

    format!(
        "- Data directory: `{}`\n- Variants: {}\n- Delays: {}\n- Losses: {}\n- Confidence level: {:.0}%\n",
        config.data_dir().display(),
        config.variants().join(", "),
        delays.join(", "),
        losses.join(", "),
        config.confidence_level() * 100.0
    )
}

pub fn render_figures_section(figures: &[RenderedFigure]) -> String {
    if figures.is_empty() {
        return "No charts were generated for this sweep.".to_string();
    }

    let mut output = String::new();
    for figure in figures {
        let _ = writeln!(
            &mut output,
            "### {}\n\n![{}]({})\n",
            figure.title, figure.title, figure.data_url
        );
    }
    output
}
