use std::fs;

use tcpstudy_core::{build_figures, write_figure, ResultsDir, StudyConfig, SweepKind};

#[test]
fn both_sweeps_write_one_chart_per_fixed_level() {
    let data = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    fs::write(
        data.path().join("results_cubic1000.1.csv"),
        "10.0Mbits/sec\n12.0Mbits/sec\n11.0Mbits/sec\n9.0Mbits/sec\n13.0Mbits/sec\n",
    )
    .unwrap();
    fs::write(data.path().join("results_reno500.5.csv"), "20\n22\n21\n").unwrap();

    let config = StudyConfig::default()
        .with_data_dir(data.path())
        .with_output_dir(out.path());
    let source = ResultsDir::new(config.data_dir());

    let mut written = Vec::new();
    for kind in [SweepKind::Delay, SweepKind::Loss] {
        let figures = build_figures(kind, &config, &source).unwrap();
        assert_eq!(figures.len(), 3);
        for figure in &figures {
            let chart = write_figure(figure, config.output_dir()).unwrap();
            written.push(chart.path.file_name().unwrap().to_string_lossy().into_owned());
        }
    }

    assert_eq!(
        written,
        [
            "throughput_vs_delay_loss0.1.png",
            "throughput_vs_delay_loss0.5.png",
            "throughput_vs_delay_loss1.0.png",
            "throughput_vs_loss_delay10.png",
            "throughput_vs_loss_delay50.png",
            "throughput_vs_loss_delay100.png",
        ]
    );

    let mut on_disk: Vec<_> = fs::read_dir(out.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    on_disk.sort();
    let mut expected = written.clone();
    expected.sort();
    assert_eq!(on_disk, expected);

    for name in &written {
        let bytes = fs::read(out.path().join(name)).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }
}
