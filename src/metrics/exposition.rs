//! Prometheus text exposition (format version 0.0.4).

use metrics_exporter_prometheus::PrometheusBuilder;

use super::registry::{MetricFamily, MetricSample, TARGET_LABEL};

/// `Content-Type` of the rendered output.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Render samples as Prometheus text.
///
/// Every sample becomes a gauge labelled with its target. Known families get a
/// `# HELP` line. The samples are replayed into a recorder scoped to this call,
/// so the output reflects exactly the given snapshot.
pub fn render(samples: &[MetricSample]) -> String {
    if samples.is_empty() {
        return String::new();
    }

    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();

    ::metrics::with_local_recorder(&recorder, || {
        for sample in samples {
            if let Ok(family) = sample.metric_name.parse::<MetricFamily>() {
                ::metrics::describe_gauge!(sample.metric_name.clone(), family.help());
            }
            ::metrics::gauge!(
                sample.metric_name.clone(),
                TARGET_LABEL => sample.target_label.clone()
            )
            .set(sample.value);
        }
    });

    handle.render()
}
