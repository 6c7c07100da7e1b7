use std::time::Duration;

pub const DEFAULT_LABEL_SELECTOR: &str = "mintel.com/dex-k8s-dynamic-clients=enabled";
pub const DEFAULT_RESYNC_PERIOD: Duration = Duration::from_secs(1800);

/// Which watch loops run, and how ConfigMap and Secret watches are narrowed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControllerConfig {
    pub ingress: bool,
    pub config_maps: bool,
    pub secrets: bool,
    /// Applied to ConfigMap and Secret watches only
    pub label_selector: String,
    pub resync_period: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            ingress: true,
            config_maps: false,
            secrets: false,
            label_selector: DEFAULT_LABEL_SELECTOR.to_string(),
            resync_period: DEFAULT_RESYNC_PERIOD,
        }
    }
}
