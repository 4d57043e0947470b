//! Process-wide constants.

/// Keys into the GUI [`Settings`](crate::config::Settings) map.
pub mod settings {
    /// Online/offline status flag.
    pub const ONLINE: &str = "online_offline";
}

/// Port the editor API listens on when neither config nor `PORT` say otherwise
pub const DEFAULT_PORT: u16 = 3000;

/// Environment variable naming the config file to load
pub const CONFIG_ENV: &str = "NRSGUI_CONFIG";

/// Config file picked up from the working directory when `NRSGUI_CONFIG` is unset
pub const DEFAULT_CONFIG_PATH: &str = "./nrsgui.yaml";

/// Capacity of the graph event broadcast channel
pub const EVENT_CHANNEL_CAPACITY: usize = 128;
