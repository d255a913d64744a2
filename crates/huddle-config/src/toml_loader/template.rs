//! Default TOML config template with inline documentation comments.

/// Generate the default TOML config content with comments.
pub(crate) fn default_config_toml() -> String {
    r##"# Huddle Configuration
# Only override what you want to change -- missing fields use defaults.

[room]
default_name = "Random"
# notice_capacity = 16     # 1-1024

[audio]
# echo_cancellation = true
# auto_gain_control = true
# noise_suppression = true
# sample_rate = 48000      # 8000, 16000, 24000, 32000, 44100, 48000

[token]
# lifetime_secs = 300      # 30-86400

[logging]
# level = "info"           # trace, debug, info, warn, error
# show_target = false
"##
    .to_string()
}
