//! Config file to engine settings

use std::io::Write;
use std::time::Duration;

use petriflow_config::PetriflowConfig;
use petriflow_engine::{EngineSettings, SettingsError};

fn config_from(contents: &str) -> PetriflowConfig {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    PetriflowConfig::load_from(file.path()).unwrap()
}

#[test]
fn config_file_drives_engine_settings() {
    let config = config_from(
        r#"
[simulate]
seed = 7
max_steps = 40

[animation]
speed = 0.5
removal_window_ms = 200

[trace]
max_events = 3

[highlight]
hover_timeout_ms = 1500
"#,
    );

    let settings = EngineSettings::from_config(&config).unwrap();
    assert_eq!(settings.pipeline.simulate.seed, Some(7));
    assert_eq!(settings.pipeline.simulate.max_steps, 40);
    assert!((settings.animation.speed.value() - 0.5).abs() < f64::EPSILON);
    assert_eq!(settings.animation.removal_window, Duration::from_millis(200));
    assert_eq!(settings.animation.step_interval, Duration::from_millis(300));
    assert_eq!(settings.trace_capacity.get(), 3);
    assert_eq!(settings.hover_timeout, Duration::from_millis(1500));
}

#[test]
fn invalid_values_are_rejected_when_building_settings() {
    let zero_speed = config_from("[animation]\nspeed = 0.0\n");
    assert!(matches!(
        EngineSettings::from_config(&zero_speed),
        Err(SettingsError::Speed(_))
    ));

    let no_trace = config_from("[trace]\nmax_events = 0\n");
    assert!(matches!(
        EngineSettings::from_config(&no_trace),
        Err(SettingsError::ZeroTraceCapacity)
    ));
}
