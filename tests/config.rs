use beam_field::beamfield::{BeamField, BeamFieldConfig};

#[test]
fn config_round_trips_through_json() {
    let config = BeamFieldConfig::default()
        .max_resolutions_per_tick(512)
        .growth_step(1024)
        .pool_capacity(8);
    let json = serde_json::to_string(&config).unwrap();
    let back: BeamFieldConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, config);
}

#[test]
fn missing_fields_fall_back_to_defaults() {
    let config: BeamFieldConfig = serde_json::from_str(r#"{ "max_resolutions_per_tick": 32 }"#).unwrap();
    assert_eq!(config.max_resolutions_per_tick, Some(32));
    assert_eq!(config.growth_step, BeamFieldConfig::default().growth_step);

    let unbounded: BeamFieldConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(unbounded, BeamFieldConfig::default());
    assert_eq!(unbounded.max_resolutions_per_tick, None);
}

#[test]
fn field_keeps_its_config() {
    let config = BeamFieldConfig::default().max_resolutions_per_tick(0);
    // A zero cap would stop every tick; the builder floors it at one.
    assert_eq!(config.max_resolutions_per_tick, Some(1));
    let field = BeamField::with_config(config.clone());
    assert_eq!(field.config(), &config);
    assert!(field.is_empty());
    assert_eq!(field.generation(), 0);
}
