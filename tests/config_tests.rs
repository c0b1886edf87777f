use std::path::PathBuf;
use std::time::Duration;

use photo_dashboard::config::{Configuration, DeviceInfo, SurfaceSize};

#[test]
fn parse_kebab_case_config() {
    let yaml = r#"
rotation-interval: 30s
surface:
  width: 1920
  height: 1080
albums-page-size: 20
storage:
  path: "/var/lib/dashboard/state.json"
  user: "alice"
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    let cfg = cfg.validated().unwrap();
    assert_eq!(cfg.rotation_interval, Some(Duration::from_secs(30)));
    assert_eq!(
        cfg.surface,
        SurfaceSize {
            width: 1920,
            height: 1080
        }
    );
    assert_eq!(cfg.albums_page_size, 20);
    assert_eq!(cfg.photos_page_size, 100);
    assert_eq!(cfg.storage.path, PathBuf::from("/var/lib/dashboard/state.json"));
    assert_eq!(cfg.storage.user, "alice");
    assert_eq!(cfg.storage.photos_prefix, "PHOTOS");
}

#[test]
fn empty_config_uses_defaults() {
    let cfg: Configuration = serde_yaml::from_str("{}").unwrap();
    let cfg = cfg.validated().unwrap();
    assert_eq!(cfg.rotation_interval, None);
    assert_eq!(cfg.surface, SurfaceSize { width: 1200, height: 800 });
    assert_eq!(cfg.albums_page_size, 15);
    assert_eq!(cfg.background_color, [255, 255, 255]);
    assert!((cfg.fade_step - 0.01).abs() < f32::EPSILON);
    assert_eq!(cfg.frame_interval, Duration::from_millis(16));
    assert_eq!(cfg.service.token_env, "PHOTOS_ACCESS_TOKEN");
    assert!(cfg.device.is_none());
}

#[test]
fn parse_device_description() {
    let yaml = r#"
device:
  platform: "MacIntel"
  max-touch-points: 5
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(
        cfg.device,
        Some(DeviceInfo {
            platform: Some("MacIntel".into()),
            max_touch_points: 5
        })
    );
}

#[test]
fn page_sizes_are_capped() {
    let cfg: Configuration = serde_yaml::from_str("photos-page-size: 500").unwrap();
    let err = cfg.validated().unwrap_err();
    assert!(err.to_string().contains("photos-page-size"));

    let cfg: Configuration = serde_yaml::from_str("albums-page-size: 0").unwrap();
    assert!(cfg.validated().is_err());
}

#[test]
fn rejects_degenerate_surface_and_fade() {
    let cfg: Configuration = serde_yaml::from_str("surface: {width: 0, height: 800}").unwrap();
    assert!(cfg.validated().is_err());

    let cfg: Configuration = serde_yaml::from_str("fade-step: 0").unwrap();
    assert!(cfg.validated().is_err());

    let cfg: Configuration = serde_yaml::from_str("rotation-interval: 0s").unwrap();
    assert!(cfg.validated().is_err());
}

#[test]
fn loads_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, "rotation-interval: 1m\nframe-output: /tmp/frame.png\n").unwrap();
    let cfg = Configuration::from_yaml_file(&path).unwrap();
    assert_eq!(cfg.rotation_interval, Some(Duration::from_secs(60)));
    assert_eq!(cfg.frame_output, Some(PathBuf::from("/tmp/frame.png")));
}

#[test]
fn unknown_surface_keys_are_ignored_but_types_are_checked() {
    let bad: Result<Configuration, _> = serde_yaml::from_str("surface: {width: wide}");
    assert!(bad.is_err());
}
