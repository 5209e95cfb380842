use std::fs;

use tempfile::TempDir;
use wifi_heatmap::simulate::{self, Scene};
use wifi_heatmap::{ErrorKind, InputMode, Preset, loader, plot_heatmap};

const ROOM: &str = r#"{
    "width": 12,
    "height": 8,
    "emitters": [
        { "x": 2.0, "y": 4.0, "power_dbm": 20.0, "frequency_hz": 2.4e9 }
    ],
    "obstacles": [
        { "kind": "wall", "x1": 6.0, "y1": 0.0, "x2": 6.0, "y2": 8.0,
          "thickness": 1.0, "attenuation_db": 15.0 }
    ]
}"#;

#[test]
fn wall_shadows_far_side_of_room() {
    let scene = Scene::from_json(ROOM).unwrap();
    let grid = scene.signal_map().unwrap();
    assert_eq!(grid.shape(), (8, 12));

    let open = scene.emitters[0].received_power(10.0, 4.0, scene.cells_per_meter);
    let shadowed = grid.get(4, 10).unwrap();
    assert!((open - shadowed - 15.0).abs() < 1e-9);

    // Same side as the emitter: no loss.
    let near = scene.emitters[0].received_power(4.0, 4.0, scene.cells_per_meter);
    assert_eq!(grid.get(4, 4).unwrap(), near);
}

#[test]
fn exported_map_plots_as_dense_grid() {
    let dir = TempDir::new().unwrap();
    let csv_path = dir.path().join("heatmap.csv");
    let png_path = dir.path().join("wifi_heatmap.png");

    let scene = Scene::from_json(ROOM).unwrap();
    simulate::export_csv(&scene.signal_map().unwrap(), &csv_path).unwrap();

    assert_eq!(
        loader::resolve_mode(&csv_path, InputMode::Auto).unwrap(),
        InputMode::Dense
    );
    let reloaded = loader::load_dense(&csv_path).unwrap();
    assert_eq!(reloaded.shape(), (8, 12));

    let mut options = Preset::Dense.options();
    options.labels = false;
    options.dpi = 30;
    let summary = plot_heatmap(&csv_path, &png_path, InputMode::Auto, Some(&options))
        .unwrap()
        .unwrap();
    assert_eq!(summary.mode, InputMode::Dense);
    assert!(fs::metadata(&png_path).unwrap().len() > 0);
}

#[test]
fn scene_without_emitters_is_a_config_error() {
    let err = Scene::from_json(r#"{ "width": 4, "height": 4, "emitters": [] }"#).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);

    let err = Scene::from_json("{ not json").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
}

#[test]
fn marked_obstacles_stay_off_the_color_scale() {
    let dir = TempDir::new().unwrap();
    let csv_path = dir.path().join("marked.csv");
    let png_path = dir.path().join("marked.png");

    let mut scene = Scene::from_json(ROOM).unwrap();
    scene.mark_obstacles = true;
    let grid = scene.signal_map().unwrap();
    assert_eq!(grid.get(0, 0), Some(simulate::MARKER_DBM));
    assert_eq!(grid.get(4, 6), Some(simulate::MARKER_DBM));
    simulate::export_csv(&grid, &csv_path).unwrap();

    let mut options = Preset::Dense.options();
    options.labels = false;
    options.dpi = 30;
    options.marker_dbm = Some(simulate::MARKER_DBM);
    let summary = plot_heatmap(&csv_path, &png_path, InputMode::Dense, Some(&options))
        .unwrap()
        .unwrap();
    assert!(summary.bounds.vmin > simulate::MARKER_DBM);
    assert_eq!(summary.bounds.vmax, grid.get(4, 2).unwrap());
    assert!(png_path.exists());
}
