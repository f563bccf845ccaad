//! Composite properties over the synthetic archive.

mod common;

use agriplast_algorithms::vector::BoundingBox;
use agriplast_pipeline::{DateWindow, PipelineConfig, RegionOfInterest, TemporalCompositor};
use approx::assert_relative_eq;
use common::{archive, counties, date};

#[test]
fn repeated_evaluation_is_bit_identical() {
    let archive = archive();
    let roi = counties().lookup("Los Angeles").unwrap();
    let window = DateWindow::new(date(2019, 2, 20), date(2019, 3, 20)).unwrap();
    let request = TemporalCompositor::training(&PipelineConfig::default())
        .request(&roi, window)
        .unwrap();

    let a = request.evaluate(&archive).unwrap();
    let b = request.evaluate(&archive).unwrap();
    assert_eq!(a.scene_ids, vec!["h-0301", "h-0310"]);
    for name in a.image.band_names() {
        let x = a.image.band(name).unwrap().data();
        let y = b.image.band(name).unwrap().data();
        assert!(x.iter().zip(y.iter()).all(|(p, q)| p.to_bits() == q.to_bits()));
    }
}

#[test]
fn reflectance_scaled_and_median_taken() {
    let archive = archive();
    let roi = counties().lookup("Los Angeles").unwrap();
    let window = DateWindow::new(date(2019, 2, 20), date(2019, 3, 20)).unwrap();
    let composite = TemporalCompositor::training(&PipelineConfig::default())
        .composite(&archive, &roi, window)
        .unwrap();

    // hoop B4 is 1400 DN, scenes offset by 0 and 10; row 0
    let red = composite.image.band("B4").unwrap();
    assert_relative_eq!(red.get(0, 0).unwrap(), 0.1405, epsilon = 1e-12);
    for &v in red.data().iter() {
        assert!((0.0..=1.0).contains(&v));
    }
    for name in ["NDVI", "NDTI", "PMLI"] {
        for &v in composite.image.band(name).unwrap().data().iter() {
            assert!((-1.0..=1.0).contains(&v), "{name} = {v}");
        }
    }
}

#[test]
fn cloudy_scene_never_contributes() {
    let archive = archive();
    let roi = counties().lookup("Los Angeles").unwrap();
    let window = DateWindow::new(date(2019, 6, 2), date(2019, 6, 10)).unwrap();
    let err = TemporalCompositor::training(&PipelineConfig::default())
        .composite(&archive, &roi, window)
        .unwrap_err();
    assert!(err.to_string().contains("no qualifying imagery"));

    // with the scene-level filter lifted, the QA bits mask every pixel
    let lenient = TemporalCompositor::new(PipelineConfig::default().collection, 100.0);
    let err = lenient.composite(&archive, &roi, window).unwrap_err();
    assert!(err.to_string().contains("no qualifying imagery"));
}

#[test]
fn bounds_roi_clips_outside_pixels() {
    let archive = archive();
    let roi = RegionOfInterest::Bounds(BoundingBox::new(-118.395, 34.085, -118.385, 34.095));
    let window = DateWindow::new(date(2019, 2, 20), date(2019, 3, 20)).unwrap();
    let composite = TemporalCompositor::training(&PipelineConfig::default())
        .composite(&archive, &roi, window)
        .unwrap();
    assert_eq!(composite.valid_pixels(), 4);
}
